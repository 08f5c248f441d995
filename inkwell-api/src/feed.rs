use inkwell_common::{
    model::{
        Id,
        author::{Author, AuthorMarker, Username},
        comment::Comment,
        group::{Group, GroupSlug},
        post::{Post, PostMarker},
    },
    pagination::{Page, Paginator},
};
use inkwell_db::store::{DbError, PostFilter, Store};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Author {0} was not found")]
    AuthorNotFound(Username),
    #[error("Group {0} was not found")]
    GroupNotFound(GroupSlug),
    #[error("Post {0} was not found")]
    PostNotFound(Id<PostMarker>),
    #[error("This feed requires an authenticated viewer")]
    AuthRequired,
    #[error(transparent)]
    Database(#[from] DbError),
}

pub type Result<T, E = FeedError> = std::result::Result<T, E>;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct GroupFeed {
    pub group: Group,
    pub page: Page<Post>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct ProfileFeed {
    pub author: Author,
    pub post_count: u64,
    pub page: Page<Post>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct PostDetail {
    pub post: Post,
    /// Number of posts by the author of `post`.
    pub post_count: u64,
    pub comments: Vec<Comment>,
}

/// Builds the paginated post listings.
///
/// Every feed is one filtered count plus one filtered page query, newest
/// posts first.
#[derive(Clone)]
pub struct FeedAggregator {
    store: Arc<dyn Store>,
    paginator: Paginator,
}

impl FeedAggregator {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, paginator: Paginator) -> Self {
        Self { store, paginator }
    }

    async fn page(&self, filter: PostFilter, requested: Option<&str>) -> Result<Page<Post>> {
        let count = self.store.count_posts(filter).await?;
        let window = self.paginator.window(count, requested);
        let posts = self
            .store
            .fetch_posts(filter, window.offset, window.limit)
            .await?;

        Ok(window.into_page(posts))
    }

    pub async fn author(&self, username: &Username) -> Result<Author> {
        self.store
            .fetch_author_by_username(username)
            .await?
            .ok_or_else(|| FeedError::AuthorNotFound(username.clone()))
    }

    pub async fn global(&self, requested: Option<&str>) -> Result<Page<Post>> {
        self.page(PostFilter::All, requested).await
    }

    pub async fn group(&self, slug: &GroupSlug, requested: Option<&str>) -> Result<GroupFeed> {
        let group = self
            .store
            .fetch_group_by_slug(slug)
            .await?
            .ok_or_else(|| FeedError::GroupNotFound(slug.clone()))?;
        let page = self.page(PostFilter::Group(group.id), requested).await?;

        Ok(GroupFeed { group, page })
    }

    pub async fn profile(
        &self,
        username: &Username,
        requested: Option<&str>,
    ) -> Result<ProfileFeed> {
        let author = self.author(username).await?;
        let page = self.page(PostFilter::Author(author.id), requested).await?;

        Ok(ProfileFeed {
            post_count: page.count,
            author,
            page,
        })
    }

    /// Posts of every author `viewer` follows.
    pub async fn following(
        &self,
        viewer: Option<Id<AuthorMarker>>,
        requested: Option<&str>,
    ) -> Result<Page<Post>> {
        let viewer = viewer.ok_or(FeedError::AuthRequired)?;

        self.page(PostFilter::FollowedBy(viewer), requested).await
    }

    /// Looks up a post by its author's username and its id.
    pub async fn post(&self, username: &Username, post_id: Id<PostMarker>) -> Result<Post> {
        self.store
            .fetch_post(post_id)
            .await?
            .filter(|post| post.author.username == *username)
            .ok_or(FeedError::PostNotFound(post_id))
    }

    pub async fn post_detail(
        &self,
        username: &Username,
        post_id: Id<PostMarker>,
    ) -> Result<PostDetail> {
        let post = self.post(username, post_id).await?;
        let post_count = self
            .store
            .count_posts(PostFilter::Author(post.author.id))
            .await?;
        let comments = self.store.fetch_comments(post.id).await?;

        Ok(PostDetail {
            post,
            post_count,
            comments,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::feed::{FeedAggregator, FeedError};
    use inkwell_common::{
        model::{
            Id,
            author::{AuthorMarker, CreateAuthor, Username},
            follow::Follow,
            group::{CreateGroup, GroupMarker, GroupSlug, GroupTitle},
            post::{BodyText, PostContent},
        },
        pagination::Paginator,
    };
    use inkwell_db::{memory::MemoryStore, store::Store};
    use std::sync::Arc;

    struct Fixture {
        store: Arc<MemoryStore>,
        feeds: FeedAggregator,
    }

    impl Fixture {
        fn new() -> Self {
            let store = Arc::new(MemoryStore::default());
            let feeds = FeedAggregator::new(store.clone(), Paginator::default());
            Self { store, feeds }
        }

        async fn author(&self, username: &str) -> Id<AuthorMarker> {
            let author = CreateAuthor {
                username: Username::new(username.to_owned()).unwrap(),
            };
            self.store.create_author(&author).await.unwrap()
        }

        async fn group(&self, slug: &str) -> Id<GroupMarker> {
            let group = CreateGroup {
                slug: GroupSlug::new(slug.to_owned()).unwrap(),
                title: GroupTitle::new(slug.to_uppercase()).unwrap(),
                description: String::new(),
            };
            self.store.create_group(&group).await.unwrap()
        }

        async fn post(&self, author: Id<AuthorMarker>, text: &str, group: Option<Id<GroupMarker>>) {
            let content = PostContent {
                text: BodyText::new(text.to_owned()).unwrap(),
                group,
                image: None,
            };
            self.store.create_post(author, &content).await.unwrap();
        }
    }

    fn username(name: &str) -> Username {
        Username::new(name.to_owned()).unwrap()
    }

    fn slug(slug: &str) -> GroupSlug {
        GroupSlug::new(slug.to_owned()).unwrap()
    }

    #[tokio::test]
    async fn group_feed_pages_fifteen_posts() {
        let fixture = Fixture::new();
        let leo = fixture.author("leo").await;
        let cats = fixture.group("cats").await;
        for i in 0..15 {
            fixture.post(leo, &format!("cat {i}"), Some(cats)).await;
        }
        fixture.post(leo, "elsewhere", None).await;

        let first = fixture.feeds.group(&slug("cats"), None).await.unwrap();
        let second = fixture.feeds.group(&slug("cats"), Some("2")).await.unwrap();

        assert_eq!(first.page.len(), 10);
        assert_eq!(second.page.len(), 5);
        assert_eq!(first.page.items[0].text.get(), "cat 14");
        assert_eq!(second.page.items[4].text.get(), "cat 0");
        assert_eq!(first.group.slug, slug("cats"));
    }

    #[tokio::test]
    async fn global_feed_is_newest_first() {
        let fixture = Fixture::new();
        let leo = fixture.author("leo").await;
        let kim = fixture.author("kim").await;
        fixture.post(leo, "one", None).await;
        fixture.post(kim, "two", None).await;
        fixture.post(leo, "three", None).await;

        let page = fixture.feeds.global(None).await.unwrap();
        let texts: Vec<_> = page.items.iter().map(|post| post.text.get()).collect();

        assert_eq!(texts, ["three", "two", "one"]);
        assert!(
            page.items
                .windows(2)
                .all(|pair| pair[0].id > pair[1].id && pair[0].created_at >= pair[1].created_at)
        );
    }

    #[tokio::test]
    async fn profile_counts_all_posts_of_the_author() {
        let fixture = Fixture::new();
        let leo = fixture.author("leo").await;
        let kim = fixture.author("kim").await;
        for i in 0..12 {
            fixture.post(leo, &format!("post {i}"), None).await;
        }
        fixture.post(kim, "not leo", None).await;

        let profile = fixture.feeds.profile(&username("leo"), Some("2")).await.unwrap();

        assert_eq!(profile.post_count, 12);
        assert_eq!(profile.page.len(), 2);
        assert!(profile.page.items.iter().all(|post| post.author.id == leo));
    }

    #[tokio::test]
    async fn following_feed_shows_only_followed_authors() {
        let fixture = Fixture::new();
        let reader = fixture.author("reader").await;
        let leo = fixture.author("leo").await;
        let kim = fixture.author("kim").await;
        fixture.post(leo, "by leo", None).await;
        fixture.post(kim, "by kim", None).await;
        fixture
            .store
            .insert_follow(Follow::new(reader, leo).unwrap())
            .await
            .unwrap();

        let page = fixture.feeds.following(Some(reader), None).await.unwrap();
        let kim_page = fixture.feeds.following(Some(kim), None).await.unwrap();

        assert_eq!(page.len(), 1);
        assert_eq!(page.items[0].author.id, leo);
        assert!(kim_page.is_empty());
        assert!(matches!(
            fixture.feeds.following(None, None).await,
            Err(FeedError::AuthRequired)
        ));
    }

    #[tokio::test]
    async fn unknown_entities_are_not_found() {
        let fixture = Fixture::new();
        let leo = fixture.author("leo").await;
        fixture.author("kim").await;
        fixture.post(leo, "text", None).await;
        let post_id = fixture.feeds.global(None).await.unwrap().items[0].id;

        assert!(matches!(
            fixture.feeds.group(&slug("nothing"), None).await,
            Err(FeedError::GroupNotFound(_))
        ));
        assert!(matches!(
            fixture.feeds.profile(&username("nobody"), None).await,
            Err(FeedError::AuthorNotFound(_))
        ));
        assert!(matches!(
            fixture.feeds.post(&username("kim"), post_id).await,
            Err(FeedError::PostNotFound(_))
        ));
        assert!(fixture.feeds.post(&username("leo"), post_id).await.is_ok());
    }

    #[tokio::test]
    async fn post_detail_includes_comments_in_order() {
        let fixture = Fixture::new();
        let leo = fixture.author("leo").await;
        let kim = fixture.author("kim").await;
        fixture.post(leo, "first", None).await;
        fixture.post(leo, "second", None).await;
        let post_id = fixture.feeds.global(None).await.unwrap().items[0].id;
        for (author, text) in [(kim, "nice"), (leo, "thanks")] {
            fixture
                .store
                .create_comment(post_id, author, &BodyText::new(text.to_owned()).unwrap())
                .await
                .unwrap();
        }

        let detail = fixture.feeds.post_detail(&username("leo"), post_id).await.unwrap();
        let texts: Vec<_> = detail.comments.iter().map(|comment| comment.text.get()).collect();

        assert_eq!(detail.post.text.get(), "second");
        assert_eq!(detail.post_count, 2);
        assert_eq!(texts, ["nice", "thanks"]);
    }
}
