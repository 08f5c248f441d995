use crate::store::{DbError, PostFilter, Result, SnowflakeSource, Store};
use async_trait::async_trait;
use inkwell_common::{
    model::{
        Id,
        auth::{AuthTokenHash, Authentication},
        author::{Author, AuthorMarker, CreateAuthor, Username},
        comment::{Comment, CommentMarker},
        follow::Follow,
        group::{CreateGroup, Group, GroupMarker, GroupSlug},
        post::{BodyText, ImageRef, Post, PostContent, PostMarker},
    },
    snowflake::{ProcessId, WorkerId},
};
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

#[derive(Clone, Debug)]
struct PostRow {
    author: Id<AuthorMarker>,
    group: Option<Id<GroupMarker>>,
    text: BodyText,
    image: Option<ImageRef>,
}

#[derive(Clone, Debug)]
struct CommentRow {
    post: Id<PostMarker>,
    author: Id<AuthorMarker>,
    text: BodyText,
}

#[derive(Debug, Default)]
struct Tables {
    authors: BTreeMap<Id<AuthorMarker>, Username>,
    authentications: Vec<Authentication>,
    groups: BTreeMap<Id<GroupMarker>, Group>,
    posts: BTreeMap<Id<PostMarker>, PostRow>,
    comments: BTreeMap<Id<CommentMarker>, CommentRow>,
    follows: BTreeSet<Follow>,
}

impl Tables {
    fn author(&self, author_id: Id<AuthorMarker>) -> Option<Author> {
        self.authors.get(&author_id).map(|username| Author {
            id: author_id,
            username: username.clone(),
        })
    }

    fn hydrate_post(&self, post_id: Id<PostMarker>, row: &PostRow) -> Result<Post> {
        let author = self
            .author(row.author)
            .ok_or(DbError::MissingReference("author"))?;
        // Deleting a group detaches its posts instead of failing them.
        let group = row.group.and_then(|group_id| self.groups.get(&group_id).cloned());

        Ok(Post {
            id: post_id,
            author,
            group,
            text: row.text.clone(),
            image: row.image.clone(),
            created_at: post_id.created_at(),
        })
    }

    fn matches(&self, row: &PostRow, filter: PostFilter) -> bool {
        match filter {
            PostFilter::All => true,
            PostFilter::Group(group_id) => row.group == Some(group_id),
            PostFilter::Author(author_id) => row.author == author_id,
            PostFilter::FollowedBy(follower_id) => Follow::new(follower_id, row.author)
                .is_ok_and(|follow| self.follows.contains(&follow)),
        }
    }

    fn check_post_references(&self, author: Id<AuthorMarker>, content: &PostContent) -> Result<()> {
        if !self.authors.contains_key(&author) {
            return Err(DbError::MissingReference("author"));
        }
        if content
            .group
            .is_some_and(|group_id| !self.groups.contains_key(&group_id))
        {
            return Err(DbError::MissingReference("group"));
        }

        Ok(())
    }
}

/// [`Store`] kept entirely in process memory.
///
/// Used when no database is configured and by the test suites. Behaves like
/// [`DbClient`](crate::client::DbClient) including ordering and uniqueness.
#[derive(Debug)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    snowflakes: SnowflakeSource,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(WorkerId::default(), ProcessId::default())
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new(worker_id: WorkerId, process_id: ProcessId) -> Self {
        Self {
            tables: RwLock::default(),
            snowflakes: SnowflakeSource::new(worker_id, process_id),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn fetch_author(&self, author_id: Id<AuthorMarker>) -> Result<Option<Author>> {
        Ok(self.read().author(author_id))
    }

    async fn fetch_author_by_username(&self, username: &Username) -> Result<Option<Author>> {
        Ok(self
            .read()
            .authors
            .iter()
            .find(|(_, existing)| *existing == username)
            .map(|(&id, username)| Author {
                id,
                username: username.clone(),
            }))
    }

    async fn create_author(&self, author: &CreateAuthor) -> Result<Id<AuthorMarker>> {
        let mut tables = self.write();
        if tables.authors.values().any(|username| *username == author.username) {
            return Err(DbError::Conflict(format!("Author {}", author.username)));
        }

        let author_id = self.snowflakes.next_id();
        tables.authors.insert(author_id, author.username.clone());

        Ok(author_id)
    }

    async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>> {
        Ok(self
            .read()
            .authentications
            .iter()
            .find(|authentication| authentication.token_hash == *token_hash)
            .cloned())
    }

    async fn create_auth(&self, authentication: &Authentication) -> Result<()> {
        let mut tables = self.write();
        if !tables.authors.contains_key(&authentication.author) {
            return Err(DbError::MissingReference("author"));
        }

        tables.authentications.push(authentication.clone());
        Ok(())
    }

    async fn fetch_group(&self, group_id: Id<GroupMarker>) -> Result<Option<Group>> {
        Ok(self.read().groups.get(&group_id).cloned())
    }

    async fn fetch_group_by_slug(&self, slug: &GroupSlug) -> Result<Option<Group>> {
        Ok(self
            .read()
            .groups
            .values()
            .find(|group| group.slug == *slug)
            .cloned())
    }

    async fn fetch_groups(&self) -> Result<Vec<Group>> {
        let mut groups: Vec<_> = self.read().groups.values().cloned().collect();
        groups.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(groups)
    }

    async fn create_group(&self, group: &CreateGroup) -> Result<Id<GroupMarker>> {
        let mut tables = self.write();
        if tables.groups.values().any(|existing| existing.slug == group.slug) {
            return Err(DbError::Conflict(format!("Group {}", group.slug)));
        }

        let group_id = self.snowflakes.next_id();
        tables.groups.insert(
            group_id,
            Group {
                id: group_id,
                slug: group.slug.clone(),
                title: group.title.clone(),
                description: group.description.clone(),
            },
        );

        Ok(group_id)
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let tables = self.read();
        tables
            .posts
            .get(&post_id)
            .map(|row| tables.hydrate_post(post_id, row))
            .transpose()
    }

    async fn create_post(
        &self,
        author: Id<AuthorMarker>,
        content: &PostContent,
    ) -> Result<Id<PostMarker>> {
        let mut tables = self.write();
        tables.check_post_references(author, content)?;

        let post_id = self.snowflakes.next_id();
        tables.posts.insert(
            post_id,
            PostRow {
                author,
                group: content.group,
                text: content.text.clone(),
                image: content.image.clone(),
            },
        );

        Ok(post_id)
    }

    async fn update_post(&self, post_id: Id<PostMarker>, content: &PostContent) -> Result<bool> {
        let mut tables = self.write();
        let Some(author) = tables.posts.get(&post_id).map(|row| row.author) else {
            return Ok(false);
        };
        tables.check_post_references(author, content)?;

        if let Some(row) = tables.posts.get_mut(&post_id) {
            row.group = content.group;
            row.text = content.text.clone();
            row.image = content.image.clone();
        }

        Ok(true)
    }

    async fn count_posts(&self, filter: PostFilter) -> Result<u64> {
        let tables = self.read();
        Ok(tables
            .posts
            .values()
            .filter(|row| tables.matches(row, filter))
            .count() as u64)
    }

    #[allow(clippy::cast_possible_truncation)]
    async fn fetch_posts(&self, filter: PostFilter, offset: u64, limit: u64) -> Result<Vec<Post>> {
        let tables = self.read();
        tables
            .posts
            .iter()
            .rev()
            .filter(|(_, row)| tables.matches(row, filter))
            .skip(offset as usize)
            .take(limit as usize)
            .map(|(&post_id, row)| tables.hydrate_post(post_id, row))
            .collect()
    }

    async fn fetch_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        let tables = self.read();
        tables
            .comments
            .iter()
            .filter(|(_, row)| row.post == post_id)
            .map(|(&comment_id, row)| -> Result<Comment> {
                Ok(Comment {
                    id: comment_id,
                    post: row.post,
                    author: tables
                        .author(row.author)
                        .ok_or(DbError::MissingReference("author"))?,
                    text: row.text.clone(),
                    created_at: comment_id.created_at(),
                })
            })
            .collect()
    }

    async fn create_comment(
        &self,
        post_id: Id<PostMarker>,
        author: Id<AuthorMarker>,
        text: &BodyText,
    ) -> Result<Id<CommentMarker>> {
        let mut tables = self.write();
        if !tables.posts.contains_key(&post_id) {
            return Err(DbError::MissingReference("post"));
        }
        if !tables.authors.contains_key(&author) {
            return Err(DbError::MissingReference("author"));
        }

        let comment_id = self.snowflakes.next_id();
        tables.comments.insert(
            comment_id,
            CommentRow {
                post: post_id,
                author,
                text: text.clone(),
            },
        );

        Ok(comment_id)
    }

    async fn insert_follow(&self, follow: Follow) -> Result<bool> {
        let mut tables = self.write();
        if !tables.authors.contains_key(&follow.follower())
            || !tables.authors.contains_key(&follow.author())
        {
            return Err(DbError::MissingReference("author"));
        }

        Ok(tables.follows.insert(follow))
    }

    async fn delete_follow(&self, follow: Follow) -> Result<bool> {
        Ok(self.write().follows.remove(&follow))
    }

    async fn follow_exists(&self, follow: Follow) -> Result<bool> {
        Ok(self.read().follows.contains(&follow))
    }
}
