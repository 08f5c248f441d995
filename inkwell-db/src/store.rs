use async_trait::async_trait;
use inkwell_common::{
    model::{
        Id, InkwellSnowflakeGenerator, ModelValidationError,
        auth::{AuthTokenHash, Authentication},
        author::{Author, AuthorMarker, CreateAuthor, Username},
        comment::{Comment, CommentMarker},
        follow::Follow,
        group::{CreateGroup, Group, GroupMarker, GroupSlug},
        post::{BodyText, Post, PostContent, PostMarker},
    },
    snowflake::{ProcessId, WorkerId},
};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("{0} already exists")]
    Conflict(String),
    #[error("Referenced {0} does not exist")]
    MissingReference(&'static str),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Which posts a feed shows. Every variant is answered by one ordered query.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum PostFilter {
    All,
    Group(Id<GroupMarker>),
    Author(Id<AuthorMarker>),
    /// Posts by every author the given author follows.
    FollowedBy(Id<AuthorMarker>),
}

/// Persistence for the blog entities.
///
/// Post listings are ordered newest first. Since ids are snowflakes this is
/// descending id order, which breaks timestamp ties by insertion order.
#[async_trait]
pub trait Store: Send + Sync {
    async fn fetch_author(&self, author_id: Id<AuthorMarker>) -> Result<Option<Author>>;

    async fn fetch_author_by_username(&self, username: &Username) -> Result<Option<Author>>;

    async fn create_author(&self, author: &CreateAuthor) -> Result<Id<AuthorMarker>>;

    async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>>;

    async fn create_auth(&self, authentication: &Authentication) -> Result<()>;

    async fn fetch_group(&self, group_id: Id<GroupMarker>) -> Result<Option<Group>>;

    async fn fetch_group_by_slug(&self, slug: &GroupSlug) -> Result<Option<Group>>;

    /// All groups, ordered by title.
    async fn fetch_groups(&self) -> Result<Vec<Group>>;

    async fn create_group(&self, group: &CreateGroup) -> Result<Id<GroupMarker>>;

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>>;

    async fn create_post(
        &self,
        author: Id<AuthorMarker>,
        content: &PostContent,
    ) -> Result<Id<PostMarker>>;

    /// Returns whether the post existed.
    async fn update_post(&self, post_id: Id<PostMarker>, content: &PostContent) -> Result<bool>;

    async fn count_posts(&self, filter: PostFilter) -> Result<u64>;

    async fn fetch_posts(&self, filter: PostFilter, offset: u64, limit: u64) -> Result<Vec<Post>>;

    /// Comments of a post, oldest first.
    async fn fetch_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>>;

    async fn create_comment(
        &self,
        post_id: Id<PostMarker>,
        author: Id<AuthorMarker>,
        text: &BodyText,
    ) -> Result<Id<CommentMarker>>;

    /// Returns `false` if the edge already existed.
    async fn insert_follow(&self, follow: Follow) -> Result<bool>;

    /// Returns `false` if there was no edge to remove.
    async fn delete_follow(&self, follow: Follow) -> Result<bool>;

    async fn follow_exists(&self, follow: Follow) -> Result<bool>;
}

/// Shared snowflake generator of a store.
#[derive(Debug)]
pub struct SnowflakeSource(Mutex<InkwellSnowflakeGenerator>);

impl SnowflakeSource {
    #[must_use]
    pub fn new(worker_id: WorkerId, process_id: ProcessId) -> Self {
        Self(Mutex::new(InkwellSnowflakeGenerator::new(
            worker_id, process_id,
        )))
    }

    pub fn next_id<Marker>(&self) -> Id<Marker> {
        // The generator state stays consistent even if a holder panicked.
        let mut generator = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        Id::new(generator.generate())
    }
}
