use inkwell_common::model::{
    Id,
    author::AuthorMarker,
    follow::{Follow, SelfFollowError},
};
use inkwell_db::store::{DbError, Store};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum FollowError {
    #[error(transparent)]
    SelfFollow(#[from] SelfFollowError),
    #[error("Author {follower} already follows author {author}")]
    AlreadyFollowing {
        follower: Id<AuthorMarker>,
        author: Id<AuthorMarker>,
    },
    #[error(transparent)]
    Database(#[from] DbError),
}

impl FollowError {
    /// Whether the request simply had nothing to do.
    #[must_use]
    pub fn is_no_op(&self) -> bool {
        matches!(self, Self::SelfFollow(_) | Self::AlreadyFollowing { .. })
    }
}

/// Who follows whom.
#[derive(Clone)]
pub struct FollowGraph {
    store: Arc<dyn Store>,
}

impl FollowGraph {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Adds the edge `follower -> author`.
    ///
    /// Fails with a no-op error for self-follows and for edges that already
    /// exist, so repeating a follow never creates a second edge.
    pub async fn follow(
        &self,
        follower: Id<AuthorMarker>,
        author: Id<AuthorMarker>,
    ) -> Result<(), FollowError> {
        let follow = Follow::new(follower, author)?;

        if self.store.insert_follow(follow).await? {
            info!(%follower, %author, "Follow created");
            Ok(())
        } else {
            Err(FollowError::AlreadyFollowing { follower, author })
        }
    }

    /// Removes the edge `follower -> author` if there is one.
    ///
    /// Returns whether an edge was removed.
    pub async fn unfollow(
        &self,
        follower: Id<AuthorMarker>,
        author: Id<AuthorMarker>,
    ) -> Result<bool, DbError> {
        let Ok(follow) = Follow::new(follower, author) else {
            return Ok(false);
        };

        let removed = self.store.delete_follow(follow).await?;
        if removed {
            info!(%follower, %author, "Follow removed");
        }

        Ok(removed)
    }

    /// An anonymous viewer follows nobody.
    pub async fn is_following(
        &self,
        viewer: Option<Id<AuthorMarker>>,
        author: Id<AuthorMarker>,
    ) -> Result<bool, DbError> {
        let Some(follow) = viewer.and_then(|viewer| Follow::new(viewer, author).ok()) else {
            return Ok(false);
        };

        self.store.follow_exists(follow).await
    }
}

#[cfg(test)]
mod tests {
    use crate::follow::{FollowError, FollowGraph};
    use inkwell_common::model::{
        Id,
        author::{AuthorMarker, CreateAuthor, Username},
    };
    use inkwell_db::{memory::MemoryStore, store::Store};
    use std::sync::Arc;

    async fn setup() -> (FollowGraph, Id<AuthorMarker>, Id<AuthorMarker>) {
        let store = Arc::new(MemoryStore::default());
        let mut ids = Vec::new();
        for username in ["reader", "writer"] {
            let author = CreateAuthor {
                username: Username::new(username.to_owned()).unwrap(),
            };
            ids.push(store.create_author(&author).await.unwrap());
        }

        (FollowGraph::new(store), ids[0], ids[1])
    }

    #[tokio::test]
    async fn following_twice_keeps_one_edge() {
        let (graph, reader, writer) = setup().await;

        graph.follow(reader, writer).await.unwrap();
        let second = graph.follow(reader, writer).await.unwrap_err();

        assert!(second.is_no_op());
        assert!(matches!(second, FollowError::AlreadyFollowing { .. }));
        assert!(graph.is_following(Some(reader), writer).await.unwrap());
        assert!(graph.unfollow(reader, writer).await.unwrap());
        assert!(!graph.is_following(Some(reader), writer).await.unwrap());
    }

    #[tokio::test]
    async fn self_follow_creates_no_edge() {
        let (graph, reader, _) = setup().await;

        let err = graph.follow(reader, reader).await.unwrap_err();

        assert!(matches!(err, FollowError::SelfFollow(_)));
        assert!(err.is_no_op());
        assert!(!graph.is_following(Some(reader), reader).await.unwrap());
    }

    #[tokio::test]
    async fn unfollow_without_edge_is_a_no_op() {
        let (graph, reader, writer) = setup().await;

        assert!(!graph.unfollow(reader, writer).await.unwrap());
        assert!(!graph.unfollow(reader, reader).await.unwrap());
    }

    #[tokio::test]
    async fn follows_are_directed() {
        let (graph, reader, writer) = setup().await;

        graph.follow(reader, writer).await.unwrap();

        assert!(!graph.is_following(Some(writer), reader).await.unwrap());
        assert!(!graph.is_following(None, writer).await.unwrap());
    }
}
