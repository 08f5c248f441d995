use crate::model::{Id, author::AuthorMarker};
use serde::Serialize;
use thiserror::Error;

/// Directed edge: `follower` sees the posts of `author` in their following feed.
///
/// Constructing one already rules out self-follows, so storage only has to
/// care about uniqueness of the pair.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
pub struct Follow {
    follower: Id<AuthorMarker>,
    author: Id<AuthorMarker>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Error)]
#[error("Author {0} cannot follow themselves")]
pub struct SelfFollowError(pub Id<AuthorMarker>);

impl Follow {
    pub fn new(
        follower: Id<AuthorMarker>,
        author: Id<AuthorMarker>,
    ) -> Result<Self, SelfFollowError> {
        if follower == author {
            Err(SelfFollowError(follower))
        } else {
            Ok(Self { follower, author })
        }
    }

    #[must_use]
    pub fn follower(self) -> Id<AuthorMarker> {
        self.follower
    }

    #[must_use]
    pub fn author(self) -> Id<AuthorMarker> {
        self.author
    }
}
