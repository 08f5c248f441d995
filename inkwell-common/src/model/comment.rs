use crate::model::{Id, author::Author, post::{BodyText, PostMarker}};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct CommentMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Comment {
    pub id: Id<CommentMarker>,
    pub post: Id<PostMarker>,
    pub author: Author,
    pub text: BodyText,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
