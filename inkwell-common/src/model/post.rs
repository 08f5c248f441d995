use crate::model::{
    Id,
    author::{Author, AuthorMarker},
    group::{Group, GroupMarker},
};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::fmt::{Display, Formatter};
use thiserror::Error;
use time::OffsetDateTime;

pub const POST_DISPLAY_LEN: usize = 15;
pub const IMAGE_REF_MAX_LEN: usize = 100;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub author: Author,
    pub group: Option<Group>,
    pub text: BodyText,
    pub image: Option<ImageRef>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Post {
    /// Only the author of a post may change it.
    #[must_use]
    pub fn can_edit(&self, actor: Id<AuthorMarker>) -> bool {
        self.author.id == actor
    }
}

impl Display for Post {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let preview: String = self.text.get().chars().take(POST_DISPLAY_LEN).collect();
        f.write_str(&preview)
    }
}

/// The mutable part of a post, as submitted by its author.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct PostContent {
    pub text: BodyText,
    pub group: Option<Id<GroupMarker>>,
    pub image: Option<ImageRef>,
}

/// Text of a post or comment. Never blank.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct BodyText(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The text must not be blank")]
pub struct InvalidTextError;

impl BodyText {
    pub fn new(text: String) -> Result<Self, InvalidTextError> {
        if text.trim().is_empty() {
            Err(InvalidTextError)
        } else {
            Ok(Self(text))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl<'de> Deserialize<'de> for BodyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        BodyText::new(inner).map_err(Error::custom)
    }
}

/// Reference to an image held by the upload storage.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct ImageRef(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The image reference is invalid: {0:?}")]
pub struct InvalidImageRefError(String);

impl ImageRef {
    pub fn new(reference: String) -> Result<Self, InvalidImageRefError> {
        if reference.is_empty() || reference.chars().count() > IMAGE_REF_MAX_LEN {
            Err(InvalidImageRefError(reference))
        } else {
            Ok(Self(reference))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for ImageRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        ImageRef::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"ImageRef"))
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{
        author::{Author, Username},
        post::{BodyText, ImageRef, Post},
    };
    use time::macros::datetime;

    fn post(author_id: u64, text: &str) -> Post {
        Post {
            id: 7.into(),
            author: Author {
                id: author_id.into(),
                username: Username::new("author".to_owned()).unwrap(),
            },
            group: None,
            text: BodyText::new(text.to_owned()).unwrap(),
            image: None,
            created_at: datetime!(2025-06-01 12:00 UTC),
        }
    }

    #[test]
    fn post_displays_first_fifteen_characters() {
        assert_eq!(post(1, "тестовый текст поста").to_string(), "тестовый текст ");
        assert_eq!(post(1, "short").to_string(), "short");
    }

    #[test]
    fn only_the_author_can_edit() {
        let post = post(1, "text");
        assert!(post.can_edit(1.into()));
        assert!(!post.can_edit(2.into()));
    }

    #[test]
    fn blank_text_is_rejected() {
        assert!(BodyText::new(String::new()).is_err());
        assert!(BodyText::new(" \n\t".to_owned()).is_err());
        assert!(BodyText::new(" text ".to_owned()).is_ok());
    }

    #[test]
    fn image_ref_limits() {
        assert!(ImageRef::new("posts/small.gif".to_owned()).is_ok());
        assert!(ImageRef::new(String::new()).is_err());
        assert!(ImageRef::new("i".repeat(101)).is_err());
    }
}
