use crate::model::Id;
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::fmt::{Display, Formatter};
use thiserror::Error;

pub const GROUP_SLUG_MAX_LEN: usize = 50;
pub const GROUP_TITLE_MAX_LEN: usize = 200;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct GroupMarker;

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct Group {
    pub id: Id<GroupMarker>,
    pub slug: GroupSlug,
    pub title: GroupTitle,
    pub description: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct CreateGroup {
    pub slug: GroupSlug,
    pub title: GroupTitle,
    pub description: String,
}

impl Display for Group {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.title.get())
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct GroupSlug(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The group slug is invalid: {0:?}")]
pub struct InvalidGroupSlugError(String);

impl GroupSlug {
    pub fn new(slug: String) -> Result<Self, InvalidGroupSlugError> {
        let valid = (1..=GROUP_SLUG_MAX_LEN).contains(&slug.len())
            && slug
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');

        if valid {
            Ok(Self(slug))
        } else {
            Err(InvalidGroupSlugError(slug))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl Display for GroupSlug {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for GroupSlug {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        GroupSlug::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"GroupSlug"))
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct GroupTitle(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The group title must have between 1 and 200 characters")]
pub struct InvalidGroupTitleError;

impl GroupTitle {
    pub fn new(title: String) -> Result<Self, InvalidGroupTitleError> {
        let len = title.trim().chars().count();
        if len > 0 && title.chars().count() <= GROUP_TITLE_MAX_LEN {
            Ok(Self(title))
        } else {
            Err(InvalidGroupTitleError)
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for GroupTitle {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        GroupTitle::new(inner).map_err(Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use crate::model::group::{Group, GroupSlug, GroupTitle};

    #[test]
    fn group_displays_as_title() {
        let group = Group {
            id: 1.into(),
            slug: GroupSlug::new("test".to_owned()).unwrap(),
            title: GroupTitle::new("test group".to_owned()).unwrap(),
            description: "description".to_owned(),
        };

        assert_eq!(group.to_string(), "test group");
    }

    #[test]
    fn slug_validation() {
        assert!(GroupSlug::new("cats_and-dogs2".to_owned()).is_ok());
        assert!(GroupSlug::new(String::new()).is_err());
        assert!(GroupSlug::new("no spaces".to_owned()).is_err());
        assert!(GroupSlug::new("x".repeat(51)).is_err());
    }

    #[test]
    fn title_validation() {
        assert!(GroupTitle::new("   ".to_owned()).is_err());
        assert!(GroupTitle::new("y".repeat(201)).is_err());
        assert!(GroupTitle::new("Cats".to_owned()).is_ok());
    }
}
