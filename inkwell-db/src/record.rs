use inkwell_common::model::{
    Id, ModelValidationError,
    auth::{Authentication, TokenLifetime},
    author::{Author, Username},
    comment::Comment,
    group::{Group, GroupSlug, GroupTitle},
    post::{BodyText, ImageRef, Post},
};
use sqlx::FromRow;
use time::{Duration, OffsetDateTime};

pub(crate) fn to_db_id<Marker>(id: Id<Marker>) -> i64 {
    id.snowflake().get().cast_signed()
}

fn from_db_id<Marker>(snowflake: i64) -> Id<Marker> {
    snowflake.cast_unsigned().into()
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct AuthorRecord {
    pub author_snowflake: i64,
    pub username: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct GroupRecord {
    pub group_snowflake: i64,
    pub slug: String,
    pub title: String,
    pub description: String,
}

/// A post joined with its author and, if any, its group.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct FullPostRecord {
    pub post_snowflake: i64,
    pub content: String,
    pub image: Option<String>,
    pub author_snowflake: i64,
    pub username: String,
    pub group_snowflake: Option<i64>,
    pub slug: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct CommentRecord {
    pub comment_snowflake: i64,
    pub post_snowflake: i64,
    pub content: String,
    pub author_snowflake: i64,
    pub username: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct AuthenticationRecord {
    pub author_snowflake: i64,
    pub token_hash: Vec<u8>,
    pub created_at: OffsetDateTime,
    pub expires_after_seconds: Option<i64>,
}

impl TryFrom<AuthorRecord> for Author {
    type Error = ModelValidationError;

    fn try_from(value: AuthorRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: from_db_id(value.author_snowflake),
            username: Username::new(value.username)?,
        })
    }
}

impl TryFrom<GroupRecord> for Group {
    type Error = ModelValidationError;

    fn try_from(value: GroupRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: from_db_id(value.group_snowflake),
            slug: GroupSlug::new(value.slug)?,
            title: GroupTitle::new(value.title)?,
            description: value.description,
        })
    }
}

impl TryFrom<FullPostRecord> for Post {
    type Error = ModelValidationError;

    fn try_from(value: FullPostRecord) -> Result<Self, Self::Error> {
        let group = match (value.group_snowflake, value.slug, value.title, value.description) {
            (Some(group_snowflake), Some(slug), Some(title), Some(description)) => {
                Some(Group::try_from(GroupRecord {
                    group_snowflake,
                    slug,
                    title,
                    description,
                })?)
            }
            _ => None,
        };
        let id = from_db_id(value.post_snowflake);

        Ok(Self {
            id,
            author: Author {
                id: from_db_id(value.author_snowflake),
                username: Username::new(value.username)?,
            },
            group,
            text: BodyText::new(value.content)?,
            image: value.image.map(ImageRef::new).transpose()?,
            created_at: id.created_at(),
        })
    }
}

impl TryFrom<CommentRecord> for Comment {
    type Error = ModelValidationError;

    fn try_from(value: CommentRecord) -> Result<Self, Self::Error> {
        let id = from_db_id(value.comment_snowflake);

        Ok(Self {
            id,
            post: from_db_id(value.post_snowflake),
            author: Author {
                id: from_db_id(value.author_snowflake),
                username: Username::new(value.username)?,
            },
            text: BodyText::new(value.content)?,
            created_at: id.created_at(),
        })
    }
}

impl TryFrom<AuthenticationRecord> for Authentication {
    type Error = ModelValidationError;

    fn try_from(value: AuthenticationRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            author: from_db_id(value.author_snowflake),
            token_hash: value.token_hash.into_boxed_slice().try_into()?,
            created_at: value.created_at,
            expires_after: value
                .expires_after_seconds
                .map(|seconds| TokenLifetime::try_from(Duration::seconds(seconds)))
                .transpose()?,
        })
    }
}
