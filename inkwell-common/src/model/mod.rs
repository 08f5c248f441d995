pub mod author;
pub mod auth;
pub mod comment;
pub mod follow;
pub mod group;
pub mod post;

use crate::{
    model::{
        auth::{InvalidAuthTokenHashError, NonPositiveLifetimeError},
        author::InvalidUsernameError,
        group::{InvalidGroupSlugError, InvalidGroupTitleError},
        post::{InvalidImageRefError, InvalidTextError},
    },
    snowflake::{Epoch, Snowflake, SnowflakeGenerator},
};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, marker::PhantomData};
use thiserror::Error;
use time::{OffsetDateTime, macros::datetime};

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    Username(#[from] InvalidUsernameError),
    #[error(transparent)]
    GroupSlug(#[from] InvalidGroupSlugError),
    #[error(transparent)]
    GroupTitle(#[from] InvalidGroupTitleError),
    #[error(transparent)]
    Text(#[from] InvalidTextError),
    #[error(transparent)]
    ImageRef(#[from] InvalidImageRefError),
    #[error(transparent)]
    NonPositiveLifetime(#[from] NonPositiveLifetimeError),
    #[error(transparent)]
    TokenHash(#[from] InvalidAuthTokenHashError),
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct InkwellEpoch;
impl Epoch for InkwellEpoch {
    const EPOCH_TIME: OffsetDateTime = datetime!(2025-01-01 00:00 UTC);
}

pub type InkwellSnowflake = Snowflake<InkwellEpoch>;
pub type InkwellSnowflakeGenerator = SnowflakeGenerator<InkwellEpoch>;

#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Id<Marker>(InkwellSnowflake, #[serde(skip)] PhantomData<Marker>);

impl<Marker> Id<Marker> {
    #[must_use]
    pub fn new(snowflake: InkwellSnowflake) -> Self {
        Self(snowflake, PhantomData)
    }

    #[must_use]
    pub fn snowflake(self) -> InkwellSnowflake {
        self.0
    }

    /// Creation time encoded in the id.
    #[must_use]
    pub fn created_at(self) -> OffsetDateTime {
        self.0.created_at()
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> From<InkwellSnowflake> for Id<Marker> {
    fn from(value: InkwellSnowflake) -> Self {
        Self::new(value)
    }
}

impl<Marker> From<Id<Marker>> for InkwellSnowflake {
    fn from(value: Id<Marker>) -> Self {
        value.0
    }
}

impl<Marker> From<u64> for Id<Marker> {
    fn from(value: u64) -> Self {
        Id::new(InkwellSnowflake::new(value))
    }
}

impl<Marker> From<Id<Marker>> for u64 {
    fn from(value: Id<Marker>) -> Self {
        value.snowflake().get()
    }
}
