use crate::{
    cache::FeedCache,
    config::LoginUrl,
    feed::{FeedAggregator, FeedError},
    follow::{FollowError, FollowGraph},
};
use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{JsonRejection, PathRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use axum_extra::extract::QueryRejection;
use forms::FieldErrors;
use inkwell_common::{
    model::{Id, auth::AuthTokenHashError, author::AuthorMarker, post::PostMarker},
    pagination::Paginator,
};
use inkwell_db::store::{DbError, Store};
use response::{Found, Json};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Duration;
use tracing::{debug, error};

mod auth;
mod forms;
mod response;
mod routes;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, FromRef)]
pub struct ServerState {
    pub store: Arc<dyn Store>,
    pub feeds: FeedAggregator,
    pub follows: FollowGraph,
    pub feed_cache: Arc<FeedCache>,
    pub login_url: LoginUrl,
}

impl ServerState {
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        paginator: Paginator,
        feed_cache_ttl: Duration,
        login_url: LoginUrl,
    ) -> Self {
        Self {
            feeds: FeedAggregator::new(store.clone(), paginator),
            follows: FollowGraph::new(store.clone()),
            feed_cache: Arc::new(FeedCache::new(feed_cache_ttl)),
            store,
            login_url,
        }
    }
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Query string rejected: {0}")]
    QueryRejection(#[from] QueryRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("The auth token could not be hashed: {0}")]
    AuthTokenHash(#[from] AuthTokenHashError),
    #[error("Authentication required, redirecting to {location}")]
    AuthRequired { location: String },
    #[error("Author {actor} may not edit post {post}")]
    NotOwner {
        actor: Id<AuthorMarker>,
        post: Id<PostMarker>,
        location: String,
    },
    #[error("Submitted form was invalid: {0:?}")]
    Validation(FieldErrors),
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error(transparent)]
    Follow(#[from] FollowError),
    #[error(transparent)]
    Database(#[from] DbError),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::Feed(
                FeedError::AuthorNotFound(_)
                | FeedError::GroupNotFound(_)
                | FeedError::PostNotFound(_),
            ) => StatusCode::NOT_FOUND,
            ServerError::AuthRequired { .. } | ServerError::NotOwner { .. } => StatusCode::FOUND,
            ServerError::Feed(FeedError::AuthRequired) => StatusCode::UNAUTHORIZED,
            ServerError::QueryRejection(_) | ServerError::JsonRejection(_) => {
                StatusCode::BAD_REQUEST
            }
            ServerError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServerError::Follow(err) if err.is_no_op() => StatusCode::CONFLICT,
            ServerError::JsonResponse(_)
            | ServerError::AuthTokenHash(_)
            | ServerError::Feed(FeedError::Database(_))
            | ServerError::Follow(_)
            | ServerError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
struct ErrorResponse {
    status: u16,
    error: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
struct ValidationResponse {
    status: u16,
    errors: FieldErrors,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!(error = %self, %status, "Replying with error");
        } else {
            debug!(error = %self, %status, "Replying with error");
        }

        match self {
            ServerError::AuthRequired { location } | ServerError::NotOwner { location, .. } => {
                Found(location).into_response()
            }
            ServerError::Validation(errors) => {
                let response = ValidationResponse {
                    status: status.as_u16(),
                    errors,
                };
                (status, Json(response)).into_response()
            }
            other => {
                let error = if status.is_server_error() {
                    "Internal server error".to_owned()
                } else {
                    other.to_string()
                };
                let response = ErrorResponse {
                    status: status.as_u16(),
                    error,
                };
                (status, Json(response)).into_response()
            }
        }
    }
}
