use crate::{config::LoginUrl, server::ServerError};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use inkwell_common::model::{Id, auth::AuthToken, author::AuthorMarker};
use inkwell_db::store::Store;
use std::{borrow::Cow, sync::Arc};
use time::OffsetDateTime;
use tracing::debug;

type AuthorizationHeader = TypedHeader<Authorization<Bearer>>;

/// Resolves the bearer token of a request to its author.
///
/// Missing, malformed, unknown and expired tokens all identify nobody. Only
/// failures to check a token are errors.
async fn authenticate<S>(
    parts: &mut Parts,
    state: &S,
) -> Result<Option<Id<AuthorMarker>>, ServerError>
where
    Arc<dyn Store>: FromRef<S>,
    S: Send + Sync,
{
    let Ok(header) = AuthorizationHeader::from_request_parts(parts, state).await else {
        return Ok(None);
    };

    let request_token: AuthToken = match header.token().parse() {
        Ok(token) => token,
        Err(err) => {
            debug!(error = %err, "Ignoring malformed auth token");
            return Ok(None);
        }
    };
    let token_hash = request_token.hash()?;

    let store = Arc::<dyn Store>::from_ref(state);
    let Some(authentication) = store.fetch_auth(&token_hash).await? else {
        debug!(author = %request_token.author_id, "Ignoring unknown auth token");
        return Ok(None);
    };

    if authentication.author != request_token.author_id
        || authentication.is_expired_at(OffsetDateTime::now_utc())
    {
        debug!(author = %request_token.author_id, "Ignoring stale auth token");
        return Ok(None);
    }

    Ok(Some(authentication.author))
}

/// The request path and query, as they should come back after logging in.
fn request_path(parts: &Parts) -> String {
    let path = parts.uri.path();
    let path = urlencoding::decode(path).map_or_else(|_| path.to_owned(), Cow::into_owned);

    match parts.uri.query() {
        Some(query) => format!("{path}?{query}"),
        None => path,
    }
}

/// Whoever made the request, possibly nobody.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Viewer {
    author: Option<Id<AuthorMarker>>,
    path: String,
    login_url: LoginUrl,
}

impl Viewer {
    #[must_use]
    pub fn author(&self) -> Option<Id<AuthorMarker>> {
        self.author
    }

    /// Redirect to the login page that comes back to this request.
    #[must_use]
    pub fn login_required(&self) -> ServerError {
        ServerError::AuthRequired {
            location: self.login_url.with_next(&self.path),
        }
    }

    pub fn require(self) -> Result<AuthenticatedAuthor, ServerError> {
        match self.author {
            Some(id) => Ok(AuthenticatedAuthor { id }),
            None => Err(self.login_required()),
        }
    }
}

impl<S> FromRequestParts<S> for Viewer
where
    Arc<dyn Store>: FromRef<S>,
    LoginUrl: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let author = authenticate(parts, state).await?;

        Ok(Self {
            author,
            path: request_path(parts),
            login_url: LoginUrl::from_ref(state),
        })
    }
}

/// An author proven by their bearer token.
///
/// Anonymous requests are redirected to the login page instead.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct AuthenticatedAuthor {
    id: Id<AuthorMarker>,
}

impl AuthenticatedAuthor {
    #[must_use]
    pub fn author_id(self) -> Id<AuthorMarker> {
        self.id
    }
}

impl<S> FromRequestParts<S> for AuthenticatedAuthor
where
    Arc<dyn Store>: FromRef<S>,
    LoginUrl: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Viewer::from_request_parts(parts, state).await?.require()
    }
}

#[cfg(test)]
mod tests {
    use crate::server::tests::{TestServer, json, location};
    use axum::http::StatusCode;
    use inkwell_common::model::auth::{AuthToken, Authentication, TokenLifetime};
    use inkwell_db::store::Store;
    use time::{Duration, OffsetDateTime};

    #[tokio::test]
    async fn anonymous_requests_to_protected_pages_go_to_login() {
        let server = TestServer::new();
        let (leo, _) = server.author("leo").await;
        let post = server.post(leo, "text", None).await;

        for path in [
            "/new/".to_owned(),
            "/follow/".to_owned(),
            "/leo/follow/".to_owned(),
            "/leo/unfollow/".to_owned(),
            format!("/leo/{post}/edit/"),
        ] {
            let response = server.get(&path, None).await;

            assert_eq!(response.status(), StatusCode::FOUND, "{path}");
            assert_eq!(location(&response), format!("/auth/login/?next={path}"));
        }
    }

    #[tokio::test]
    async fn login_redirect_keeps_the_query_string() {
        let server = TestServer::new();

        let response = server.get("/follow/?page=2", None).await;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "/auth/login/?next=/follow/%3Fpage%3D2");
    }

    #[tokio::test]
    async fn invalid_tokens_count_as_anonymous() {
        let server = TestServer::new();
        let (leo, token) = server.author("leo").await;
        let forged = AuthToken::generate_random(leo).as_token_str();
        let (_, other_token) = server.author("kim").await;
        let (_, other_core) = other_token.split_once(':').unwrap();
        let spoofed = format!("{leo}:{other_core}");

        for token in ["garbage", forged.as_str(), spoofed.as_str()] {
            let response = server.get("/follow/", Some(token)).await;
            assert_eq!(response.status(), StatusCode::FOUND, "{token}");
        }

        let response = server.get("/follow/", Some(&token)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn expired_tokens_count_as_anonymous() {
        let server = TestServer::new();
        let (leo, _) = server.author("leo").await;
        let token = AuthToken::generate_random(leo);
        server
            .store
            .create_auth(&Authentication {
                author: leo,
                token_hash: token.hash().unwrap(),
                created_at: OffsetDateTime::now_utc() - Duration::hours(2),
                expires_after: TokenLifetime::new(Duration::hours(1)),
            })
            .await
            .unwrap();

        let response = server.get("/follow/", Some(&token.as_token_str())).await;

        assert_eq!(response.status(), StatusCode::FOUND);
    }

    #[tokio::test]
    async fn public_pages_accept_anonymous_viewers() {
        let server = TestServer::new();
        server.author("leo").await;

        let response = server.get("/leo/", Some("garbage")).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["following"], false);
    }
}
