use inkwell_common::{
    pagination::{DEFAULT_PAGE_SIZE, Paginator},
    snowflake::{ProcessId, WorkerId},
};
use serde::Deserialize;
use std::{
    net::{IpAddr, SocketAddr},
    num::NonZeroU64,
    sync::Arc,
};
use tokio::time::Duration;

pub const DEFAULT_LOGIN_URL: &str = "/auth/login/";
pub const DEFAULT_FEED_CACHE_SECONDS: u64 = 20;

fn default_max_connections() -> u32 {
    5
}

fn default_posts_per_page() -> NonZeroU64 {
    DEFAULT_PAGE_SIZE
}

fn default_feed_cache_seconds() -> u64 {
    DEFAULT_FEED_CACHE_SECONDS
}

fn default_login_url() -> String {
    DEFAULT_LOGIN_URL.to_owned()
}

/// Process configuration, read from the environment.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct Env {
    pub server_address: IpAddr,
    pub server_port: u16,
    /// Without a database the server keeps everything in memory.
    pub database_url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,
    #[serde(default)]
    pub worker_id: WorkerId,
    #[serde(default)]
    pub process_id: ProcessId,
    #[serde(default = "default_posts_per_page")]
    pub posts_per_page: NonZeroU64,
    #[serde(default = "default_feed_cache_seconds")]
    pub feed_cache_seconds: u64,
    #[serde(default = "default_login_url")]
    pub login_url: String,
}

impl Env {
    #[must_use]
    pub fn socket_address(&self) -> SocketAddr {
        SocketAddr::new(self.server_address, self.server_port)
    }

    #[must_use]
    pub fn paginator(&self) -> Paginator {
        Paginator::new(self.posts_per_page)
    }

    #[must_use]
    pub fn feed_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.feed_cache_seconds)
    }

    #[must_use]
    pub fn login_url(&self) -> LoginUrl {
        LoginUrl(self.login_url.as_str().into())
    }
}

/// Where anonymous visitors of protected pages are sent.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct LoginUrl(Arc<str>);

impl Default for LoginUrl {
    fn default() -> Self {
        Self(DEFAULT_LOGIN_URL.into())
    }
}

impl LoginUrl {
    /// The login location that returns to `next` afterwards.
    ///
    /// `next` is encoded per path segment, so its slashes stay readable.
    #[must_use]
    pub fn with_next(&self, next: &str) -> String {
        let encoded: Vec<_> = next.split('/').map(urlencoding::encode).collect();
        let separator = if self.0.contains('?') { '&' } else { '?' };
        format!("{}{separator}next={}", self.0, encoded.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{Env, LoginUrl};

    #[test]
    fn defaults_fill_optional_variables() {
        let env: Env = envy::from_iter([
            ("SERVER_ADDRESS".to_owned(), "127.0.0.1".to_owned()),
            ("SERVER_PORT".to_owned(), "8000".to_owned()),
        ])
        .unwrap();

        assert_eq!(env.database_url, None);
        assert_eq!(env.database_max_connections, 5);
        assert_eq!(env.paginator().page_size(), 10);
        assert_eq!(env.feed_cache_ttl().as_secs(), 20);
        assert_eq!(env.login_url(), LoginUrl::default());
        assert_eq!(env.socket_address().to_string(), "127.0.0.1:8000");
    }

    #[test]
    fn snowflake_parts_are_range_checked() {
        let result = envy::from_iter::<_, Env>([
            ("SERVER_ADDRESS".to_owned(), "127.0.0.1".to_owned()),
            ("SERVER_PORT".to_owned(), "8000".to_owned()),
            ("WORKER_ID".to_owned(), "32".to_owned()),
        ]);

        assert!(result.is_err());
    }

    #[test]
    fn login_location_keeps_slashes_of_next() {
        let login = LoginUrl::default();

        assert_eq!(
            login.with_next("/leo/12/edit/"),
            "/auth/login/?next=/leo/12/edit/"
        );
        assert_eq!(
            login.with_next("/лев/follow/"),
            "/auth/login/?next=/%D0%BB%D0%B5%D0%B2/follow/"
        );
        assert_eq!(
            login.with_next("/follow/?page=2"),
            "/auth/login/?next=/follow/%3Fpage%3D2"
        );
    }

    #[test]
    fn login_url_with_query_gets_next_appended() {
        let env: Env = envy::from_iter([
            ("SERVER_ADDRESS".to_owned(), "127.0.0.1".to_owned()),
            ("SERVER_PORT".to_owned(), "8000".to_owned()),
            ("LOGIN_URL".to_owned(), "/accounts/login/?source=blog".to_owned()),
        ])
        .unwrap();

        assert_eq!(
            env.login_url().with_next("/new/"),
            "/accounts/login/?source=blog&next=/new/"
        );
    }
}
