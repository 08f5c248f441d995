use crate::server::ServerRouter;
use serde::Deserialize;

mod feeds;
mod follows;
mod posts;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .merge(feeds::routes())
        .merge(posts::routes())
        .merge(follows::routes())
}

/// `?page=` of list views. Kept raw, the paginator decides what it means.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
struct PageQuery {
    #[serde(default)]
    page: Vec<String>,
}

impl PageQuery {
    /// The last `page` value wins when the parameter is repeated.
    fn page(&self) -> Option<&str> {
        self.page.last().map(String::as_str)
    }
}
