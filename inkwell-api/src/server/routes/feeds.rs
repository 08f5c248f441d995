use crate::{
    cache::FeedCache,
    feed::{FeedAggregator, FeedError, GroupFeed, PostDetail, ProfileFeed},
    follow::FollowGraph,
    server::{
        Result, ServerError, ServerRouter,
        auth::Viewer,
        response::{Json, JsonBody, Query, render},
        routes::PageQuery,
    },
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use inkwell_common::{
    model::{
        Id,
        author::Username,
        group::GroupSlug,
        post::{Post, PostMarker},
    },
    pagination::Page,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(index)
        .typed_get(group_posts)
        .typed_get(follow_index)
        .typed_get(profile)
        .typed_get(post_view)
}

#[derive(Serialize)]
struct IndexView {
    page: Page<Post>,
}

#[derive(TypedPath)]
#[typed_path("/")]
struct IndexPath;

/// The global feed. Served from the page cache while it is fresh.
async fn index(
    _: IndexPath,
    Query(query): Query<PageQuery>,
    State(feeds): State<FeedAggregator>,
    State(cache): State<Arc<FeedCache>>,
) -> Result<JsonBody> {
    let body = cache
        .get_or_render(|| async {
            let page = feeds.global(query.page()).await?;
            render(&IndexView { page })
        })
        .await?;

    Ok(JsonBody(body))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/group/{slug}/", rejection(ServerError))]
struct GroupPath {
    slug: GroupSlug,
}

async fn group_posts(
    GroupPath { slug }: GroupPath,
    Query(query): Query<PageQuery>,
    State(feeds): State<FeedAggregator>,
) -> Result<Json<GroupFeed>> {
    Ok(Json(feeds.group(&slug, query.page()).await?))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/{username}/", rejection(ServerError))]
pub(super) struct ProfilePath {
    pub username: Username,
}

#[derive(Serialize)]
struct ProfileView {
    #[serde(flatten)]
    feed: ProfileFeed,
    following: bool,
}

async fn profile(
    ProfilePath { username }: ProfilePath,
    viewer: Viewer,
    Query(query): Query<PageQuery>,
    State(feeds): State<FeedAggregator>,
    State(follows): State<FollowGraph>,
) -> Result<Json<ProfileView>> {
    let feed = feeds.profile(&username, query.page()).await?;
    let following = follows
        .is_following(viewer.author(), feed.author.id)
        .await?;

    Ok(Json(ProfileView { feed, following }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/{username}/{post_id}/", rejection(ServerError))]
pub(super) struct PostPath {
    pub username: Username,
    pub post_id: Id<PostMarker>,
}

async fn post_view(
    PostPath { username, post_id }: PostPath,
    State(feeds): State<FeedAggregator>,
) -> Result<Json<PostDetail>> {
    Ok(Json(feeds.post_detail(&username, post_id).await?))
}

#[derive(TypedPath)]
#[typed_path("/follow/")]
struct FollowIndexPath;

/// Posts of the authors the viewer follows.
async fn follow_index(
    _: FollowIndexPath,
    viewer: Viewer,
    Query(query): Query<PageQuery>,
    State(feeds): State<FeedAggregator>,
) -> Result<Json<Page<Post>>> {
    match feeds.following(viewer.author(), query.page()).await {
        Err(FeedError::AuthRequired) => Err(viewer.login_required()),
        result => Ok(Json(result?)),
    }
}
