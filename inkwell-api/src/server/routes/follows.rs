use crate::{
    feed::FeedAggregator,
    follow::FollowGraph,
    server::{
        Result, ServerError, ServerRouter, auth::AuthenticatedAuthor, response::Found,
        routes::feeds::ProfilePath,
    },
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use inkwell_common::model::author::Username;
use serde::Deserialize;
use tracing::debug;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(profile_follow)
        .typed_get(profile_unfollow)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/{username}/follow/", rejection(ServerError))]
struct FollowPath {
    username: Username,
}

async fn profile_follow(
    FollowPath { username }: FollowPath,
    follower: AuthenticatedAuthor,
    State(feeds): State<FeedAggregator>,
    State(follows): State<FollowGraph>,
) -> Result<Found> {
    let author = feeds.author(&username).await?;

    match follows.follow(follower.author_id(), author.id).await {
        Err(err) if err.is_no_op() => debug!(error = %err, "Ignoring follow request"),
        result => result?,
    }

    Ok(Found(ProfilePath { username }.to_string()))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/{username}/unfollow/", rejection(ServerError))]
struct UnfollowPath {
    username: Username,
}

async fn profile_unfollow(
    UnfollowPath { username }: UnfollowPath,
    follower: AuthenticatedAuthor,
    State(feeds): State<FeedAggregator>,
    State(follows): State<FollowGraph>,
) -> Result<Found> {
    let author = feeds.author(&username).await?;

    if !follows.unfollow(follower.author_id(), author.id).await? {
        debug!(follower = %follower.author_id(), author = %author.id, "Nothing to unfollow");
    }

    Ok(Found(ProfilePath { username }.to_string()))
}
