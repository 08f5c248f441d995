use crate::{
    feed::FeedError,
    server::{
        Result, ServerError, ServerRouter,
        auth::AuthenticatedAuthor,
        forms::{CommentForm, PostForm},
        response::{Found, Json},
        routes::feeds::PostPath,
    },
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use inkwell_common::model::{
    Id,
    author::Username,
    group::Group,
    post::{Post, PostMarker},
};
use inkwell_db::store::Store;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(new_post_form)
        .typed_post(create_post)
        .typed_get(edit_post_form)
        .typed_post(edit_post)
        .typed_post(add_comment)
}

/// What a post form is rendered from.
#[derive(Serialize)]
struct PostFormContext {
    groups: Vec<Group>,
    post: Option<Post>,
}

#[derive(TypedPath)]
#[typed_path("/new/")]
struct NewPostPath;

async fn new_post_form(
    _: NewPostPath,
    _: AuthenticatedAuthor,
    State(store): State<Arc<dyn Store>>,
) -> Result<Json<PostFormContext>> {
    Ok(Json(PostFormContext {
        groups: store.fetch_groups().await?,
        post: None,
    }))
}

async fn create_post(
    _: NewPostPath,
    author: AuthenticatedAuthor,
    State(store): State<Arc<dyn Store>>,
    Json(form): Json<PostForm>,
) -> Result<Found> {
    let content = form.validate(store.as_ref()).await?;
    let post_id = store.create_post(author.author_id(), &content).await?;
    info!(%post_id, author = %author.author_id(), "Post created");

    Ok(Found("/".to_owned()))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/{username}/{post_id}/edit/", rejection(ServerError))]
struct EditPostPath {
    username: Username,
    post_id: Id<PostMarker>,
}

impl EditPostPath {
    fn view(&self) -> PostPath {
        PostPath {
            username: self.username.clone(),
            post_id: self.post_id,
        }
    }
}

/// The post behind an edit request, if `author` may edit it.
///
/// Everybody else is sent to the read-only view of the post.
async fn editable_post(
    path: &EditPostPath,
    author: AuthenticatedAuthor,
    store: &dyn Store,
) -> Result<Post> {
    let post = store
        .fetch_post(path.post_id)
        .await?
        .ok_or(FeedError::PostNotFound(path.post_id))?;

    if post.can_edit(author.author_id()) {
        Ok(post)
    } else {
        Err(ServerError::NotOwner {
            actor: author.author_id(),
            post: post.id,
            location: path.view().to_string(),
        })
    }
}

async fn edit_post_form(
    path: EditPostPath,
    author: AuthenticatedAuthor,
    State(store): State<Arc<dyn Store>>,
) -> Result<Json<PostFormContext>> {
    let post = editable_post(&path, author, store.as_ref()).await?;

    Ok(Json(PostFormContext {
        groups: store.fetch_groups().await?,
        post: Some(post),
    }))
}

async fn edit_post(
    path: EditPostPath,
    author: AuthenticatedAuthor,
    State(store): State<Arc<dyn Store>>,
    Json(form): Json<PostForm>,
) -> Result<Found> {
    let post = editable_post(&path, author, store.as_ref()).await?;
    let content = form.validate(store.as_ref()).await?;

    if !store.update_post(post.id, &content).await? {
        return Err(FeedError::PostNotFound(post.id).into());
    }
    info!(post_id = %post.id, "Post edited");

    let view = PostPath {
        username: post.author.username,
        post_id: post.id,
    };
    Ok(Found(view.to_string()))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/{username}/{post_id}/comment/", rejection(ServerError))]
struct CommentPath {
    username: Username,
    post_id: Id<PostMarker>,
}

async fn add_comment(
    CommentPath { username, post_id }: CommentPath,
    author: AuthenticatedAuthor,
    State(store): State<Arc<dyn Store>>,
    Json(form): Json<CommentForm>,
) -> Result<Found> {
    if store.fetch_post(post_id).await?.is_none() {
        return Err(FeedError::PostNotFound(post_id).into());
    }
    let text = form.validate()?;
    let comment_id = store
        .create_comment(post_id, author.author_id(), &text)
        .await?;
    info!(%comment_id, %post_id, "Comment created");

    Ok(Found(PostPath { username, post_id }.to_string()))
}
