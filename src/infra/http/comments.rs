//! Comment creation and voting.
//!
//! Comment votes target the comment's own node with an `outerHTML` swap, so
//! both vote and reply handlers answer with freshly rendered comment markup
//! rather than a bare toast. The post id for a comment vote comes from the
//! local comment cache, which is written on every comment fetch.

use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;

use crate::application::error::AppError;
use crate::presentation::comments::{render_subtree, render_tree};
use crate::presentation::views::ToastView;

use super::{HttpState, cache_comments, failure_toast, record_action, toast_markup};

#[derive(Debug, Deserialize)]
pub(super) struct CommentForm {
    content: Option<String>,
    parent_id: Option<String>,
}

pub(super) async fn create(
    State(state): State<HttpState>,
    Path(post_id): Path<String>,
    Form(form): Form<CommentForm>,
) -> Response {
    let content = form
        .content
        .map(|c| c.trim().to_string())
        .unwrap_or_default();
    if content.is_empty() {
        return failure_toast(
            "infra::http::comments::create",
            &AppError::validation("Comment cannot be empty"),
        );
    }
    let parent_id = form
        .parent_id
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());

    if let Err(err) = state
        .client
        .create_comment(&post_id, &content, parent_id.as_deref())
        .await
    {
        return failure_toast("infra::http::comments::create", &err.into());
    }
    let excerpt: String = content.chars().take(100).collect();
    record_action(&state.store, "comment", Some(&post_id), Some(&excerpt)).await;

    // Re-fetch and swap the whole tree so the new comment lands threaded.
    match state.client.get_comments(&post_id).await {
        Ok(comments) => {
            cache_comments(&state.store, &comments).await;
            let tree = match render_tree(&comments, &post_id, &state.markdown) {
                Ok(tree) => tree,
                Err(err) => return err.into_response(),
            };
            let toast = match toast_markup(ToastView::success("Comment posted")) {
                Ok(toast) => toast,
                Err(response) => return response,
            };
            Html(format!("{tree}{toast}")).into_response()
        }
        Err(err) => failure_toast("infra::http::comments::create", &err.into()),
    }
}

pub(super) async fn upvote(State(state): State<HttpState>, Path(id): Path<String>) -> Response {
    vote(state, id, Direction::Up).await
}

pub(super) async fn downvote(State(state): State<HttpState>, Path(id): Path<String>) -> Response {
    vote(state, id, Direction::Down).await
}

enum Direction {
    Up,
    Down,
}

async fn vote(state: HttpState, id: String, direction: Direction) -> Response {
    let post_id = match state.store.cached_comment(&id).await {
        Ok(Some(cached)) => cached.post_id,
        Ok(None) => None,
        Err(err) => return failure_toast("infra::http::comments::vote", &err.into()),
    };
    let Some(post_id) = post_id else {
        return failure_toast(
            "infra::http::comments::vote",
            &AppError::unexpected(format!("no cached post for comment {id}")),
        );
    };

    let (action, label, voted) = match direction {
        Direction::Up => (
            "upvote_comment",
            "Upvoted",
            state.client.upvote_comment(&id).await,
        ),
        Direction::Down => (
            "downvote_comment",
            "Downvoted",
            state.client.downvote_comment(&id).await,
        ),
    };
    if let Err(err) = voted {
        return failure_toast("infra::http::comments::vote", &err.into());
    }
    record_action(&state.store, action, Some(&id), None).await;

    match state.client.get_comments(&post_id).await {
        Ok(comments) => {
            cache_comments(&state.store, &comments).await;
            let subtree = match render_subtree(&comments, &id, &post_id, &state.markdown) {
                Ok(subtree) => subtree,
                Err(err) => return err.into_response(),
            };
            let toast = match toast_markup(ToastView::success(label)) {
                Ok(toast) => toast,
                Err(response) => return response,
            };
            // A vanished comment swaps to nothing, removing the node.
            let body = subtree.unwrap_or_default();
            (StatusCode::OK, Html(format!("{body}{toast}"))).into_response()
        }
        Err(err) => failure_toast("infra::http::comments::vote", &err.into()),
    }
}
