//! Post composition, detail pages, deletion, and voting.

use axum::{
    Form,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use crate::application::error::AppError;
use crate::presentation::comments::render_tree;
use crate::presentation::views::{
    ComposeContext, ComposeTemplate, FragmentContext, LayoutContext, PostCardFragment,
    PostCardView, PostDetailContext, PostFragment, PostTemplate, ToastView,
    render_template_response,
};

use super::{
    HttpState, cache_comments, cache_posts, error_page, failure_toast, is_htmx, page_chrome,
    record_action, signed_in_agent, submolts,
};

pub(super) async fn compose(State(state): State<HttpState>) -> Response {
    render_compose(&state, None, StatusCode::OK).await
}

async fn render_compose(state: &HttpState, error: Option<String>, status: StatusCode) -> Response {
    let submolts = submolts::known_submolt_names(state).await;
    let chrome = page_chrome(state).await.titled("Compose");
    render_template_response(
        ComposeTemplate {
            view: LayoutContext::new(chrome, ComposeContext { submolts, error }),
        },
        status,
    )
}

#[derive(Debug, Deserialize)]
pub(super) struct ComposeForm {
    title: Option<String>,
    url: Option<String>,
    content: Option<String>,
    submolt: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(super) async fn create(
    State(state): State<HttpState>,
    Form(form): Form<ComposeForm>,
) -> Response {
    let Some(title) = non_empty(form.title) else {
        return render_compose(
            &state,
            Some("Title is required".to_string()),
            StatusCode::OK,
        )
        .await;
    };
    let url = non_empty(form.url);
    let content = non_empty(form.content);
    let submolt = non_empty(form.submolt);

    match state
        .client
        .create_post(&title, content.as_deref(), url.as_deref(), submolt.as_deref())
        .await
    {
        Ok(id) => {
            record_action(&state.store, "post", id.as_deref(), Some(&title)).await;
            match id {
                Some(id) => Redirect::to(&format!("/posts/{id}")).into_response(),
                None => Redirect::to("/").into_response(),
            }
        }
        Err(err) => {
            let err = AppError::from(err);
            render_compose(&state, Some(err.user_message()), StatusCode::OK).await
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub(super) struct DetailQuery {
    #[serde(rename = "_fragment")]
    fragment: Option<String>,
}

pub(super) async fn detail(
    State(state): State<HttpState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Query(query): Query<DetailQuery>,
) -> Response {
    let post = match state.client.get_post(&id).await {
        Ok(post) => post,
        Err(err) => {
            return error_page(
                "infra::http::posts::detail",
                page_chrome(&state).await,
                "Could not load post",
                &err.into(),
            );
        }
    };
    cache_posts(&state.store, std::slice::from_ref(&post)).await;

    let comments = match state.client.get_comments(&id).await {
        Ok(comments) => comments,
        Err(err) => {
            return error_page(
                "infra::http::posts::detail",
                page_chrome(&state).await,
                "Could not load comments",
                &err.into(),
            );
        }
    };
    cache_comments(&state.store, &comments).await;

    let comments_html = match render_tree(&comments, &id, &state.markdown) {
        Ok(html) => html,
        Err(err) => return err.into_response(),
    };

    let me = signed_in_agent(&state).await;
    let is_author = me
        .as_deref()
        .is_some_and(|name| name.eq_ignore_ascii_case(&post.author));
    let content = PostDetailContext {
        post: PostCardView::from_post(&post, &state.markdown),
        is_author,
        comments_html,
    };

    if is_htmx(&headers) || query.fragment.is_some() {
        return render_template_response(
            PostFragment {
                view: FragmentContext::new(content),
            },
            StatusCode::OK,
        );
    }

    let chrome = page_chrome(&state).await.titled(post.title.clone());
    render_template_response(
        PostTemplate {
            view: LayoutContext::new(chrome, content),
        },
        StatusCode::OK,
    )
}

pub(super) async fn delete(
    State(state): State<HttpState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    match state.client.delete_post(&id).await {
        Ok(()) => {
            record_action(&state.store, "delete_post", Some(&id), None).await;
            if is_htmx(&headers) {
                let mut response = StatusCode::OK.into_response();
                response.headers_mut().insert(
                    HeaderName::from_static("hx-redirect"),
                    HeaderValue::from_static("/"),
                );
                response
            } else {
                Redirect::to("/").into_response()
            }
        }
        Err(err) => failure_toast("infra::http::posts::delete", &err.into()),
    }
}

pub(super) async fn upvote(
    State(state): State<HttpState>,
    Path(id): Path<String>,
) -> Response {
    vote(state, id, Direction::Up).await
}

pub(super) async fn downvote(
    State(state): State<HttpState>,
    Path(id): Path<String>,
) -> Response {
    vote(state, id, Direction::Down).await
}

enum Direction {
    Up,
    Down,
}

/// Votes re-fetch the post and answer with a fresh card so the swapped-in
/// article shows the remote's score, not a local guess.
async fn vote(state: HttpState, id: String, direction: Direction) -> Response {
    let (action, label, voted) = match direction {
        Direction::Up => ("upvote_post", "Upvoted", state.client.upvote_post(&id).await),
        Direction::Down => (
            "downvote_post",
            "Downvoted",
            state.client.downvote_post(&id).await,
        ),
    };
    if let Err(err) = voted {
        return failure_toast("infra::http::posts::vote", &err.into());
    }
    record_action(&state.store, action, Some(&id), None).await;

    match state.client.get_post(&id).await {
        Ok(post) => {
            cache_posts(&state.store, std::slice::from_ref(&post)).await;
            let card = PostCardView::from_post(&post, &state.markdown);
            render_template_response(
                PostCardFragment {
                    view: FragmentContext::with_toast(card, ToastView::success(label)),
                },
                StatusCode::OK,
            )
        }
        Err(err) => failure_toast("infra::http::posts::vote", &err.into()),
    }
}
