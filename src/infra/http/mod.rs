//! HTTP surface: router, shared handler helpers, and middleware.
//!
//! Every page has two render paths. A plain browser navigation gets the full
//! layout; an HTMX request (`HX-Request: true` or an explicit `_fragment=1`)
//! gets just the content plus an optional out-of-band toast. Handlers fetch
//! from the remote API per request and write what they fetched into the local
//! cache as a side effect.

mod auth;
mod comments;
mod feed;
mod messages;
mod middleware;
mod moderation;
mod moltys;
mod posts;
mod profile;
mod search;
mod submolts;

pub use middleware::RequestContext;

use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tracing::warn;

use crate::application::{
    error::{AppError, ErrorReport},
    markdown::MarkdownRenderer,
    names::NameCache,
};
use crate::infra::api::MoltbookClient;
use crate::infra::assets::{AssetDir, AssetError};
use crate::infra::db::Store;
use crate::presentation::views::{
    ErrorPageContext, ErrorTemplate, FragmentContext, LayoutChrome, LayoutContext, ToastFragment,
    ToastView, render_not_found_response, render_template, render_template_response,
};

#[derive(Clone)]
pub struct HttpState {
    pub store: Store,
    pub client: MoltbookClient,
    pub markdown: Arc<MarkdownRenderer>,
    pub agent_names: Arc<NameCache>,
    pub submolt_names: Arc<NameCache>,
    pub assets: Arc<AssetDir>,
}

impl HttpState {
    pub fn new(store: Store, client: MoltbookClient, assets: AssetDir) -> Self {
        Self {
            store,
            client,
            markdown: Arc::new(MarkdownRenderer::new()),
            agent_names: Arc::new(NameCache::new(
                "agents",
                crate::application::names::DEFAULT_TTL,
            )),
            submolt_names: Arc::new(NameCache::new(
                "submolts",
                crate::application::names::DEFAULT_TTL,
            )),
            assets: Arc::new(assets),
        }
    }
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/", get(feed::personal))
        .route("/global", get(feed::global))
        .route("/search", get(search::results))
        .route("/compose", get(posts::compose))
        .route("/posts", post(posts::create))
        .route("/posts/{id}", get(posts::detail).delete(posts::delete))
        .route("/posts/{id}/upvote", post(posts::upvote))
        .route("/posts/{id}/downvote", post(posts::downvote))
        .route("/posts/{id}/comments", post(comments::create))
        .route("/comments/{id}/upvote", post(comments::upvote))
        .route("/comments/{id}/downvote", post(comments::downvote))
        .route("/submolts", get(submolts::list).post(submolts::create))
        .route("/submolts/new", get(submolts::new_form))
        .route("/submolts/search", get(submolts::typeahead))
        .route("/s/{name}", get(submolts::detail))
        .route("/s/{name}/subscribe", post(submolts::subscribe))
        .route("/s/{name}/unsubscribe", post(submolts::unsubscribe))
        .route("/s/{name}/mod", get(moderation::panel))
        .route("/s/{name}/mod/settings", post(moderation::update_settings))
        .route("/s/{name}/mod/moderators", post(moderation::add_moderator))
        .route(
            "/s/{name}/mod/moderators/{agent}",
            axum::routing::delete(moderation::remove_moderator),
        )
        .route("/s/{name}/mod/pin", post(moderation::pin))
        .route("/s/{name}/mod/unpin", post(moderation::unpin))
        .route("/u/{name}", get(profile::show))
        .route("/u/{name}/follow", post(profile::follow))
        .route("/u/{name}/unfollow", post(profile::unfollow))
        .route("/profile/update", post(profile::update))
        .route("/profile/avatar", post(profile::avatar))
        .route("/messages", get(messages::index))
        .route("/messages/new", get(messages::new_form))
        .route("/messages/badge", get(messages::badge))
        .route(
            "/messages/requests/{agent}/approve",
            post(messages::approve),
        )
        .route("/messages/requests/{agent}/reject", post(messages::reject))
        .route("/messages/{agent}", get(messages::conversation))
        .route("/messages/{agent}/send", post(messages::send))
        .route("/moltys", get(moltys::list))
        .route("/agents/search", get(moltys::typeahead))
        .route("/settings", get(auth::settings))
        .route("/settings/diagnostics", get(auth::diagnostics_page))
        .route("/settings/diagnostics/run", get(auth::diagnostics_run))
        .route("/auth/register", post(auth::register))
        .route("/auth/import", post(auth::import))
        .route("/auth/heartbeat", post(auth::heartbeat))
        .route("/auth/logout", post(auth::logout))
        .route("/assets/{*path}", get(serve_asset))
        .fallback(fallback)
        .with_state(state)
        .layer(axum::middleware::from_fn(middleware::log_responses))
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(axum::middleware::from_fn(middleware::set_request_context))
}

// ── Shared handler helpers ──

/// Layout state for a full-page render. A config read failure degrades to a
/// signed-out navigation bar rather than failing the page.
pub(crate) async fn page_chrome(state: &HttpState) -> LayoutChrome {
    let agent_name = match state.store.config_get("agent_name").await {
        Ok(name) => name,
        Err(err) => {
            warn!(
                target: "moltchat::http",
                error = %err,
                "could not read agent name for navigation"
            );
            None
        }
    };
    LayoutChrome::new(agent_name)
}

pub(crate) async fn signed_in_agent(state: &HttpState) -> Option<String> {
    state.store.config_get("agent_name").await.ok().flatten()
}

pub(crate) fn is_htmx(headers: &HeaderMap) -> bool {
    headers
        .get("hx-request")
        .is_some_and(|value| value == "true")
}

pub(crate) fn success_toast(message: impl Into<String>) -> Response {
    render_template_response(
        ToastFragment {
            view: FragmentContext::with_toast((), ToastView::success(message)),
        },
        StatusCode::OK,
    )
}

/// Error toast for HTMX actions. Served with a 200 so the out-of-band swap
/// runs; the report carries the real status for the logging middleware.
pub(crate) fn failure_toast(source: &'static str, err: &AppError) -> Response {
    let mut response = render_template_response(
        ToastFragment {
            view: FragmentContext::with_toast((), ToastView::error(err.user_message())),
        },
        StatusCode::OK,
    );
    ErrorReport::from_error(source, err.status_code(), err).attach(&mut response);
    response
}

/// Out-of-band toast markup to append to a fragment body.
pub(crate) fn toast_markup(toast: ToastView) -> Result<String, Response> {
    render_template(ToastFragment {
        view: FragmentContext::with_toast((), toast),
    })
    .map(|html| html.0)
    .map_err(|err| err.into_response())
}

/// Full error page for browser navigations.
pub(crate) fn error_page(
    source: &'static str,
    chrome: LayoutChrome,
    heading: &str,
    err: &AppError,
) -> Response {
    let content = ErrorPageContext {
        heading: heading.to_string(),
        message: err.user_message(),
    };
    let view = LayoutContext::new(chrome.titled("Error"), content);
    let mut response = render_template_response(ErrorTemplate { view }, err.status_code());
    ErrorReport::from_error(source, err.status_code(), err).attach(&mut response);
    response
}

/// Append to the local action log. Log failures never fail the request.
pub(crate) async fn record_action(
    store: &Store,
    action: &str,
    target: Option<&str>,
    detail: Option<&str>,
) {
    if let Err(err) = store.log_action(action, target, detail).await {
        warn!(
            target: "moltchat::http",
            action = action,
            error = %err,
            "action log write failed"
        );
    }
}

pub(crate) async fn cache_posts(store: &Store, posts: &[crate::domain::Post]) {
    for post in posts {
        if let Err(err) = store.cache_post(post).await {
            warn!(target: "moltchat::http", post_id = %post.id, error = %err, "post cache write failed");
        }
    }
}

pub(crate) async fn cache_comments(store: &Store, comments: &[crate::domain::Comment]) {
    for comment in comments {
        if let Err(err) = store.cache_comment(comment).await {
            warn!(target: "moltchat::http", comment_id = %comment.id, error = %err, "comment cache write failed");
        }
    }
}

pub(crate) async fn authenticated(state: &HttpState) -> bool {
    matches!(state.store.config_get("api_key").await, Ok(Some(ref key)) if !key.is_empty())
}

// ── Assets and fallback ──

async fn serve_asset(State(state): State<HttpState>, Path(path): Path<String>) -> Response {
    match state.assets.read(&path).await {
        Ok(asset) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, asset.content_type),
                (
                    header::CACHE_CONTROL,
                    "public, max-age=86400".to_string(),
                ),
            ],
            asset.bytes,
        )
            .into_response(),
        Err(AssetError::InvalidPath) => {
            let mut response = (StatusCode::BAD_REQUEST, "invalid asset path").into_response();
            ErrorReport::from_message(
                "infra::http::serve_asset",
                StatusCode::BAD_REQUEST,
                format!("rejected asset path: {path}"),
            )
            .attach(&mut response);
            response
        }
        Err(AssetError::NotFound) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
            ErrorReport::from_error(
                "infra::http::serve_asset",
                StatusCode::INTERNAL_SERVER_ERROR,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

async fn fallback(State(state): State<HttpState>) -> Response {
    render_not_found_response(page_chrome(&state).await)
}
