//! Feed pages: the personalized home feed and the global hot feed.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::Response,
};
use serde::Deserialize;
use tracing::warn;

use crate::application::error::AppError;
use crate::presentation::views::{
    FeedContext, FeedFragment, FeedKind, FeedTemplate, FragmentContext, LayoutContext,
    PostCardView, render_template_response,
};

use super::{HttpState, authenticated, cache_posts, is_htmx, page_chrome};

#[derive(Debug, Deserialize, Default)]
pub(super) struct FeedQuery {
    page: Option<u32>,
    #[serde(rename = "_fragment")]
    fragment: Option<String>,
}

pub(super) async fn personal(
    State(state): State<HttpState>,
    headers: HeaderMap,
    Query(query): Query<FeedQuery>,
) -> Response {
    render_feed(state, headers, query, FeedKind::Personal).await
}

pub(super) async fn global(
    State(state): State<HttpState>,
    headers: HeaderMap,
    Query(query): Query<FeedQuery>,
) -> Response {
    render_feed(state, headers, query, FeedKind::Global).await
}

async fn render_feed(
    state: HttpState,
    headers: HeaderMap,
    query: FeedQuery,
    kind: FeedKind,
) -> Response {
    let page = query.page.unwrap_or(1).max(1);

    // The personalized feed needs a key; without one the home page falls
    // back to the global feed so a fresh install still shows content.
    let use_personal = kind == FeedKind::Personal && authenticated(&state).await;
    let fetched = if use_personal {
        state.client.personalized_feed(page).await
    } else {
        state.client.global_feed(page).await
    };

    // A remote failure degrades to an empty feed with a notice; the page
    // itself stays up.
    let content = match fetched {
        Ok(posts) => {
            cache_posts(&state.store, &posts).await;
            let cards: Vec<PostCardView> = posts
                .iter()
                .map(|post| PostCardView::from_post(post, &state.markdown))
                .collect();
            FeedContext::new(kind, cards, page)
        }
        Err(err) => {
            warn!(target: "moltchat::http", error = %err, "feed fetch failed");
            let err = AppError::from(err);
            FeedContext::with_notice(
                kind,
                page,
                format!("Could not load feed: {}", err.user_message()),
            )
        }
    };

    if is_htmx(&headers) || query.fragment.is_some() {
        return render_template_response(
            FeedFragment {
                view: FragmentContext::new(content),
            },
            StatusCode::OK,
        );
    }

    let title = match kind {
        FeedKind::Personal => "My Feed",
        FeedKind::Global => "Global Feed",
    };
    let chrome = page_chrome(&state).await.titled(title);
    render_template_response(
        FeedTemplate {
            view: LayoutContext::new(chrome, content),
        },
        StatusCode::OK,
    )
}
