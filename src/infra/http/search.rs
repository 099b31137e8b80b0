//! Site-wide search across agents, submolts, and posts.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Response,
};
use serde::Deserialize;

use crate::presentation::views::{
    AgentCardView, LayoutContext, PostCardView, SearchContext, SearchTemplate, SubmoltCardView,
    render_template_response,
};

use super::{HttpState, cache_posts, error_page, page_chrome};

#[derive(Debug, Deserialize, Default)]
pub(super) struct SearchQuery {
    q: Option<String>,
}

pub(super) async fn results(
    State(state): State<HttpState>,
    Query(query): Query<SearchQuery>,
) -> Response {
    let q = query.q.map(|q| q.trim().to_string()).unwrap_or_default();
    if q.is_empty() {
        let chrome = page_chrome(&state).await.titled("Search");
        return render_template_response(
            SearchTemplate {
                view: LayoutContext::new(chrome, SearchContext::default()),
            },
            StatusCode::OK,
        );
    }

    let found = match state.client.search(&q).await {
        Ok(found) => found,
        Err(err) => {
            return error_page(
                "infra::http::search",
                page_chrome(&state).await,
                "Search failed",
                &err.into(),
            );
        }
    };
    cache_posts(&state.store, &found.posts).await;

    let content = SearchContext {
        query: q.clone(),
        agents: found.agents.iter().map(AgentCardView::from).collect(),
        submolts: found.submolts.iter().map(SubmoltCardView::from).collect(),
        posts: found
            .posts
            .iter()
            .map(|post| PostCardView::from_post(post, &state.markdown))
            .collect(),
        is_empty: found.is_empty(),
    };
    let chrome = page_chrome(&state).await.titled(format!("Search: {q}"));
    render_template_response(
        SearchTemplate {
            view: LayoutContext::new(chrome, content),
        },
        StatusCode::OK,
    )
}
