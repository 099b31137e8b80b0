//! Agent directory and the agent-name typeahead.
//!
//! The remote only sorts by recency; the other orderings are applied here
//! over the fetched window.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::Response,
};
use serde::Deserialize;

use crate::domain::AgentProfile;
use crate::presentation::views::{
    AgentCardView, FragmentContext, LayoutContext, LoadingContext, LoadingTemplate, MoltysContext,
    MoltysFragment, OptionsContext, OptionsFragment, render_template_response,
};

use super::{HttpState, error_page, is_htmx, page_chrome};

const DIRECTORY_LIMIT: u32 = 100;
const TYPEAHEAD_SOURCE_LIMIT: u32 = 200;

#[derive(Debug, Deserialize, Default)]
pub(super) struct ListQuery {
    sort: Option<String>,
    #[serde(rename = "_fragment")]
    fragment: Option<String>,
}

pub(super) async fn list(
    State(state): State<HttpState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Response {
    let sort = query.sort.unwrap_or_else(|| "recent".to_string());

    // Full navigations get a placeholder that immediately re-requests the
    // fragment, so slow remote calls do not block first paint.
    if !is_htmx(&headers) && query.fragment.is_none() {
        let chrome = page_chrome(&state).await.titled("Moltys");
        return render_template_response(
            LoadingTemplate {
                view: LayoutContext::new(
                    chrome,
                    LoadingContext {
                        fragment_url: format!("/moltys?_fragment=1&sort={sort}"),
                    },
                ),
            },
            StatusCode::OK,
        );
    }

    let mut agents = match state.client.recent_agents(DIRECTORY_LIMIT).await {
        Ok(agents) => agents,
        Err(err) => {
            return error_page(
                "infra::http::moltys::list",
                page_chrome(&state).await,
                "Could not load agents",
                &err.into(),
            );
        }
    };
    sort_agents(&mut agents, &sort);

    let content = MoltysContext {
        agents: agents.iter().map(AgentCardView::from).collect(),
        sort,
    };
    render_template_response(
        MoltysFragment {
            view: FragmentContext::new(content),
        },
        StatusCode::OK,
    )
}

fn sort_agents(agents: &mut [AgentProfile], sort: &str) {
    match sort {
        "alpha" => agents.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase())),
        "karma" => agents.sort_by(|a, b| b.karma.cmp(&a.karma)),
        "followers" => agents.sort_by(|a, b| b.follower_count.cmp(&a.follower_count)),
        _ => {}
    }
}

/// Both the new-message form (`agent`) and the moderator form (`agent_name`)
/// hit this endpoint.
#[derive(Debug, Deserialize, Default)]
pub(super) struct TypeaheadQuery {
    agent_name: Option<String>,
    agent: Option<String>,
    q: Option<String>,
}

pub(super) async fn typeahead(
    State(state): State<HttpState>,
    Query(query): Query<TypeaheadQuery>,
) -> Response {
    let needle = query
        .agent_name
        .or(query.agent)
        .or(query.q)
        .unwrap_or_default();
    let client = state.client.clone();
    let names = state
        .agent_names
        .matches(needle.trim(), move || async move {
            let agents = client.recent_agents(TYPEAHEAD_SOURCE_LIMIT).await?;
            Ok(agents.into_iter().map(|a| a.name).collect())
        })
        .await;
    render_template_response(
        OptionsFragment {
            view: OptionsContext { names },
        },
        StatusCode::OK,
    )
}
