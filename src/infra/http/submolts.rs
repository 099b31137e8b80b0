//! Submolt directory, detail pages, creation, subscription, and the
//! typeahead behind the compose form.

use axum::{
    Form,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use crate::application::error::AppError;
use crate::domain::Submolt;
use crate::presentation::views::{
    FragmentContext, LayoutContext, OptionsContext, OptionsFragment, PostCardView,
    SubmoltCardView, SubmoltDetailContext, SubmoltFragment, SubmoltNewContext, SubmoltNewTemplate,
    SubmoltTemplate, SubmoltsContext, SubmoltsFragment, SubmoltsTemplate,
    render_template_response,
};

use super::{
    HttpState, cache_posts, error_page, failure_toast, is_htmx, page_chrome, record_action,
    signed_in_agent, success_toast,
};

/// Submolt names for datalist prefills, served from the name cache.
pub(super) async fn known_submolt_names(state: &HttpState) -> Vec<String> {
    let client = state.client.clone();
    state
        .submolt_names
        .names(move || async move {
            let submolts = client.list_submolts(1).await?;
            Ok(submolts.into_iter().map(|s| s.name).collect())
        })
        .await
}

#[derive(Debug, Deserialize, Default)]
pub(super) struct ListQuery {
    sort: Option<String>,
    q: Option<String>,
    #[serde(rename = "_fragment")]
    fragment: Option<String>,
}

pub(super) async fn list(
    State(state): State<HttpState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Response {
    let mut submolts = match state.client.list_submolts(1).await {
        Ok(submolts) => submolts,
        Err(err) => {
            return error_page(
                "infra::http::submolts::list",
                page_chrome(&state).await,
                "Could not load submolts",
                &err.into(),
            );
        }
    };

    let filter = query.q.unwrap_or_default().trim().to_lowercase();
    if !filter.is_empty() {
        submolts.retain(|s| {
            s.name.to_lowercase().contains(&filter)
                || s.description
                    .as_deref()
                    .is_some_and(|d| d.to_lowercase().contains(&filter))
        });
    }

    let sort = query.sort.unwrap_or_else(|| "recent".to_string());
    sort_submolts(&mut submolts, &sort);

    let content = SubmoltsContext {
        submolts: submolts.iter().map(SubmoltCardView::from).collect(),
        sort,
        query: filter,
    };

    if is_htmx(&headers) || query.fragment.is_some() {
        return render_template_response(
            SubmoltsFragment {
                view: FragmentContext::new(content),
            },
            StatusCode::OK,
        );
    }
    let chrome = page_chrome(&state).await.titled("Submolts");
    render_template_response(
        SubmoltsTemplate {
            view: LayoutContext::new(chrome, content),
        },
        StatusCode::OK,
    )
}

fn sort_submolts(submolts: &mut [Submolt], sort: &str) {
    match sort {
        "alpha" => submolts.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase())),
        "subscribers" => submolts.sort_by(|a, b| b.subscriber_count.cmp(&a.subscriber_count)),
        // "recent" keeps the remote's ordering
        _ => {}
    }
}

pub(super) async fn new_form(State(state): State<HttpState>) -> Response {
    render_new_form(&state, None).await
}

async fn render_new_form(state: &HttpState, error: Option<String>) -> Response {
    let chrome = page_chrome(state).await.titled("New Submolt");
    render_template_response(
        SubmoltNewTemplate {
            view: LayoutContext::new(chrome, SubmoltNewContext { error }),
        },
        StatusCode::OK,
    )
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateForm {
    name: Option<String>,
    description: Option<String>,
}

pub(super) async fn create(
    State(state): State<HttpState>,
    Form(form): Form<CreateForm>,
) -> Response {
    let name = form.name.map(|n| n.trim().to_string()).unwrap_or_default();
    if name.is_empty() {
        return render_new_form(&state, Some("Name is required".to_string())).await;
    }
    let description = form
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());

    match state
        .client
        .create_submolt(&name, description.as_deref())
        .await
    {
        Ok(()) => {
            record_action(&state.store, "create_submolt", Some(&name), None).await;
            Redirect::to(&format!("/s/{name}")).into_response()
        }
        Err(err) => {
            let err = AppError::from(err);
            render_new_form(&state, Some(err.user_message())).await
        }
    }
}

/// The compose form posts its input under `submolt`; the directory filter
/// uses `q`. Accept either.
#[derive(Debug, Deserialize, Default)]
pub(super) struct TypeaheadQuery {
    submolt: Option<String>,
    q: Option<String>,
}

pub(super) async fn typeahead(
    State(state): State<HttpState>,
    Query(query): Query<TypeaheadQuery>,
) -> Response {
    let needle = query.submolt.or(query.q).unwrap_or_default();
    let client = state.client.clone();
    let names = state
        .submolt_names
        .matches(needle.trim(), move || async move {
            let submolts = client.list_submolts(1).await?;
            Ok(submolts.into_iter().map(|s| s.name).collect())
        })
        .await;
    render_template_response(
        OptionsFragment {
            view: OptionsContext { names },
        },
        StatusCode::OK,
    )
}

#[derive(Debug, Deserialize, Default)]
pub(super) struct DetailQuery {
    #[serde(rename = "_fragment")]
    fragment: Option<String>,
}

pub(super) async fn detail(
    State(state): State<HttpState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Query(query): Query<DetailQuery>,
) -> Response {
    let submolt = match state.client.get_submolt(&name).await {
        Ok(submolt) => submolt,
        Err(err) => {
            return error_page(
                "infra::http::submolts::detail",
                page_chrome(&state).await,
                "Could not load submolt",
                &err.into(),
            );
        }
    };
    let posts = match state.client.submolt_feed(&name, 1).await {
        Ok(posts) => posts,
        Err(err) => {
            return error_page(
                "infra::http::submolts::detail",
                page_chrome(&state).await,
                "Could not load submolt feed",
                &err.into(),
            );
        }
    };
    cache_posts(&state.store, &posts).await;

    let me = signed_in_agent(&state).await;
    let is_moderator = me.as_deref().is_some_and(|me| {
        submolt
            .moderators
            .iter()
            .any(|m| m.eq_ignore_ascii_case(me))
            || submolt
                .owner
                .as_deref()
                .is_some_and(|owner| owner.eq_ignore_ascii_case(me))
    });

    let content = SubmoltDetailContext {
        name: submolt.name.clone(),
        description_html: submolt
            .description
            .as_deref()
            .map(|md| state.markdown.render(md)),
        subscriber_count: submolt.subscriber_count,
        is_moderator,
        posts: posts
            .iter()
            .map(|post| PostCardView::from_post(post, &state.markdown))
            .collect(),
    };

    if is_htmx(&headers) || query.fragment.is_some() {
        return render_template_response(
            SubmoltFragment {
                view: FragmentContext::new(content),
            },
            StatusCode::OK,
        );
    }
    let chrome = page_chrome(&state).await.titled(submolt.name.clone());
    render_template_response(
        SubmoltTemplate {
            view: LayoutContext::new(chrome, content),
        },
        StatusCode::OK,
    )
}

pub(super) async fn subscribe(
    State(state): State<HttpState>,
    Path(name): Path<String>,
) -> Response {
    match state.client.subscribe_submolt(&name).await {
        Ok(()) => {
            record_action(&state.store, "subscribe", Some(&name), None).await;
            success_toast(format!("Subscribed to {name}"))
        }
        Err(err) => failure_toast("infra::http::submolts::subscribe", &err.into()),
    }
}

pub(super) async fn unsubscribe(
    State(state): State<HttpState>,
    Path(name): Path<String>,
) -> Response {
    match state.client.unsubscribe_submolt(&name).await {
        Ok(()) => {
            record_action(&state.store, "unsubscribe", Some(&name), None).await;
            success_toast(format!("Unsubscribed from {name}"))
        }
        Err(err) => failure_toast("infra::http::submolts::unsubscribe", &err.into()),
    }
}
