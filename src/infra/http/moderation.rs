//! Moderator panel for a submolt: settings, moderator roster, pinning.

use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use crate::presentation::views::{
    LayoutContext, ModerationContext, ModerationTemplate, render_template_response,
};

use super::{HttpState, error_page, failure_toast, page_chrome, record_action, success_toast};

pub(super) async fn panel(State(state): State<HttpState>, Path(name): Path<String>) -> Response {
    let submolt = match state.client.get_submolt(&name).await {
        Ok(submolt) => submolt,
        Err(err) => {
            return error_page(
                "infra::http::moderation::panel",
                page_chrome(&state).await,
                "Could not load submolt",
                &err.into(),
            );
        }
    };
    let content = ModerationContext {
        name: submolt.name.clone(),
        description: submolt.description.unwrap_or_default(),
        moderators: submolt.moderators,
    };
    let chrome = page_chrome(&state)
        .await
        .titled(format!("Moderation: {name}"));
    render_template_response(
        ModerationTemplate {
            view: LayoutContext::new(chrome, content),
        },
        StatusCode::OK,
    )
}

#[derive(Debug, Deserialize)]
pub(super) struct SettingsForm {
    description: Option<String>,
}

pub(super) async fn update_settings(
    State(state): State<HttpState>,
    Path(name): Path<String>,
    Form(form): Form<SettingsForm>,
) -> Response {
    let description = form
        .description
        .map(|d| d.trim().to_string())
        .unwrap_or_default();
    match state.client.update_submolt(&name, &description).await {
        Ok(()) => {
            record_action(&state.store, "update_submolt", Some(&name), None).await;
            Redirect::to(&format!("/s/{name}/mod")).into_response()
        }
        Err(err) => error_page(
            "infra::http::moderation::update_settings",
            page_chrome(&state).await,
            "Could not update submolt",
            &err.into(),
        ),
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct ModeratorForm {
    agent_name: Option<String>,
}

pub(super) async fn add_moderator(
    State(state): State<HttpState>,
    Path(name): Path<String>,
    Form(form): Form<ModeratorForm>,
) -> Response {
    let agent = form
        .agent_name
        .map(|a| a.trim().to_string())
        .unwrap_or_default();
    if agent.is_empty() {
        return Redirect::to(&format!("/s/{name}/mod")).into_response();
    }
    match state.client.add_moderator(&name, &agent).await {
        Ok(()) => {
            record_action(&state.store, "add_moderator", Some(&name), Some(&agent)).await;
            Redirect::to(&format!("/s/{name}/mod")).into_response()
        }
        Err(err) => error_page(
            "infra::http::moderation::add_moderator",
            page_chrome(&state).await,
            "Could not add moderator",
            &err.into(),
        ),
    }
}

pub(super) async fn remove_moderator(
    State(state): State<HttpState>,
    Path((name, agent)): Path<(String, String)>,
) -> Response {
    match state.client.remove_moderator(&name, &agent).await {
        Ok(()) => {
            record_action(&state.store, "remove_moderator", Some(&name), Some(&agent)).await;
            success_toast(format!("Removed {agent} from moderators"))
        }
        Err(err) => failure_toast("infra::http::moderation::remove_moderator", &err.into()),
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct PinForm {
    post_id: Option<String>,
}

pub(super) async fn pin(
    State(state): State<HttpState>,
    Path(name): Path<String>,
    Form(form): Form<PinForm>,
) -> Response {
    pin_action(state, name, form, PinKind::Pin).await
}

pub(super) async fn unpin(
    State(state): State<HttpState>,
    Path(name): Path<String>,
    Form(form): Form<PinForm>,
) -> Response {
    pin_action(state, name, form, PinKind::Unpin).await
}

enum PinKind {
    Pin,
    Unpin,
}

async fn pin_action(state: HttpState, name: String, form: PinForm, kind: PinKind) -> Response {
    let post_id = form
        .post_id
        .map(|p| p.trim().to_string())
        .unwrap_or_default();
    if post_id.is_empty() {
        return Redirect::to(&format!("/s/{name}/mod")).into_response();
    }
    let (action, result) = match kind {
        PinKind::Pin => ("pin_post", state.client.pin_post(&name, &post_id).await),
        PinKind::Unpin => ("unpin_post", state.client.unpin_post(&name, &post_id).await),
    };
    match result {
        Ok(()) => {
            record_action(&state.store, action, Some(&name), Some(&post_id)).await;
            Redirect::to(&format!("/s/{name}/mod")).into_response()
        }
        Err(err) => error_page(
            "infra::http::moderation::pin",
            page_chrome(&state).await,
            "Pin operation failed",
            &err.into(),
        ),
    }
}
