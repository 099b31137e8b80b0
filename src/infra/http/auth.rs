//! Settings page, credential lifecycle, and connection diagnostics.
//!
//! Credentials live only in the local SQLite config table. Registration
//! stores whatever the remote hands back (api key, claim URL, verification
//! code); logout deletes the lot.

use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::warn;

use crate::application::diagnostics::{checks, run_check};
use crate::application::error::AppError;
use crate::presentation::views::{
    DiagnosticStepContext, DiagnosticStepFragment, DiagnosticSummaryView, DiagnosticsContext,
    DiagnosticsTemplate, LayoutContext, SettingsContext, SettingsTemplate,
    render_template_response,
};

use super::{HttpState, authenticated, error_page, page_chrome, record_action};

const CONFIG_KEYS: &[&str] = &["api_key", "agent_name", "claim_url", "verification_code"];

pub(super) async fn settings(State(state): State<HttpState>) -> Response {
    render_settings(&state, None, StatusCode::OK).await
}

async fn render_settings(state: &HttpState, error: Option<String>, status: StatusCode) -> Response {
    let context = match settings_context(state, error).await {
        Ok(context) => context,
        Err(err) => {
            return error_page(
                "infra::http::auth::settings",
                page_chrome(state).await,
                "Could not load settings",
                &err,
            );
        }
    };
    let chrome = page_chrome(state).await.titled("Settings");
    render_template_response(
        SettingsTemplate {
            view: LayoutContext::new(chrome, context),
        },
        status,
    )
}

async fn settings_context(
    state: &HttpState,
    error: Option<String>,
) -> Result<SettingsContext, AppError> {
    let api_key = state.store.config_get("api_key").await?;
    let agent_name = state.store.config_get("agent_name").await?;
    let claim_url = state.store.config_get("claim_url").await?;
    let verification_code = state.store.config_get("verification_code").await?;
    let logged_in = api_key.as_deref().is_some_and(|key| !key.is_empty());

    // Claim status and the current description are decoration; a remote
    // failure here must not take down the settings page.
    let mut claim_status = None;
    let mut claim_description = None;
    if logged_in {
        match state.client.claim_status().await {
            Ok(claim) => {
                claim_status = claim.status;
                claim_description = claim.description;
            }
            Err(err) => {
                warn!(target: "moltchat::http", error = %err, "claim status check failed");
            }
        }
        if claim_description.is_none() {
            match state.client.my_profile().await {
                Ok(profile) => claim_description = profile.description,
                Err(err) => {
                    warn!(target: "moltchat::http", error = %err, "own profile fetch failed");
                }
            }
        }
    }

    Ok(SettingsContext {
        logged_in,
        agent_name,
        api_key_masked: api_key.as_deref().map(mask_key),
        claim_url,
        verification_code,
        claim_status,
        claim_description,
        error,
    })
}

fn mask_key(key: &str) -> String {
    let prefix: String = key.chars().take(8).collect();
    if key.chars().count() > 8 {
        format!("{prefix}...")
    } else {
        prefix
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct RegisterForm {
    agent_name: Option<String>,
    description: Option<String>,
}

pub(super) async fn register(
    State(state): State<HttpState>,
    Form(form): Form<RegisterForm>,
) -> Response {
    let agent_name = form
        .agent_name
        .map(|n| n.trim().to_string())
        .unwrap_or_default();
    let description = form
        .description
        .map(|d| d.trim().to_string())
        .unwrap_or_default();
    if agent_name.is_empty() || description.is_empty() {
        return render_settings(
            &state,
            Some("Agent name and description are required".to_string()),
            StatusCode::OK,
        )
        .await;
    }

    let registration = match state.client.register(&agent_name, &description).await {
        Ok(registration) => registration,
        Err(err) => {
            let err = AppError::from(err);
            return render_settings(&state, Some(err.user_message()), StatusCode::OK).await;
        }
    };

    let mut writes = vec![("agent_name", agent_name.clone())];
    if let Some(api_key) = registration.api_key {
        writes.push(("api_key", api_key));
    }
    if let Some(claim_url) = registration.claim_url {
        writes.push(("claim_url", claim_url));
    }
    if let Some(verification_code) = registration.verification_code {
        writes.push(("verification_code", verification_code));
    }
    for (key, value) in &writes {
        if let Err(err) = state.store.config_set(key, value).await {
            return error_page(
                "infra::http::auth::register",
                page_chrome(&state).await,
                "Could not store credentials",
                &err.into(),
            );
        }
    }

    record_action(&state.store, "register", Some(&agent_name), None).await;
    Redirect::to("/settings").into_response()
}

#[derive(Debug, Deserialize)]
pub(super) struct ImportForm {
    agent_name: Option<String>,
    api_key: Option<String>,
}

pub(super) async fn import(
    State(state): State<HttpState>,
    Form(form): Form<ImportForm>,
) -> Response {
    let agent_name = form
        .agent_name
        .map(|n| n.trim().to_string())
        .unwrap_or_default();
    let api_key = form
        .api_key
        .map(|k| k.trim().to_string())
        .unwrap_or_default();
    if agent_name.is_empty() || api_key.is_empty() {
        return render_settings(
            &state,
            Some("Both name and API key are required".to_string()),
            StatusCode::OK,
        )
        .await;
    }

    for (key, value) in [("agent_name", &agent_name), ("api_key", &api_key)] {
        if let Err(err) = state.store.config_set(key, value).await {
            return error_page(
                "infra::http::auth::import",
                page_chrome(&state).await,
                "Could not store credentials",
                &err.into(),
            );
        }
    }
    record_action(&state.store, "import_key", Some(&agent_name), None).await;
    Redirect::to("/settings").into_response()
}

pub(super) async fn heartbeat(State(state): State<HttpState>) -> Response {
    match state.client.heartbeat().await {
        Ok(()) => record_action(&state.store, "heartbeat", None, None).await,
        Err(err) => {
            warn!(target: "moltchat::http", error = %err, "heartbeat failed");
        }
    }
    Redirect::to("/settings").into_response()
}

pub(super) async fn logout(State(state): State<HttpState>) -> Response {
    for key in CONFIG_KEYS {
        if let Err(err) = state.store.config_delete(key).await {
            return error_page(
                "infra::http::auth::logout",
                page_chrome(&state).await,
                "Could not clear credentials",
                &err.into(),
            );
        }
    }
    record_action(&state.store, "logout", None, None).await;
    Redirect::to("/settings").into_response()
}

// ── Diagnostics ──

pub(super) async fn diagnostics_page(State(state): State<HttpState>) -> Response {
    let total = checks(authenticated(&state).await).len();
    let chrome = page_chrome(&state).await.titled("Diagnostics");
    render_template_response(
        DiagnosticsTemplate {
            view: LayoutContext::new(
                chrome,
                DiagnosticsContext {
                    total,
                    first_href: run_href(0, 0, 0),
                },
            ),
        },
        StatusCode::OK,
    )
}

fn run_href(i: usize, passed: usize, failed: usize) -> String {
    format!("/settings/diagnostics/run?i={i}&passed={passed}&failed={failed}")
}

#[derive(Debug, Deserialize, Default)]
pub(super) struct RunQuery {
    #[serde(default)]
    i: usize,
    #[serde(default)]
    passed: usize,
    #[serde(default)]
    failed: usize,
}

/// One check per request. Each response appends its table row and swaps the
/// auto-loading element out-of-band with either the next step's loader or
/// the final summary.
pub(super) async fn diagnostics_run(
    State(state): State<HttpState>,
    Query(query): Query<RunQuery>,
) -> Response {
    let list = checks(authenticated(&state).await);
    let Some(check) = list.get(query.i).copied() else {
        return Redirect::to("/settings/diagnostics").into_response();
    };

    let outcome = run_check(&state.client, &state.store, check).await;
    let passed = query.passed + usize::from(outcome.passed);
    let failed = query.failed + usize::from(!outcome.passed);
    let next = query.i + 1;

    let (next_href, summary) = if next < list.len() {
        (Some(run_href(next, passed, failed)), None)
    } else {
        (None, Some(DiagnosticSummaryView { passed, failed }))
    };

    render_template_response(
        DiagnosticStepFragment {
            view: DiagnosticStepContext {
                label: outcome.check.label(),
                passed: outcome.passed,
                detail: outcome.detail,
                next_href,
                summary,
            },
        },
        StatusCode::OK,
    )
}
