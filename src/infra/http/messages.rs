//! Direct messages: inbox, conversations, requests, and the unread badge.
//!
//! The inbox and conversation pages load through a placeholder fragment so
//! the remote round-trips never block navigation. Sending falls back to a
//! DM request when no conversation with the agent exists yet.

use axum::{
    Form,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::warn;

use crate::application::error::AppError;
use crate::domain::Conversation;
use crate::presentation::views::{
    BadgeContext, BadgeFragment, ConversationContext, ConversationFragment, ConversationView,
    DmRequestView, FragmentContext, LayoutContext, LoadingContext, LoadingTemplate,
    MessageView, MessagesContext, MessagesFragment, NewMessageContext, NewMessageTemplate,
    ToastView, render_template_response,
};

use super::{HttpState, failure_toast, is_htmx, page_chrome, record_action};

#[derive(Debug, Deserialize, Default)]
pub(super) struct FragmentQuery {
    #[serde(rename = "_fragment")]
    fragment: Option<String>,
}

pub(super) async fn index(
    State(state): State<HttpState>,
    headers: HeaderMap,
    Query(query): Query<FragmentQuery>,
) -> Response {
    if !is_htmx(&headers) && query.fragment.is_none() {
        let chrome = page_chrome(&state).await.titled("Messages");
        return render_template_response(
            LoadingTemplate {
                view: LayoutContext::new(
                    chrome,
                    LoadingContext {
                        fragment_url: "/messages?_fragment=1".to_string(),
                    },
                ),
            },
            StatusCode::OK,
        );
    }

    // Conversations and requests fail independently; either error becomes a
    // notice above whatever did load.
    let mut notices = Vec::new();
    let conversations = match state.client.conversations().await {
        Ok(conversations) => {
            for conversation in &conversations {
                if let Err(err) = state.store.cache_conversation(conversation).await {
                    warn!(
                        target: "moltchat::http",
                        conversation_id = %conversation.id,
                        error = %err,
                        "conversation cache write failed"
                    );
                }
            }
            conversations
        }
        Err(err) => {
            notices.push(format!("Could not load conversations: {err}"));
            Vec::new()
        }
    };
    let requests = match state.client.dm_requests().await {
        Ok(requests) => requests,
        Err(err) => {
            notices.push(format!("Could not load DM requests: {err}"));
            Vec::new()
        }
    };

    let content = MessagesContext {
        conversations: conversations.iter().map(ConversationView::from).collect(),
        requests: requests.iter().map(DmRequestView::from).collect(),
        notices,
    };
    render_template_response(
        MessagesFragment {
            view: FragmentContext::new(content),
        },
        StatusCode::OK,
    )
}

#[derive(Debug, Deserialize, Default)]
pub(super) struct NewMessageQuery {
    agent: Option<String>,
}

pub(super) async fn new_form(
    State(state): State<HttpState>,
    Query(query): Query<NewMessageQuery>,
) -> Response {
    let agent = query
        .agent
        .map(|a| a.trim().to_string())
        .unwrap_or_default();
    if agent.is_empty() {
        return Redirect::to("/messages").into_response();
    }
    let chrome = page_chrome(&state).await.titled("New Message");
    render_template_response(
        NewMessageTemplate {
            view: LayoutContext::new(
                chrome,
                NewMessageContext {
                    to: agent,
                    error: None,
                },
            ),
        },
        StatusCode::OK,
    )
}

pub(super) async fn badge(State(state): State<HttpState>) -> Response {
    // Best effort: a failed check renders as no badge.
    let unread = state.client.dm_unread_total().await.unwrap_or_default();
    render_template_response(
        BadgeFragment {
            view: BadgeContext { unread },
        },
        StatusCode::OK,
    )
}

pub(super) async fn conversation(
    State(state): State<HttpState>,
    Path(agent): Path<String>,
    headers: HeaderMap,
    Query(query): Query<FragmentQuery>,
) -> Response {
    if !is_htmx(&headers) && query.fragment.is_none() {
        let chrome = page_chrome(&state)
            .await
            .titled(format!("Chat with {agent}"));
        return render_template_response(
            LoadingTemplate {
                view: LayoutContext::new(
                    chrome,
                    LoadingContext {
                        fragment_url: format!("/messages/{agent}?_fragment=1"),
                    },
                ),
            },
            StatusCode::OK,
        );
    }

    match conversation_fragment(&state, &agent, None).await {
        Ok(response) => response,
        Err(err) => failure_toast("infra::http::messages::conversation", &err),
    }
}

/// Render the conversation content for an agent. A missing conversation
/// renders as an empty thread; the send handler turns the first message
/// into a DM request.
async fn conversation_fragment(
    state: &HttpState,
    agent: &str,
    toast: Option<ToastView>,
) -> Result<Response, AppError> {
    let conversation = state.client.find_conversation_by_agent(agent).await?;
    let (conversation_id, messages) = match conversation {
        Some(Conversation { id, .. }) => {
            let messages = state.client.get_conversation(&id).await?;
            (id, messages)
        }
        None => (agent.to_string(), Vec::new()),
    };

    let content = ConversationContext {
        agent: agent.to_string(),
        conversation_id,
        messages: messages
            .iter()
            .map(|message| MessageView::from_message(message, &state.markdown))
            .collect(),
    };
    let view = match toast {
        Some(toast) => FragmentContext::with_toast(content, toast),
        None => FragmentContext::new(content),
    };
    Ok(render_template_response(
        ConversationFragment { view },
        StatusCode::OK,
    ))
}

#[derive(Debug, Deserialize)]
pub(super) struct SendForm {
    content: Option<String>,
}

pub(super) async fn send(
    State(state): State<HttpState>,
    Path(agent): Path<String>,
    headers: HeaderMap,
    Form(form): Form<SendForm>,
) -> Response {
    let content = form
        .content
        .map(|c| c.trim().to_string())
        .unwrap_or_default();
    if content.is_empty() {
        return failure_toast(
            "infra::http::messages::send",
            &AppError::validation("Message cannot be empty"),
        );
    }

    let existing = match state.client.find_conversation_by_agent(&agent).await {
        Ok(existing) => existing,
        Err(err) => return failure_toast("infra::http::messages::send", &err.into()),
    };
    let (sent, label) = match existing {
        Some(conversation) => (
            state.client.send_dm(&conversation.id, &content).await,
            "Message sent",
        ),
        None => (
            state.client.request_dm(&agent, &content).await,
            "Message request sent",
        ),
    };
    if let Err(err) = sent {
        return failure_toast("infra::http::messages::send", &err.into());
    }
    let excerpt: String = content.chars().take(100).collect();
    record_action(&state.store, "send_dm", Some(&agent), Some(&excerpt)).await;

    if is_htmx(&headers) {
        match conversation_fragment(&state, &agent, Some(ToastView::success(label))).await {
            Ok(response) => response,
            Err(err) => failure_toast("infra::http::messages::send", &err),
        }
    } else {
        Redirect::to(&format!("/messages/{agent}")).into_response()
    }
}

pub(super) async fn approve(State(state): State<HttpState>, Path(agent): Path<String>) -> Response {
    match state.client.approve_dm_request(&agent).await {
        Ok(()) => {
            record_action(&state.store, "approve_dm", Some(&agent), None).await;
            super::success_toast(format!("Approved {agent}"))
        }
        Err(err) => failure_toast("infra::http::messages::approve", &err.into()),
    }
}

pub(super) async fn reject(State(state): State<HttpState>, Path(agent): Path<String>) -> Response {
    match state.client.reject_dm_request(&agent).await {
        Ok(()) => {
            record_action(&state.store, "reject_dm", Some(&agent), None).await;
            super::success_toast(format!("Rejected {agent}"))
        }
        Err(err) => failure_toast("infra::http::messages::reject", &err.into()),
    }
}
