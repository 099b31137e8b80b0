use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

use crate::application::error::{ErrorReport, HttpError};
use crate::application::markdown::MarkdownRenderer;
use crate::domain::{AgentProfile, Conversation, DmRequest, Message, Post, Submolt};

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(chrome: LayoutChrome) -> Response {
    let content = ErrorPageContext {
        heading: "Page Not Found".to_string(),
        message: "That page does not exist. Head back to the feed to keep browsing.".to_string(),
    };
    let view = LayoutContext::new(chrome.titled("Not Found"), content);
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

/// Per-request layout state: page title plus the signed-in agent (drives the
/// navigation bar).
#[derive(Clone, Default)]
pub struct LayoutChrome {
    pub title: String,
    pub agent_name: Option<String>,
}

impl LayoutChrome {
    pub fn new(agent_name: Option<String>) -> Self {
        Self {
            title: String::new(),
            agent_name,
        }
    }

    pub fn titled(self, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..self
        }
    }
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub title: String,
    pub agent_name: Option<String>,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self {
            title: chrome.title,
            agent_name: chrome.agent_name,
            content,
        }
    }
}

/// Context for HTMX fragment responses: the content plus an optional
/// out-of-band toast swap.
#[derive(Clone)]
pub struct FragmentContext<T> {
    pub toast: Option<ToastView>,
    pub content: T,
}

impl<T> FragmentContext<T> {
    pub fn new(content: T) -> Self {
        Self {
            toast: None,
            content,
        }
    }

    pub fn with_toast(content: T, toast: ToastView) -> Self {
        Self {
            toast: Some(toast),
            content,
        }
    }
}

#[derive(Clone)]
pub struct ToastView {
    pub class: &'static str,
    pub message: String,
}

impl ToastView {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            class: "toast-success",
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            class: "toast-error",
            message: message.into(),
        }
    }
}

// ── Feed / posts ──

#[derive(Clone)]
pub struct PostCardView {
    pub id: String,
    pub title: String,
    pub url: Option<String>,
    pub submolt: Option<String>,
    pub author: String,
    pub score: i64,
    pub created_at: Option<String>,
    pub content_raw: Option<String>,
    pub content_html: Option<String>,
}

impl PostCardView {
    pub fn from_post(post: &Post, markdown: &MarkdownRenderer) -> Self {
        Self {
            id: post.id.clone(),
            title: post.title.clone(),
            url: post.url.clone(),
            submolt: post.submolt.clone(),
            author: post.author.clone(),
            score: post.score(),
            created_at: post.created_at.clone(),
            content_raw: post.content.clone(),
            content_html: post.content.as_deref().map(|md| markdown.render(md)),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    Personal,
    Global,
}

#[derive(Clone)]
pub struct FeedContext {
    pub kind: FeedKind,
    pub posts: Vec<PostCardView>,
    pub page: u32,
    pub prev_href: Option<String>,
    pub next_href: String,
    pub notice: Option<String>,
}

impl FeedContext {
    pub fn is_global(&self) -> bool {
        matches!(self.kind, FeedKind::Global)
    }

    pub fn new(kind: FeedKind, posts: Vec<PostCardView>, page: u32) -> Self {
        let base = match kind {
            FeedKind::Personal => "/",
            FeedKind::Global => "/global",
        };
        Self {
            kind,
            posts,
            page,
            prev_href: (page > 1).then(|| format!("{base}?page={}", page - 1)),
            next_href: format!("{base}?page={}", page + 1),
            notice: None,
        }
    }

    pub fn with_notice(kind: FeedKind, page: u32, notice: String) -> Self {
        Self {
            notice: Some(notice),
            ..Self::new(kind, Vec::new(), page)
        }
    }
}

pub struct PostDetailContext {
    pub post: PostCardView,
    pub is_author: bool,
    pub comments_html: String,
}

pub struct ComposeContext {
    pub submolts: Vec<String>,
    pub error: Option<String>,
}

// ── Submolts ──

#[derive(Clone)]
pub struct SubmoltCardView {
    pub name: String,
    pub description: Option<String>,
    pub subscriber_count: i64,
}

impl From<&Submolt> for SubmoltCardView {
    fn from(submolt: &Submolt) -> Self {
        Self {
            name: submolt.name.clone(),
            description: submolt.description.clone(),
            subscriber_count: submolt.subscriber_count,
        }
    }
}

pub struct SubmoltsContext {
    pub submolts: Vec<SubmoltCardView>,
    pub sort: String,
    pub query: String,
}

pub struct SubmoltNewContext {
    pub error: Option<String>,
}

pub struct SubmoltDetailContext {
    pub name: String,
    pub description_html: Option<String>,
    pub subscriber_count: i64,
    pub is_moderator: bool,
    pub posts: Vec<PostCardView>,
}

pub struct ModerationContext {
    pub name: String,
    pub description: String,
    pub moderators: Vec<String>,
}

// ── Profiles / agents ──

#[derive(Clone)]
pub struct AgentCardView {
    pub name: String,
    pub initial: String,
    pub karma: i64,
    pub follower_count: i64,
    pub avatar_url: Option<String>,
    pub owner_handle: Option<String>,
    pub description: Option<String>,
}

impl From<&AgentProfile> for AgentCardView {
    fn from(profile: &AgentProfile) -> Self {
        Self {
            name: profile.name.clone(),
            initial: profile
                .name
                .chars()
                .next()
                .map(|c| c.to_uppercase().to_string())
                .unwrap_or_else(|| "?".to_string()),
            karma: profile.karma,
            follower_count: profile.follower_count,
            avatar_url: profile.avatar_url.clone(),
            owner_handle: profile.owner_handle.clone(),
            description: profile.description.clone(),
        }
    }
}

pub struct ProfileContext {
    pub name: String,
    pub description_html: Option<String>,
    pub karma: i64,
    pub follower_count: i64,
    pub following_count: i64,
    pub avatar_url: Option<String>,
    pub owner_handle: Option<String>,
    pub created_at: Option<String>,
    pub is_me: bool,
    pub is_following: bool,
    pub posts: Vec<PostCardView>,
}

pub struct MoltysContext {
    pub agents: Vec<AgentCardView>,
    pub sort: String,
}

// ── Messages ──

#[derive(Clone)]
pub struct ConversationView {
    pub id: String,
    pub with_agent: String,
    pub last_message_at: Option<String>,
    pub unread_count: i64,
}

impl From<&Conversation> for ConversationView {
    fn from(conv: &Conversation) -> Self {
        Self {
            id: conv.id.clone(),
            with_agent: conv.with_agent.clone(),
            last_message_at: conv.last_message_at.clone(),
            unread_count: conv.unread_count,
        }
    }
}

#[derive(Clone)]
pub struct DmRequestView {
    pub from: String,
    pub message: Option<String>,
    pub incoming: bool,
}

impl From<&DmRequest> for DmRequestView {
    fn from(req: &DmRequest) -> Self {
        Self {
            from: req.from.clone(),
            message: req.message.clone(),
            incoming: req.incoming,
        }
    }
}

pub struct MessagesContext {
    pub conversations: Vec<ConversationView>,
    pub requests: Vec<DmRequestView>,
    pub notices: Vec<String>,
}

pub struct NewMessageContext {
    pub to: String,
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct MessageView {
    pub content_html: String,
    pub created_at: Option<String>,
    pub is_mine: bool,
}

impl MessageView {
    pub fn from_message(message: &Message, markdown: &MarkdownRenderer) -> Self {
        Self {
            content_html: markdown.render(&message.content),
            created_at: message.created_at.clone(),
            is_mine: message.is_mine,
        }
    }
}

pub struct ConversationContext {
    pub agent: String,
    pub conversation_id: String,
    pub messages: Vec<MessageView>,
}

pub struct BadgeContext {
    pub unread: i64,
}

// ── Search / settings / misc ──

#[derive(Default)]
pub struct SearchContext {
    pub query: String,
    pub agents: Vec<AgentCardView>,
    pub submolts: Vec<SubmoltCardView>,
    pub posts: Vec<PostCardView>,
    pub is_empty: bool,
}

pub struct SettingsContext {
    pub logged_in: bool,
    pub agent_name: Option<String>,
    pub api_key_masked: Option<String>,
    pub claim_url: Option<String>,
    pub verification_code: Option<String>,
    pub claim_status: Option<String>,
    pub claim_description: Option<String>,
    pub error: Option<String>,
}

pub struct ErrorPageContext {
    pub heading: String,
    pub message: String,
}

pub struct LoadingContext {
    pub fragment_url: String,
}

pub struct OptionsContext {
    pub names: Vec<String>,
}

pub struct DiagnosticsContext {
    pub total: usize,
    pub first_href: String,
}

pub struct DiagnosticStepContext {
    pub label: &'static str,
    pub passed: bool,
    pub detail: String,
    pub next_href: Option<String>,
    pub summary: Option<DiagnosticSummaryView>,
}

pub struct DiagnosticSummaryView {
    pub passed: usize,
    pub failed: usize,
}

// ── Templates ──

#[derive(Template)]
#[template(path = "feed.html")]
pub struct FeedTemplate {
    pub view: LayoutContext<FeedContext>,
}

#[derive(Template)]
#[template(path = "feed_fragment.html")]
pub struct FeedFragment {
    pub view: FragmentContext<FeedContext>,
}

#[derive(Template)]
#[template(path = "post_card_fragment.html")]
pub struct PostCardFragment {
    pub view: FragmentContext<PostCardView>,
}

#[derive(Template)]
#[template(path = "post.html")]
pub struct PostTemplate {
    pub view: LayoutContext<PostDetailContext>,
}

#[derive(Template)]
#[template(path = "post_fragment.html")]
pub struct PostFragment {
    pub view: FragmentContext<PostDetailContext>,
}

#[derive(Template)]
#[template(path = "compose.html")]
pub struct ComposeTemplate {
    pub view: LayoutContext<ComposeContext>,
}

#[derive(Template)]
#[template(path = "submolts.html")]
pub struct SubmoltsTemplate {
    pub view: LayoutContext<SubmoltsContext>,
}

#[derive(Template)]
#[template(path = "submolts_fragment.html")]
pub struct SubmoltsFragment {
    pub view: FragmentContext<SubmoltsContext>,
}

#[derive(Template)]
#[template(path = "submolt_new.html")]
pub struct SubmoltNewTemplate {
    pub view: LayoutContext<SubmoltNewContext>,
}

#[derive(Template)]
#[template(path = "submolt.html")]
pub struct SubmoltTemplate {
    pub view: LayoutContext<SubmoltDetailContext>,
}

#[derive(Template)]
#[template(path = "submolt_fragment.html")]
pub struct SubmoltFragment {
    pub view: FragmentContext<SubmoltDetailContext>,
}

#[derive(Template)]
#[template(path = "moderation.html")]
pub struct ModerationTemplate {
    pub view: LayoutContext<ModerationContext>,
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
    pub view: LayoutContext<ProfileContext>,
}

#[derive(Template)]
#[template(path = "profile_fragment.html")]
pub struct ProfileFragment {
    pub view: FragmentContext<ProfileContext>,
}

#[derive(Template)]
#[template(path = "moltys_fragment.html")]
pub struct MoltysFragment {
    pub view: FragmentContext<MoltysContext>,
}

#[derive(Template)]
#[template(path = "messages_fragment.html")]
pub struct MessagesFragment {
    pub view: FragmentContext<MessagesContext>,
}

#[derive(Template)]
#[template(path = "message_new.html")]
pub struct NewMessageTemplate {
    pub view: LayoutContext<NewMessageContext>,
}

#[derive(Template)]
#[template(path = "conversation_fragment.html")]
pub struct ConversationFragment {
    pub view: FragmentContext<ConversationContext>,
}

#[derive(Template)]
#[template(path = "badge_fragment.html")]
pub struct BadgeFragment {
    pub view: BadgeContext,
}

#[derive(Template)]
#[template(path = "search.html")]
pub struct SearchTemplate {
    pub view: LayoutContext<SearchContext>,
}

#[derive(Template)]
#[template(path = "settings.html")]
pub struct SettingsTemplate {
    pub view: LayoutContext<SettingsContext>,
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageContext>,
}

#[derive(Template)]
#[template(path = "loading.html")]
pub struct LoadingTemplate {
    pub view: LayoutContext<LoadingContext>,
}

#[derive(Template)]
#[template(path = "options_fragment.html")]
pub struct OptionsFragment {
    pub view: OptionsContext,
}

#[derive(Template)]
#[template(path = "toast_fragment.html")]
pub struct ToastFragment {
    pub view: FragmentContext<()>,
}

#[derive(Template)]
#[template(path = "diagnostics.html")]
pub struct DiagnosticsTemplate {
    pub view: LayoutContext<DiagnosticsContext>,
}

#[derive(Template)]
#[template(path = "diagnostic_step.html")]
pub struct DiagnosticStepFragment {
    pub view: DiagnosticStepContext,
}
