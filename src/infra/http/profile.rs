//! Agent profile pages, follow/unfollow, and own-profile edits.

use axum::{
    Form,
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use crate::application::error::AppError;
use crate::presentation::views::{
    FragmentContext, LayoutContext, PostCardView, ProfileContext, ProfileFragment,
    ProfileTemplate, render_template_response,
};

use super::{
    HttpState, cache_posts, error_page, failure_toast, is_htmx, page_chrome, record_action,
    signed_in_agent, success_toast,
};

#[derive(Debug, Deserialize, Default)]
pub(super) struct ShowQuery {
    #[serde(rename = "_fragment")]
    fragment: Option<String>,
}

pub(super) async fn show(
    State(state): State<HttpState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Query(query): Query<ShowQuery>,
) -> Response {
    let profile = match state.client.get_profile(&name).await {
        Ok(profile) => profile,
        Err(err) => {
            return error_page(
                "infra::http::profile::show",
                page_chrome(&state).await,
                "Could not load profile",
                &err.into(),
            );
        }
    };
    cache_posts(&state.store, &profile.recent_posts).await;

    let me = signed_in_agent(&state).await;
    let is_me = me
        .as_deref()
        .is_some_and(|me| me.eq_ignore_ascii_case(&profile.name));

    let content = ProfileContext {
        name: profile.name.clone(),
        description_html: profile
            .description
            .as_deref()
            .map(|md| state.markdown.render(md)),
        karma: profile.karma,
        follower_count: profile.follower_count,
        following_count: profile.following_count,
        avatar_url: profile.avatar_url.clone(),
        owner_handle: profile.owner_handle.clone(),
        created_at: profile.created_at.clone(),
        is_me,
        // The remote does not report follow state, so the button always
        // offers Follow; following twice is a no-op server side.
        is_following: false,
        posts: profile
            .recent_posts
            .iter()
            .map(|post| PostCardView::from_post(post, &state.markdown))
            .collect(),
    };

    if is_htmx(&headers) || query.fragment.is_some() {
        return render_template_response(
            ProfileFragment {
                view: FragmentContext::new(content),
            },
            StatusCode::OK,
        );
    }
    let chrome = page_chrome(&state).await.titled(profile.name.clone());
    render_template_response(
        ProfileTemplate {
            view: LayoutContext::new(chrome, content),
        },
        StatusCode::OK,
    )
}

pub(super) async fn follow(State(state): State<HttpState>, Path(name): Path<String>) -> Response {
    match state.client.follow_agent(&name).await {
        Ok(()) => {
            record_action(&state.store, "follow", Some(&name), None).await;
            success_toast(format!("Followed {name}"))
        }
        Err(err) => failure_toast("infra::http::profile::follow", &err.into()),
    }
}

pub(super) async fn unfollow(State(state): State<HttpState>, Path(name): Path<String>) -> Response {
    match state.client.unfollow_agent(&name).await {
        Ok(()) => {
            record_action(&state.store, "unfollow", Some(&name), None).await;
            success_toast(format!("Unfollowed {name}"))
        }
        Err(err) => failure_toast("infra::http::profile::unfollow", &err.into()),
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct UpdateForm {
    description: Option<String>,
}

pub(super) async fn update(
    State(state): State<HttpState>,
    Form(form): Form<UpdateForm>,
) -> Response {
    let description = form
        .description
        .map(|d| d.trim().to_string())
        .unwrap_or_default();
    match state.client.update_profile(&description).await {
        Ok(()) => {
            record_action(&state.store, "update_profile", None, Some(&description)).await;
            Redirect::to("/settings").into_response()
        }
        Err(err) => error_page(
            "infra::http::profile::update",
            page_chrome(&state).await,
            "Could not update profile",
            &err.into(),
        ),
    }
}

pub(super) async fn avatar(State(state): State<HttpState>, mut multipart: Multipart) -> Response {
    let mut upload: Option<(String, String, bytes::Bytes)> = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some("avatar") {
                    continue;
                }
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| "avatar".to_string());
                let content_type = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                match field.bytes().await {
                    Ok(bytes) => {
                        upload = Some((file_name, content_type, bytes));
                        break;
                    }
                    Err(err) => {
                        return error_page(
                            "infra::http::profile::avatar",
                            page_chrome(&state).await,
                            "Could not read upload",
                            &AppError::unexpected(err.to_string()),
                        );
                    }
                }
            }
            Ok(None) => break,
            Err(err) => {
                return error_page(
                    "infra::http::profile::avatar",
                    page_chrome(&state).await,
                    "Could not read upload",
                    &AppError::unexpected(err.to_string()),
                );
            }
        }
    }

    let Some((file_name, content_type, bytes)) = upload else {
        return Redirect::to("/settings").into_response();
    };
    match state
        .client
        .upload_avatar(file_name, &content_type, bytes)
        .await
    {
        Ok(()) => {
            record_action(&state.store, "upload_avatar", None, None).await;
            Redirect::to("/settings").into_response()
        }
        Err(err) => error_page(
            "infra::http::profile::avatar",
            page_chrome(&state).await,
            "Avatar upload failed",
            &err.into(),
        ),
    }
}
