use reqwest::{Method, header};
use serde_json::{Value, json};
use url::Url;

use crate::config::RemoteSettings;
use crate::domain::{
    AgentProfile, ClaimStatus, Comment, Conversation, DmRequest, Message, Post, Registration,
    SearchResults, Submolt,
};
use crate::infra::db::Store;

use super::{ApiError, normalize};

/// Typed client for the Moltbook API. Reads the bearer token from the
/// config store on every call so a key imported mid-session takes effect
/// immediately.
#[derive(Clone)]
pub struct MoltbookClient {
    http: reqwest::Client,
    base_url: Url,
    store: Store,
}

impl MoltbookClient {
    pub fn new(remote: &RemoteSettings, store: Store) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(remote.timeout)
            .build()
            .map_err(|err| ApiError::Transport(err.to_string()))?;
        Ok(Self {
            http,
            base_url: remote.base_url.clone(),
            store,
        })
    }

    pub async fn api_key(&self) -> Result<Option<String>, ApiError> {
        self.store
            .config_get("api_key")
            .await
            .map_err(|err| ApiError::Store(err.to_string()))
    }

    fn endpoint(&self, segments: &[&str], query: &[(&str, String)]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::Transport("remote base URL cannot hold paths".to_string()))?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }

    async fn request(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> Result<Value, ApiError> {
        let path = url.path().to_string();
        let mut builder = self
            .http
            .request(method.clone(), url)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(key) = self.api_key().await? {
            builder = builder.bearer_auth(key);
        }
        if let Some(body) = body {
            builder = builder.json(&body);
        }

        let response = builder.send().await.map_err(map_transport)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                method: method.to_string(),
                path,
                status: status.as_u16(),
                body,
            });
        }
        response
            .json::<Value>()
            .await
            .map_err(|err| ApiError::Decode(err.to_string()))
    }

    async fn get(&self, segments: &[&str], query: &[(&str, String)]) -> Result<Value, ApiError> {
        let url = self.endpoint(segments, query)?;
        self.request(Method::GET, url, None).await
    }

    async fn post(&self, segments: &[&str], body: Option<Value>) -> Result<Value, ApiError> {
        let url = self.endpoint(segments, &[])?;
        self.request(Method::POST, url, body).await
    }

    async fn patch(&self, segments: &[&str], body: Option<Value>) -> Result<Value, ApiError> {
        let url = self.endpoint(segments, &[])?;
        self.request(Method::PATCH, url, body).await
    }

    async fn delete(&self, segments: &[&str]) -> Result<Value, ApiError> {
        let url = self.endpoint(segments, &[])?;
        self.request(Method::DELETE, url, None).await
    }

    // ── Auth / registration ──

    pub async fn register(&self, name: &str, description: &str) -> Result<Registration, ApiError> {
        let value = self
            .post(
                &["agents", "register"],
                Some(json!({"name": name, "description": description})),
            )
            .await?;
        Ok(normalize::registration(&value))
    }

    pub async fn claim_status(&self) -> Result<ClaimStatus, ApiError> {
        let value = self.get(&["agents", "status"], &[]).await?;
        Ok(normalize::claim_status(&value))
    }

    pub async fn heartbeat(&self) -> Result<(), ApiError> {
        self.post(&["agents", "heartbeat"], None).await.map(|_| ())
    }

    // ── Feeds ──

    pub async fn personalized_feed(&self, page: u32) -> Result<Vec<Post>, ApiError> {
        let value = self
            .get(&["feed"], &[("page", page.to_string())])
            .await?;
        Ok(normalize::posts(&value))
    }

    pub async fn global_feed(&self, page: u32) -> Result<Vec<Post>, ApiError> {
        let value = self
            .get(
                &["posts"],
                &[("sort", "hot".to_string()), ("page", page.to_string())],
            )
            .await?;
        Ok(normalize::posts(&value))
    }

    pub async fn submolt_feed(&self, submolt: &str, page: u32) -> Result<Vec<Post>, ApiError> {
        let value = self
            .get(
                &["submolts", submolt, "feed"],
                &[("sort", "new".to_string()), ("page", page.to_string())],
            )
            .await?;
        Ok(normalize::posts(&value))
    }

    // ── Posts ──

    pub async fn get_post(&self, id: &str) -> Result<Post, ApiError> {
        let value = self.get(&["posts", id], &[]).await?;
        normalize::post(&value)
            .ok_or_else(|| ApiError::Decode(format!("post {id} missing required fields")))
    }

    /// Returns the new post's id when the remote reports one.
    pub async fn create_post(
        &self,
        title: &str,
        content: Option<&str>,
        url: Option<&str>,
        submolt: Option<&str>,
    ) -> Result<Option<String>, ApiError> {
        let mut body = json!({"title": title});
        if let Some(content) = content {
            body["content"] = json!(content);
        }
        if let Some(url) = url {
            body["url"] = json!(url);
        }
        if let Some(submolt) = submolt {
            body["submolt"] = json!(submolt);
        }
        let value = self.post(&["posts"], Some(body)).await?;
        let id = value
            .get("id")
            .and_then(normalize::id_of)
            .or_else(|| value.get("post").and_then(|p| p.get("id")).and_then(normalize::id_of));
        Ok(id)
    }

    pub async fn delete_post(&self, id: &str) -> Result<(), ApiError> {
        self.delete(&["posts", id]).await.map(|_| ())
    }

    pub async fn upvote_post(&self, id: &str) -> Result<(), ApiError> {
        self.post(&["posts", id, "upvote"], None).await.map(|_| ())
    }

    pub async fn downvote_post(&self, id: &str) -> Result<(), ApiError> {
        self.post(&["posts", id, "downvote"], None).await.map(|_| ())
    }

    // ── Comments ──

    pub async fn get_comments(&self, post_id: &str) -> Result<Vec<Comment>, ApiError> {
        let value = self.get(&["posts", post_id, "comments"], &[]).await?;
        Ok(normalize::comments(&value, post_id))
    }

    pub async fn create_comment(
        &self,
        post_id: &str,
        content: &str,
        parent_id: Option<&str>,
    ) -> Result<(), ApiError> {
        let mut body = json!({"content": content});
        if let Some(parent_id) = parent_id {
            body["parent_id"] = json!(parent_id);
        }
        self.post(&["posts", post_id, "comments"], Some(body))
            .await
            .map(|_| ())
    }

    pub async fn upvote_comment(&self, id: &str) -> Result<(), ApiError> {
        self.post(&["comments", id, "upvote"], None).await.map(|_| ())
    }

    pub async fn downvote_comment(&self, id: &str) -> Result<(), ApiError> {
        self.post(&["comments", id, "downvote"], None).await.map(|_| ())
    }

    // ── Submolts ──

    pub async fn list_submolts(&self, page: u32) -> Result<Vec<Submolt>, ApiError> {
        let value = self
            .get(&["submolts"], &[("page", page.to_string())])
            .await?;
        Ok(normalize::submolts(&value))
    }

    pub async fn get_submolt(&self, name: &str) -> Result<Submolt, ApiError> {
        let value = self.get(&["submolts", name], &[]).await?;
        normalize::submolt(&value)
            .ok_or_else(|| ApiError::Decode(format!("submolt {name} missing required fields")))
    }

    pub async fn create_submolt(&self, name: &str, description: Option<&str>) -> Result<(), ApiError> {
        let mut body = json!({"name": name});
        if let Some(description) = description {
            body["description"] = json!(description);
        }
        self.post(&["submolts"], Some(body)).await.map(|_| ())
    }

    pub async fn update_submolt(&self, name: &str, description: &str) -> Result<(), ApiError> {
        self.patch(&["submolts", name], Some(json!({"description": description})))
            .await
            .map(|_| ())
    }

    pub async fn subscribe_submolt(&self, name: &str) -> Result<(), ApiError> {
        self.post(&["submolts", name, "subscribe"], None)
            .await
            .map(|_| ())
    }

    pub async fn unsubscribe_submolt(&self, name: &str) -> Result<(), ApiError> {
        self.delete(&["submolts", name, "subscribe"]).await.map(|_| ())
    }

    // ── Agents / profiles ──

    pub async fn recent_agents(&self, limit: u32) -> Result<Vec<AgentProfile>, ApiError> {
        let value = self
            .get(
                &["agents", "recent"],
                &[("limit", limit.to_string()), ("sort", "recent".to_string())],
            )
            .await?;
        Ok(normalize::profiles(&value))
    }

    pub async fn get_profile(&self, name: &str) -> Result<AgentProfile, ApiError> {
        let value = self
            .get(&["agents", "profile"], &[("name", name.to_string())])
            .await?;
        normalize::profile(&value)
            .ok_or_else(|| ApiError::Decode(format!("profile {name} missing required fields")))
    }

    pub async fn my_profile(&self) -> Result<AgentProfile, ApiError> {
        let value = self.get(&["agents", "me"], &[]).await?;
        normalize::profile(&value)
            .ok_or_else(|| ApiError::Decode("own profile missing required fields".to_string()))
    }

    pub async fn update_profile(&self, description: &str) -> Result<(), ApiError> {
        self.patch(&["agents", "me"], Some(json!({"description": description})))
            .await
            .map(|_| ())
    }

    /// Multipart upload, same timeout and auth as JSON calls.
    pub async fn upload_avatar(
        &self,
        file_name: String,
        content_type: &str,
        bytes: bytes::Bytes,
    ) -> Result<(), ApiError> {
        let url = self.endpoint(&["agents", "me", "avatar"], &[])?;
        let path = url.path().to_string();

        let part = reqwest::multipart::Part::bytes(bytes.to_vec())
            .file_name(file_name)
            .mime_str(content_type)
            .map_err(|err| ApiError::Transport(err.to_string()))?;
        let form = reqwest::multipart::Form::new().part("avatar", part);

        let mut builder = self.http.post(url).multipart(form);
        if let Some(key) = self.api_key().await? {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(map_transport)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                method: Method::POST.to_string(),
                path,
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    pub async fn follow_agent(&self, name: &str) -> Result<(), ApiError> {
        self.post(&["agents", name, "follow"], None).await.map(|_| ())
    }

    pub async fn unfollow_agent(&self, name: &str) -> Result<(), ApiError> {
        self.delete(&["agents", name, "follow"]).await.map(|_| ())
    }

    // ── DMs ──

    pub async fn dm_unread_total(&self) -> Result<i64, ApiError> {
        let value = self.get(&["agents", "dm", "check"], &[]).await?;
        Ok(normalize::unread_total(&value))
    }

    pub async fn dm_requests(&self) -> Result<Vec<DmRequest>, ApiError> {
        let value = self.get(&["agents", "dm", "requests"], &[]).await?;
        Ok(normalize::dm_requests(&value))
    }

    pub async fn conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        let value = self.get(&["agents", "dm", "conversations"], &[]).await?;
        Ok(normalize::conversations(&value))
    }

    pub async fn find_conversation_by_agent(
        &self,
        agent: &str,
    ) -> Result<Option<Conversation>, ApiError> {
        let conversations = self.conversations().await?;
        Ok(conversations
            .into_iter()
            .find(|c| c.with_agent.eq_ignore_ascii_case(agent)))
    }

    pub async fn approve_dm_request(&self, id: &str) -> Result<(), ApiError> {
        self.post(&["agents", "dm", "requests", id, "approve"], None)
            .await
            .map(|_| ())
    }

    pub async fn reject_dm_request(&self, id: &str) -> Result<(), ApiError> {
        self.post(&["agents", "dm", "requests", id, "reject"], None)
            .await
            .map(|_| ())
    }

    pub async fn get_conversation(&self, id: &str) -> Result<Vec<Message>, ApiError> {
        let value = self.get(&["agents", "dm", "conversations", id], &[]).await?;
        Ok(normalize::messages(&value))
    }

    pub async fn send_dm(&self, conversation_id: &str, message: &str) -> Result<(), ApiError> {
        self.post(
            &["agents", "dm", "conversations", conversation_id, "send"],
            Some(json!({"message": message})),
        )
        .await
        .map(|_| ())
    }

    pub async fn request_dm(&self, to_agent: &str, message: &str) -> Result<(), ApiError> {
        self.post(
            &["agents", "dm", "request"],
            Some(json!({"to": to_agent, "message": message})),
        )
        .await
        .map(|_| ())
    }

    // ── Moderation ──

    pub async fn pin_post(&self, submolt: &str, post_id: &str) -> Result<(), ApiError> {
        self.post(&["submolts", submolt, "pin", post_id], None)
            .await
            .map(|_| ())
    }

    pub async fn unpin_post(&self, submolt: &str, post_id: &str) -> Result<(), ApiError> {
        self.post(&["submolts", submolt, "unpin", post_id], None)
            .await
            .map(|_| ())
    }

    pub async fn add_moderator(&self, submolt: &str, agent: &str) -> Result<(), ApiError> {
        self.post(
            &["submolts", submolt, "moderators"],
            Some(json!({"agent_name": agent})),
        )
        .await
        .map(|_| ())
    }

    pub async fn remove_moderator(&self, submolt: &str, agent: &str) -> Result<(), ApiError> {
        self.delete(&["submolts", submolt, "moderators", agent])
            .await
            .map(|_| ())
    }

    // ── Search ──

    pub async fn search(&self, query: &str) -> Result<SearchResults, ApiError> {
        let value = self.get(&["search"], &[("q", query.to_string())]).await?;
        Ok(normalize::search_results(&value))
    }
}

fn map_transport(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::Transport(err.to_string())
    }
}
