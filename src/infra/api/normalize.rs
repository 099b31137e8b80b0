//! Shape normalization for remote responses.
//!
//! The remote API is inconsistent about envelopes and field shapes: lists
//! arrive bare or wrapped (`{"posts": [...]}`, `{"conversations": {"items":
//! [...]}}`), names arrive as strings or as objects carrying one of several
//! key spellings, comments arrive flat with `parent_id` or pre-nested under
//! `replies`. Everything funnels through here once, right after decode, so
//! handlers and templates only ever see the canonical records.

use serde_json::Value;

use crate::domain::{
    AgentProfile, ClaimStatus, Comment, Conversation, DmRequest, Message, Post, Registration,
    SearchResults, Submolt,
};

/// Accepts a string or a number; anything else is `None`.
pub fn id_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A name field may be a bare string or an object with one of several
/// key spellings.
pub fn name_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(obj) => ["name", "agent_name", "username"]
            .iter()
            .find_map(|key| obj.get(*key).and_then(Value::as_str))
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}

fn str_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        value
            .get(*key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

fn int_field(value: &Value, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|key| match value.get(*key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    })
}

/// Unwraps the list the remote put either at the top level, under `key`,
/// or under `key.items`.
pub fn list_in<'a>(value: &'a Value, key: &str) -> Vec<&'a Value> {
    let direct = match value {
        Value::Array(items) => Some(items),
        _ => match value.get(key) {
            Some(Value::Array(items)) => Some(items),
            Some(inner) => inner.get("items").and_then(Value::as_array),
            None => None,
        },
    };
    direct.map(|items| items.iter().collect()).unwrap_or_default()
}

// ── Posts ──

pub fn post(value: &Value) -> Option<Post> {
    // single-post responses sometimes wrap in {"post": ...}
    let value = value.get("post").unwrap_or(value);
    let id = id_of(value.get("id")?)?;

    let (upvotes, downvotes) = match (
        int_field(value, &["upvotes"]),
        int_field(value, &["downvotes"]),
    ) {
        (None, None) => (int_field(value, &["score"]).unwrap_or(0), 0),
        (up, down) => (up.unwrap_or(0), down.unwrap_or(0)),
    };

    Some(Post {
        id,
        title: str_field(value, &["title"]).unwrap_or_else(|| "(untitled)".to_string()),
        content: str_field(value, &["content"]),
        url: str_field(value, &["url"]),
        submolt: value
            .get("submolt")
            .map(name_of)
            .filter(|name| !name.is_empty()),
        author: value.get("author").map(name_of).unwrap_or_default(),
        upvotes,
        downvotes,
        created_at: str_field(value, &["created_at"]),
    })
}

pub fn posts(value: &Value) -> Vec<Post> {
    list_in(value, "posts").into_iter().filter_map(post).collect()
}

// ── Comments ──

pub fn comments(value: &Value, post_id: &str) -> Vec<Comment> {
    let mut out = Vec::new();
    for node in list_in(value, "comments") {
        flatten_comment(node, None, post_id, &mut out);
    }
    out
}

// Pre-nested `replies` children inherit their parent's id; an explicit
// `parent_id` on the node wins over nesting position.
fn flatten_comment(value: &Value, nested_under: Option<&str>, post_id: &str, out: &mut Vec<Comment>) {
    let Some(id) = value.get("id").and_then(id_of) else {
        return;
    };
    let parent_id = value
        .get("parent_id")
        .and_then(id_of)
        .or_else(|| nested_under.map(str::to_string));

    out.push(Comment {
        id: id.clone(),
        post_id: Some(post_id.to_string()),
        parent_id,
        author: value.get("author").map(name_of).unwrap_or_default(),
        content: str_field(value, &["content"]).unwrap_or_default(),
        score: int_field(value, &["score"]).unwrap_or_else(|| {
            int_field(value, &["upvotes"]).unwrap_or(0) - int_field(value, &["downvotes"]).unwrap_or(0)
        }),
        created_at: str_field(value, &["created_at"]),
    });

    if let Some(Value::Array(replies)) = value.get("replies") {
        for reply in replies {
            flatten_comment(reply, Some(&id), post_id, out);
        }
    }
}

// ── Submolts ──

pub fn submolt(value: &Value) -> Option<Submolt> {
    let value = value.get("submolt").unwrap_or(value);
    let name = str_field(value, &["name"])?;
    Some(Submolt {
        name,
        description: str_field(value, &["description"]),
        subscriber_count: int_field(value, &["subscriber_count", "subscribers"]).unwrap_or(0),
        owner: value
            .get("owner")
            .or_else(|| value.get("created_by"))
            .map(name_of)
            .filter(|name| !name.is_empty()),
        moderators: value
            .get("moderators")
            .and_then(Value::as_array)
            .map(|mods| {
                mods.iter()
                    .map(name_of)
                    .filter(|name| !name.is_empty())
                    .collect()
            })
            .unwrap_or_default(),
    })
}

pub fn submolts(value: &Value) -> Vec<Submolt> {
    list_in(value, "submolts")
        .into_iter()
        .filter_map(submolt)
        .collect()
}

// ── Agents / profiles ──

pub fn profile(value: &Value) -> Option<AgentProfile> {
    let value = value
        .get("agent")
        .or_else(|| value.get("profile"))
        .unwrap_or(value);
    let name = str_field(value, &["name", "agent_name", "username"])?;
    Some(AgentProfile {
        name,
        description: str_field(value, &["description", "bio"]),
        karma: int_field(value, &["karma"]).unwrap_or(0),
        follower_count: int_field(value, &["follower_count", "followers"]).unwrap_or(0),
        following_count: int_field(value, &["following_count", "following"]).unwrap_or(0),
        avatar_url: str_field(value, &["avatar_url", "avatar"]),
        owner_handle: value
            .get("owner")
            .and_then(|owner| str_field(owner, &["x_handle"])),
        created_at: str_field(value, &["created_at"]),
        recent_posts: value
            .get("recent_posts")
            .map(posts)
            .unwrap_or_default(),
    })
}

pub fn profiles(value: &Value) -> Vec<AgentProfile> {
    list_in(value, "agents")
        .into_iter()
        .filter_map(profile)
        .collect()
}

// ── DMs ──

pub fn conversation(value: &Value) -> Option<Conversation> {
    let with_agent = value
        .get("with_agent")
        .or_else(|| value.get("other_agent"))
        .or_else(|| value.get("agent_name"))
        .map(name_of)
        .filter(|name| !name.is_empty())?;
    Some(Conversation {
        id: value
            .get("id")
            .or_else(|| value.get("conversation_id"))
            .and_then(id_of)
            .unwrap_or_else(|| with_agent.clone()),
        with_agent,
        last_message_at: str_field(value, &["last_message_at"]),
        unread_count: int_field(value, &["unread_count"]).unwrap_or(0),
    })
}

pub fn conversations(value: &Value) -> Vec<Conversation> {
    list_in(value, "conversations")
        .into_iter()
        .filter_map(conversation)
        .collect()
}

pub fn messages(value: &Value) -> Vec<Message> {
    list_in(value, "messages")
        .into_iter()
        .map(|msg| Message {
            content: str_field(msg, &["content", "message"]).unwrap_or_default(),
            created_at: str_field(msg, &["created_at", "sent_at"]),
            is_mine: msg
                .get("is_mine")
                .or_else(|| msg.get("from_me"))
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
        .collect()
}

/// Pending requests arrive split into `incoming.requests` and
/// `outgoing.requests`; both sides are merged with a direction flag.
pub fn dm_requests(value: &Value) -> Vec<DmRequest> {
    let side = |key: &str, incoming: bool| -> Vec<DmRequest> {
        value
            .get(key)
            .map(|inner| list_in(inner, "requests"))
            .unwrap_or_default()
            .into_iter()
            .filter_map(|req| {
                let from = req
                    .get("from")
                    .or_else(|| req.get("agent_name"))
                    .map(name_of)
                    .filter(|name| !name.is_empty())?;
                Some(DmRequest {
                    from,
                    message: str_field(req, &["message"]),
                    incoming,
                })
            })
            .collect()
    };
    let mut out = side("incoming", true);
    out.extend(side("outgoing", false));
    out
}

/// Total unread messages reported by the DM check endpoint.
pub fn unread_total(value: &Value) -> i64 {
    int_field(value, &["unread_count", "unread", "count", "total"])
        .unwrap_or_else(|| conversations(value).iter().map(|c| c.unread_count).sum())
}

// ── Search / auth ──

pub fn search_results(value: &Value) -> SearchResults {
    SearchResults {
        agents: profiles(value),
        submolts: submolts(value),
        posts: posts(value),
    }
}

pub fn claim_status(value: &Value) -> ClaimStatus {
    ClaimStatus {
        status: str_field(value, &["status"]),
        description: str_field(value, &["description"]),
    }
}

pub fn registration(value: &Value) -> Registration {
    let value = value.get("agent").unwrap_or(value);
    Registration {
        api_key: str_field(value, &["api_key"]),
        claim_url: str_field(value, &["claim_url"]),
        verification_code: str_field(value, &["verification_code"]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn name_of_accepts_string_and_object_spellings() {
        assert_eq!(name_of(&json!("alice")), "alice");
        assert_eq!(name_of(&json!({"name": "bob"})), "bob");
        assert_eq!(name_of(&json!({"agent_name": "carol"})), "carol");
        assert_eq!(name_of(&json!({"username": "dave"})), "dave");
        assert_eq!(name_of(&json!(42)), "");
    }

    #[test]
    fn posts_unwrap_bare_and_enveloped_lists() {
        let bare = json!([{"id": "p1", "title": "a", "author": "x"}]);
        let wrapped = json!({"posts": [{"id": "p1", "title": "a", "author": "x"}]});
        assert_eq!(posts(&bare).len(), 1);
        assert_eq!(posts(&wrapped), posts(&bare));
    }

    #[test]
    fn post_accepts_numeric_id_and_object_author() {
        let value = json!({
            "id": 17,
            "title": "hello",
            "author": {"name": "alice"},
            "submolt": {"name": "general"},
            "upvotes": 5,
            "downvotes": 2,
        });
        let post = post(&value).expect("post parses");
        assert_eq!(post.id, "17");
        assert_eq!(post.author, "alice");
        assert_eq!(post.submolt.as_deref(), Some("general"));
        assert_eq!(post.score(), 3);
    }

    #[test]
    fn post_falls_back_to_score_field() {
        let value = json!({"id": "p1", "title": "t", "author": "a", "score": 9});
        assert_eq!(post(&value).unwrap().score(), 9);
    }

    #[test]
    fn nested_replies_flatten_with_inherited_parent() {
        let value = json!({"comments": [
            {"id": "c1", "author": "a", "content": "root", "replies": [
                {"id": "c2", "author": "b", "content": "child", "replies": [
                    {"id": "c3", "author": "c", "content": "grandchild"}
                ]}
            ]}
        ]});
        let flat = comments(&value, "p1");
        assert_eq!(flat.len(), 3);
        assert_eq!(flat[0].parent_id, None);
        assert_eq!(flat[1].parent_id.as_deref(), Some("c1"));
        assert_eq!(flat[2].parent_id.as_deref(), Some("c2"));
        assert!(flat.iter().all(|c| c.post_id.as_deref() == Some("p1")));
    }

    #[test]
    fn explicit_parent_id_wins_over_nesting() {
        let value = json!([
            {"id": "c1", "author": "a", "content": "root", "replies": [
                {"id": "c2", "parent_id": "c9", "author": "b", "content": "moved"}
            ]}
        ]);
        let flat = comments(&value, "p1");
        assert_eq!(flat[1].parent_id.as_deref(), Some("c9"));
    }

    #[test]
    fn conversations_unwrap_items_envelope() {
        let value = json!({"conversations": {"items": [
            {"id": "conv1", "with_agent": {"name": "alice"}, "unread_count": 2}
        ]}});
        let convos = conversations(&value);
        assert_eq!(convos.len(), 1);
        assert_eq!(convos[0].with_agent, "alice");
        assert_eq!(convos[0].unread_count, 2);
    }

    #[test]
    fn dm_requests_merge_both_directions() {
        let value = json!({
            "incoming": {"requests": [{"from": "alice", "message": "hi"}]},
            "outgoing": {"requests": [{"agent_name": "bob"}]},
        });
        let reqs = dm_requests(&value);
        assert_eq!(reqs.len(), 2);
        assert!(reqs[0].incoming);
        assert_eq!(reqs[0].from, "alice");
        assert!(!reqs[1].incoming);
        assert_eq!(reqs[1].from, "bob");
    }

    #[test]
    fn search_results_cover_all_families() {
        let value = json!({
            "agents": [{"name": "alice", "karma": 3}],
            "submolts": [{"name": "general"}],
            "posts": [{"id": "p1", "title": "t", "author": "alice"}],
        });
        let results = search_results(&value);
        assert_eq!(results.agents.len(), 1);
        assert_eq!(results.submolts.len(), 1);
        assert_eq!(results.posts.len(), 1);
        assert!(!results.is_empty());
        assert!(search_results(&json!({})).is_empty());
    }

    #[test]
    fn registration_unwraps_agent_envelope() {
        let value = json!({"agent": {"api_key": "k", "claim_url": "https://x", "verification_code": "v"}});
        let reg = registration(&value);
        assert_eq!(reg.api_key.as_deref(), Some("k"));
        assert_eq!(reg.verification_code.as_deref(), Some("v"));
    }
}
