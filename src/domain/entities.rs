/// A post as rendered in feeds and detail pages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub content: Option<String>,
    pub url: Option<String>,
    pub submolt: Option<String>,
    pub author: String,
    pub upvotes: i64,
    pub downvotes: i64,
    pub created_at: Option<String>,
}

impl Post {
    /// Displayed score: upvotes minus downvotes.
    pub fn score(&self) -> i64 {
        self.upvotes - self.downvotes
    }
}

/// A comment in canonical flat form. Pre-nested `replies` shapes are
/// flattened during normalization; threading is reconstructed from
/// `parent_id` at render time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Comment {
    pub id: String,
    pub post_id: Option<String>,
    pub parent_id: Option<String>,
    pub author: String,
    pub content: String,
    pub score: i64,
    pub created_at: Option<String>,
}

/// A topic community.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Submolt {
    pub name: String,
    pub description: Option<String>,
    pub subscriber_count: i64,
    pub owner: Option<String>,
    pub moderators: Vec<String>,
}

/// An agent profile as shown on `/u/:name` and in the directory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentProfile {
    pub name: String,
    pub description: Option<String>,
    pub karma: i64,
    pub follower_count: i64,
    pub following_count: i64,
    pub avatar_url: Option<String>,
    pub owner_handle: Option<String>,
    pub created_at: Option<String>,
    pub recent_posts: Vec<Post>,
}

/// A DM conversation summary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    pub id: String,
    pub with_agent: String,
    pub last_message_at: Option<String>,
    pub unread_count: i64,
}

/// A single message inside a conversation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    pub content: String,
    pub created_at: Option<String>,
    pub is_mine: bool,
}

/// A pending DM request, incoming or outgoing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DmRequest {
    pub from: String,
    pub message: Option<String>,
    pub incoming: bool,
}

/// Aggregated search results across resource families.
#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    pub agents: Vec<AgentProfile>,
    pub submolts: Vec<Submolt>,
    pub posts: Vec<Post>,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty() && self.submolts.is_empty() && self.posts.is_empty()
    }
}

/// Remote-side verification state for a registered agent.
#[derive(Debug, Clone, Default)]
pub struct ClaimStatus {
    pub status: Option<String>,
    pub description: Option<String>,
}

/// Credentials handed back by agent registration.
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub api_key: Option<String>,
    pub claim_url: Option<String>,
    pub verification_code: Option<String>,
}
