//! Connectivity diagnostics for the settings page.
//!
//! Checks run one per request so the browser shows progress as each row
//! lands; the handler chains them with an auto-loading fragment. Order is
//! stable: local checks first, then unauthenticated remote endpoints, then
//! key-requiring ones (only included when a key is stored).

use crate::infra::{api::MoltbookClient, db::Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    LocalDatabase,
    GlobalFeed,
    Submolts,
    Search,
    MyProfile,
    PersonalizedFeed,
    ClaimStatus,
    Conversations,
    DmCheck,
}

impl Check {
    pub fn label(self) -> &'static str {
        match self {
            Check::LocalDatabase => "Local database",
            Check::GlobalFeed => "Global feed",
            Check::Submolts => "Submolt list",
            Check::Search => "Search",
            Check::MyProfile => "Own profile",
            Check::PersonalizedFeed => "Personalized feed",
            Check::ClaimStatus => "Claim status",
            Check::Conversations => "Conversations",
            Check::DmCheck => "DM check",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Outcome {
    pub check: Check,
    pub passed: bool,
    pub detail: String,
}

pub fn checks(authenticated: bool) -> &'static [Check] {
    const PUBLIC: &[Check] = &[
        Check::LocalDatabase,
        Check::GlobalFeed,
        Check::Submolts,
        Check::Search,
    ];
    const FULL: &[Check] = &[
        Check::LocalDatabase,
        Check::GlobalFeed,
        Check::Submolts,
        Check::Search,
        Check::MyProfile,
        Check::PersonalizedFeed,
        Check::ClaimStatus,
        Check::Conversations,
        Check::DmCheck,
    ];
    if authenticated { FULL } else { PUBLIC }
}

pub async fn run_check(client: &MoltbookClient, store: &Store, check: Check) -> Outcome {
    let result: Result<String, String> = match check {
        Check::LocalDatabase => local_database_detail(store).await,
        Check::GlobalFeed => client
            .global_feed(1)
            .await
            .map(|posts| format!("{} posts", posts.len()))
            .map_err(|err| err.to_string()),
        Check::Submolts => client
            .list_submolts(1)
            .await
            .map(|submolts| format!("{} submolts", submolts.len()))
            .map_err(|err| err.to_string()),
        Check::Search => client
            .search("molt")
            .await
            .map(|_| "responding".to_string())
            .map_err(|err| err.to_string()),
        Check::MyProfile => client
            .my_profile()
            .await
            .map(|profile| format!("signed in as {}", profile.name))
            .map_err(|err| err.to_string()),
        Check::PersonalizedFeed => client
            .personalized_feed(1)
            .await
            .map(|posts| format!("{} posts", posts.len()))
            .map_err(|err| err.to_string()),
        Check::ClaimStatus => client
            .claim_status()
            .await
            .map(|claim| claim.status.unwrap_or_else(|| "unknown".to_string()))
            .map_err(|err| err.to_string()),
        Check::Conversations => client
            .conversations()
            .await
            .map(|convos| format!("{} conversations", convos.len()))
            .map_err(|err| err.to_string()),
        Check::DmCheck => client
            .dm_unread_total()
            .await
            .map(|unread| format!("{unread} unread"))
            .map_err(|err| err.to_string()),
    };

    match result {
        Ok(detail) => Outcome {
            check,
            passed: true,
            detail,
        },
        Err(detail) => Outcome {
            check,
            passed: false,
            detail,
        },
    }
}

async fn local_database_detail(store: &Store) -> Result<String, String> {
    store.health_check().await.map_err(|err| err.to_string())?;
    let actions = store
        .recent_actions(1)
        .await
        .map_err(|err| err.to_string())?;
    Ok(match actions.first() {
        Some(action) => format!("reachable, last action: {}", action.action),
        None => "reachable, no actions recorded".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthenticated_list_excludes_key_checks() {
        let public = checks(false);
        assert!(!public.contains(&Check::MyProfile));
        assert!(public.contains(&Check::GlobalFeed));
    }

    #[test]
    fn authenticated_list_extends_public_prefix() {
        let public = checks(false);
        let full = checks(true);
        assert_eq!(&full[..public.len()], public);
        assert!(full.contains(&Check::DmCheck));
    }
}
