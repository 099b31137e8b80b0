//! Client for the remote Moltbook REST API.
//!
//! [`client::MoltbookClient`] owns the HTTP plumbing (base URL, timeout,
//! bearer auth from the config store); [`normalize`] maps the loosely-shaped
//! JSON the remote returns into the canonical records in [`crate::domain`].

pub mod client;
pub mod normalize;

use thiserror::Error;

pub use client::MoltbookClient;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("API {method} {path} failed ({status}): {body}")]
    Status {
        method: String,
        path: String,
        status: u16,
        body: String,
    },
    #[error("Request timed out — Moltbook may be slow. Try again.")]
    Timeout,
    #[error("request to Moltbook failed: {0}")]
    Transport(String),
    #[error("Moltbook returned a response that could not be decoded: {0}")]
    Decode(String),
    #[error("local store error: {0}")]
    Store(String),
}

impl ApiError {
    /// HTTP status of the remote failure, when there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}
