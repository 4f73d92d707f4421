//! Shared HTTP plumbing: authorized agent, error mapping, path encoding.

use std::time::Duration;

use mirror_core::RemoteError;
use serde::de::DeserializeOwned;

const TIMEOUT: Duration = Duration::from_secs(120);

/// A bearer-token authorized `ureq` agent.
#[derive(Clone)]
pub struct Session {
    agent: ureq::Agent,
    token: String,
}

impl Session {
    pub fn new(token: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(TIMEOUT).build();
        Self {
            agent,
            token: token.into(),
        }
    }

    pub fn request(&self, method: &str, url: &str) -> ureq::Request {
        self.agent
            .request(method, url)
            .set("Authorization", &format!("Bearer {}", self.token))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

/// Map a `ureq` failure onto [`RemoteError`]. `id` names the node for 404s.
pub fn map_error(err: ureq::Error, id: Option<&str>) -> RemoteError {
    match (err, id) {
        (ureq::Error::Status(404, _), Some(id)) => RemoteError::NotFound { id: id.to_string() },
        (ureq::Error::Status(code, response), _) => {
            let message = response
                .into_string()
                .unwrap_or_else(|e| format!("<unreadable body: {e}>"));
            RemoteError::Status { code, message }
        }
        (ureq::Error::Transport(t), _) => RemoteError::Transport(t.to_string()),
    }
}

pub fn decode<T: DeserializeOwned>(response: ureq::Response) -> Result<T, RemoteError> {
    response
        .into_json()
        .map_err(|e| RemoteError::Decode(e.to_string()))
}

/// Percent-encode one URL path segment (RFC 3986 unreserved set kept).
pub fn encode_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => out.push(byte as char),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
