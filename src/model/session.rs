use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// The opaque token the backend issues when a session is created. Every gateway call after
/// creation carries it.
#[derive(Debug, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SessionId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().to_string()))
    }
}

/// A user's session with the backend. The username is fixed at creation time; only the AI flag
/// changes afterwards.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Session {
    session_id: SessionId,
    username: String,
    enable_ai: bool,
}

impl Session {
    pub fn new(session_id: SessionId, username: impl Into<String>) -> Self {
        Self {
            session_id,
            username: username.into(),
            enable_ai: false,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn enable_ai(&self) -> bool {
        self.enable_ai
    }

    pub(crate) fn set_enable_ai(&mut self, enabled: bool) {
        self.enable_ai = enabled;
    }
}

/// The backend's answer to a processing trigger.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    #[default]
    Pending,
    Completed,
}

serde_plain::derive_display_from_serialize!(ProcessingStatus);
serde_plain::derive_fromstr_from_deserialize!(ProcessingStatus);
