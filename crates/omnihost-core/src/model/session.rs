use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Terminal,
    Zlogin,
    Vnc,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Connecting,
    Active,
    Closed,
}

impl SessionStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "connecting" => Some(SessionStatus::Connecting),
            "active" => Some(SessionStatus::Active),
            "closed" => Some(SessionStatus::Closed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Connecting => "connecting",
            SessionStatus::Active => "active",
            SessionStatus::Closed => "closed",
        }
    }
}

/// An interactive console session (terminal pty, in-zone zlogin pty, or a
/// VNC websockify backend). Created by the API, destroyed by cleanup or
/// inactivity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
pub struct Session {
    pub id: uuid::Uuid,
    pub kind: SessionKind,
    pub zone_name: Option<String>,
    pub status: SessionStatus,
    pub pid: Option<i64>,
    pub port: Option<i64>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub last_seen: chrono::DateTime<chrono::Utc>,
}
