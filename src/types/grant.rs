use std::fmt;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Lifecycle state of an individual access grant. Only `accepted` makes the
/// grant effective; `enabled` is always derived from this, never set alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrantStatus {
    New,
    Renew,
    Accepted,
    Rejected,
}

impl GrantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantStatus::New => "new",
            GrantStatus::Renew => "renew",
            GrantStatus::Accepted => "accepted",
            GrantStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "new" => Ok(GrantStatus::New),
            "renew" => Ok(GrantStatus::Renew),
            "accepted" => Ok(GrantStatus::Accepted),
            "rejected" => Ok(GrantStatus::Rejected),
            _ => bail!("unknown grant status '{s}'"),
        }
    }

    /// Whether the grant is awaiting an administrator decision.
    pub fn is_open(&self) -> bool {
        matches!(self, GrantStatus::New | GrantStatus::Renew)
    }

    /// Whether an administrator decision may move a grant from `self` to
    /// `to`. Settled grants are only re-opened by a fresh submission.
    pub fn can_transition(&self, to: GrantStatus) -> bool {
        self.is_open() && matches!(to, GrantStatus::Accepted | GrantStatus::Rejected)
    }
}

impl fmt::Display for GrantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl rusqlite::types::ToSql for GrantStatus {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl rusqlite::types::FromSql for GrantStatus {
    fn column_result(
        value: rusqlite::types::ValueRef<'_>,
    ) -> rusqlite::types::FromSqlResult<Self> {
        let s = value.as_str()?;
        Self::parse(s).map_err(|err| rusqlite::types::FromSqlError::Other(err.into()))
    }
}

/// An individual access grant, identifying its requester by exactly one of
/// user, e-mail, or opaque token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grant {
    #[serde(default)]
    pub id: u64,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    pub status: GrantStatus,

    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub recursive: bool,

    #[serde(default)]
    pub resources: Vec<u64>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<u64>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<u64>,

    /// Derived: whether a validity window is set at all.
    #[serde(default)]
    pub temporal: bool,

    #[serde(default)]
    pub create_time: u64,

    #[serde(default)]
    pub update_time: u64,
}

impl Grant {
    /// Whether the grant carries a validity window.
    pub fn is_temporal(&self) -> bool {
        self.start.is_some() || self.end.is_some()
    }
}

/// Body for `PUT /api/grants`. Visitors may only set `email` and
/// `resources`; the remaining fields are honored for administrators and
/// ignored otherwise.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrantSubmission {
    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub resources: Vec<u64>,

    #[serde(default)]
    pub recursive: bool,

    #[serde(default)]
    pub start: Option<String>,

    #[serde(default)]
    pub end: Option<String>,

    #[serde(default)]
    pub status: Option<GrantStatus>,
}

/// Body for `PATCH /api/grants/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantDecision {
    pub status: GrantStatus,
}
