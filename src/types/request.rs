use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

use crate::types::level::AccessLevel;

/// Filter for grant listings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Query {
    pub offset: Option<u64>,
    pub limit: Option<u64>,

    pub user: Option<String>,
    pub email: Option<String>,
    pub status: Option<String>,
}

impl Query {
    pub fn generate_where(&self) -> String {
        let mut where_clause = vec![];
        if self.user.is_some() {
            where_clause.push("user = ?".to_string());
        }
        if self.email.is_some() {
            where_clause.push("email = ?".to_string());
        }
        if self.status.is_some() {
            where_clause.push("status = ?".to_string());
        }
        if where_clause.is_empty() {
            "".to_string()
        } else {
            format!("WHERE {} ", where_clause.join(" AND "))
        }
    }

    pub fn generate_limit(&self) -> &'static str {
        if self.limit.is_some() {
            if self.offset.is_some() {
                "LIMIT ? OFFSET ?"
            } else {
                "LIMIT ?"
            }
        } else {
            ""
        }
    }

    pub fn params(self) -> Vec<Value> {
        let mut params = vec![];
        if let Some(user) = self.user {
            params.push(Value::Text(user));
        }
        if let Some(email) = self.email {
            params.push(Value::Text(email));
        }
        if let Some(status) = self.status {
            params.push(Value::Text(status));
        }
        // Offset only binds together with limit, matching generate_limit
        if let Some(limit) = self.limit {
            params.push(Value::Integer(limit as i64));
            if let Some(offset) = self.offset {
                params.push(Value::Integer(offset as i64));
            }
        }
        params
    }
}

/// Body for `POST /api/jobs/propagate`. All fields optional; an empty body
/// runs the same work as one periodic tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropagateRequest {
    #[serde(default)]
    pub backfill: bool,

    #[serde(default)]
    pub sync: Option<String>,

    #[serde(default)]
    pub cascade: Vec<u64>,
}

/// Credential carried in the `access` query parameter of a check request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessCredential {
    Token(String),
    Email(String),
}

impl AccessCredential {
    /// Parses the `access` parameter. A value containing '@' is an e-mail;
    /// anything equal to a level word is discarded, since the level words
    /// are reserved and a token colliding with one would be ambiguous.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        if value.contains('@') {
            return Some(AccessCredential::Email(value.to_string()));
        }
        if AccessLevel::is_level_keyword(value) {
            return None;
        }
        Some(AccessCredential::Token(value.to_string()))
    }

    pub fn token(&self) -> Option<&str> {
        match self {
            AccessCredential::Token(token) => Some(token),
            AccessCredential::Email(_) => None,
        }
    }

    pub fn email(&self) -> Option<&str> {
        match self {
            AccessCredential::Token(_) => None,
            AccessCredential::Email(email) => Some(email),
        }
    }
}
