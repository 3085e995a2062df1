use std::fmt;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Access level of a resource. Independent of the resource's public/private
/// visibility: a public record may still carry a restrictive level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    Free,
    Reserved,
    Protected,
    Forbidden,
}

/// All levels, ordered from least to most restrictive.
pub const LEVEL_ORDER: [AccessLevel; 4] = [
    AccessLevel::Free,
    AccessLevel::Reserved,
    AccessLevel::Protected,
    AccessLevel::Forbidden,
];

impl AccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Free => "free",
            AccessLevel::Reserved => "reserved",
            AccessLevel::Protected => "protected",
            AccessLevel::Forbidden => "forbidden",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "free" => Ok(AccessLevel::Free),
            "reserved" => Ok(AccessLevel::Reserved),
            "protected" => Ok(AccessLevel::Protected),
            "forbidden" => Ok(AccessLevel::Forbidden),
            _ => bail!("unknown access level '{s}'"),
        }
    }

    /// Position in [`LEVEL_ORDER`].
    pub fn rank(&self) -> usize {
        match self {
            AccessLevel::Free => 0,
            AccessLevel::Reserved => 1,
            AccessLevel::Protected => 2,
            AccessLevel::Forbidden => 3,
        }
    }

    /// The level one step less restrictive, as applied by the embargo sweep
    /// `under` policy. Note `forbidden` drops to `reserved`, not `protected`.
    pub fn step_down(&self) -> Self {
        match self {
            AccessLevel::Free => AccessLevel::Free,
            AccessLevel::Reserved => AccessLevel::Free,
            AccessLevel::Protected => AccessLevel::Reserved,
            AccessLevel::Forbidden => AccessLevel::Reserved,
        }
    }

    /// Whether `s` is one of the four level words. These are reserved and
    /// must never be accepted as an access token.
    pub fn is_level_keyword(s: &str) -> bool {
        Self::parse(s).is_ok()
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl rusqlite::types::ToSql for AccessLevel {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl rusqlite::types::FromSql for AccessLevel {
    fn column_result(
        value: rusqlite::types::ValueRef<'_>,
    ) -> rusqlite::types::FromSqlResult<Self> {
        let s = value.as_str()?;
        Self::parse(s).map_err(|err| rusqlite::types::FromSqlError::Other(err.into()))
    }
}
