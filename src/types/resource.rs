use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::types::level::AccessLevel;
use crate::types::status::AccessStatus;

/// Tier of a resource in the container hierarchy: collections contain items,
/// items contain parts. Parts are the content-bearing records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Collection,
    Item,
    Part,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Collection => "collection",
            ResourceKind::Item => "item",
            ResourceKind::Part => "part",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "collection" => Ok(ResourceKind::Collection),
            "item" => Ok(ResourceKind::Item),
            "part" => Ok(ResourceKind::Part),
            _ => bail!("unknown resource kind '{s}'"),
        }
    }

    /// The kind a parent of this kind must have, if any.
    pub fn parent_kind(&self) -> Option<ResourceKind> {
        match self {
            ResourceKind::Collection => None,
            ResourceKind::Item => Some(ResourceKind::Collection),
            ResourceKind::Part => Some(ResourceKind::Item),
        }
    }

    /// Whether this kind may contain other resources.
    pub fn is_container(&self) -> bool {
        !matches!(self, ResourceKind::Part)
    }
}

impl rusqlite::types::ToSql for ResourceKind {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl rusqlite::types::FromSql for ResourceKind {
    fn column_result(
        value: rusqlite::types::ValueRef<'_>,
    ) -> rusqlite::types::FromSqlResult<Self> {
        let s = value.as_str()?;
        Self::parse(s).map_err(|err| rusqlite::types::FromSqlError::Other(err.into()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default)]
    pub id: u64,

    pub kind: ResourceKind,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<u64>,

    #[serde(default = "default_public")]
    pub public: bool,

    #[serde(default)]
    pub owner: String,

    #[serde(default)]
    pub create_time: u64,

    #[serde(default)]
    pub update_time: u64,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AccessStatus>,
}

/// Body for `PATCH /api/resources/{id}`. Every field is optional; embargo
/// dates are strings in the formats `parse_time` accepts. When `recursive`
/// is set, the level/embargo change cascades to descendants.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourcePatch {
    #[serde(default)]
    pub parent: Option<u64>,

    #[serde(default)]
    pub public: Option<bool>,

    #[serde(default)]
    pub level: Option<AccessLevel>,

    #[serde(default)]
    pub embargo_start: Option<String>,

    #[serde(default)]
    pub embargo_end: Option<String>,

    #[serde(default)]
    pub clear_embargo: bool,

    #[serde(default)]
    pub recursive: bool,
}

fn default_public() -> bool {
    true
}
