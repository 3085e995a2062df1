use serde::{Deserialize, Serialize};

use crate::types::level::AccessLevel;

/// One row of the access index: the level and embargo window of a resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessStatus {
    #[serde(default)]
    pub resource: u64,

    pub level: AccessLevel,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embargo_start: Option<u64>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embargo_end: Option<u64>,

    #[serde(default)]
    pub update_time: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResponse {
    pub allow: bool,
}
