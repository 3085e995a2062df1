use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::{CommonConfig, PathSet};
use crate::server::db::{DatePolicy, LevelPolicy};
use crate::types::level::{AccessLevel, LEVEL_ORDER};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct JobsConfig {
    #[serde(default = "PropagateConfig::default")]
    pub propagate: PropagateConfig,

    #[serde(default = "SweepConfig::default")]
    pub sweep: SweepConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PropagateConfig {
    /// Whether the periodic propagation loop runs inside the server. The
    /// job itself can always be invoked on demand.
    #[serde(default = "PropagateConfig::default_enable")]
    pub enable: bool,

    #[serde(default = "PropagateConfig::default_interval_secs")]
    pub interval_secs: u64,

    /// Rows per bulk statement during the property sync.
    #[serde(default = "PropagateConfig::default_batch_size")]
    pub batch_size: usize,

    /// Backfill level for resources that are publicly visible.
    #[serde(default = "PropagateConfig::default_public_level")]
    pub public_level: AccessLevel,

    /// Backfill level for private resources.
    #[serde(default = "PropagateConfig::default_private_level")]
    pub private_level: AccessLevel,

    #[serde(default = "PropertyConfig::default")]
    pub property: PropertyConfig,
}

/// The optional property mirror: three descriptive metadata fields carrying
/// level, embargo start, and embargo end as literal values.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PropertyConfig {
    #[serde(default = "PropertyConfig::default_enable")]
    pub enable: bool,

    #[serde(default = "PropertyConfig::default_level_field")]
    pub level_field: String,

    #[serde(default = "PropertyConfig::default_start_field")]
    pub start_field: String,

    #[serde(default = "PropertyConfig::default_end_field")]
    pub end_field: String,

    /// Maps each access level to its literal property value. Must cover
    /// exactly the four levels; the jobs refuse to run otherwise.
    #[serde(default = "PropertyConfig::default_levels")]
    pub levels: HashMap<String, String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SweepConfig {
    #[serde(default = "SweepConfig::default_enable")]
    pub enable: bool,

    #[serde(default = "SweepConfig::default_interval_secs")]
    pub interval_secs: u64,

    /// What happens to the level of a status row whose embargo elapsed.
    #[serde(default = "SweepConfig::default_level_policy")]
    pub level_policy: LevelPolicy,

    /// What happens to the embargo dates of such a row.
    #[serde(default = "SweepConfig::default_date_policy")]
    pub date_policy: DatePolicy,
}

impl CommonConfig for JobsConfig {
    fn default() -> Self {
        Self {
            propagate: PropagateConfig::default(),
            sweep: SweepConfig::default(),
        }
    }

    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        self.propagate.complete(ps).context("propagate")?;
        self.sweep.complete(ps).context("sweep")?;
        Ok(())
    }
}

impl CommonConfig for PropagateConfig {
    fn default() -> Self {
        Self {
            enable: Self::default_enable(),
            interval_secs: Self::default_interval_secs(),
            batch_size: Self::default_batch_size(),
            public_level: Self::default_public_level(),
            private_level: Self::default_private_level(),
            property: PropertyConfig::default(),
        }
    }

    fn complete(&mut self, _ps: &PathSet) -> Result<()> {
        if self.interval_secs == 0 {
            bail!("propagate interval_secs should not be 0");
        }
        if self.batch_size == 0 {
            bail!("propagate batch_size should not be 0");
        }
        Ok(())
    }
}

impl PropagateConfig {
    fn default_enable() -> bool {
        true
    }

    fn default_interval_secs() -> u64 {
        3600
    }

    fn default_batch_size() -> usize {
        500
    }

    fn default_public_level() -> AccessLevel {
        AccessLevel::Free
    }

    fn default_private_level() -> AccessLevel {
        AccessLevel::Reserved
    }
}

impl PropertyConfig {
    pub fn default() -> Self {
        Self {
            enable: Self::default_enable(),
            level_field: Self::default_level_field(),
            start_field: Self::default_start_field(),
            end_field: Self::default_end_field(),
            levels: Self::default_levels(),
        }
    }

    fn default_enable() -> bool {
        false
    }

    fn default_level_field() -> String {
        String::from("access:level")
    }

    fn default_start_field() -> String {
        String::from("access:embargoStart")
    }

    fn default_end_field() -> String {
        String::from("access:embargoEnd")
    }

    fn default_levels() -> HashMap<String, String> {
        LEVEL_ORDER
            .iter()
            .map(|level| (level.as_str().to_string(), level.as_str().to_string()))
            .collect()
    }
}

impl CommonConfig for SweepConfig {
    fn default() -> Self {
        Self {
            enable: Self::default_enable(),
            interval_secs: Self::default_interval_secs(),
            level_policy: Self::default_level_policy(),
            date_policy: Self::default_date_policy(),
        }
    }

    fn complete(&mut self, _ps: &PathSet) -> Result<()> {
        if self.interval_secs == 0 {
            bail!("sweep interval_secs should not be 0");
        }
        if self.level_policy == LevelPolicy::Keep && self.date_policy == DatePolicy::Keep {
            bail!("sweep with level_policy=keep and date_policy=keep would do nothing");
        }
        Ok(())
    }
}

impl SweepConfig {
    fn default_enable() -> bool {
        false
    }

    fn default_interval_secs() -> u64 {
        3600
    }

    fn default_level_policy() -> LevelPolicy {
        LevelPolicy::Free
    }

    fn default_date_policy() -> DatePolicy {
        DatePolicy::Clear
    }
}
