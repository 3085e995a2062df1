use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::config::{CommonConfig, PathSet};

/// The fixed, quick-to-slow order in which enabled modes are evaluated.
/// Configuration selects modes; it never reorders them.
pub const MODE_ORDER: [&str; 5] = ["ip", "session", "external", "email", "grant"];

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AccessConfig {
    /// Enabled credential modes, any subset of [`MODE_ORDER`].
    #[serde(default = "AccessConfig::default_modes")]
    pub modes: Vec<String>,

    /// When set, an active embargo no longer denies; the level checks still
    /// apply.
    #[serde(default = "AccessConfig::default_bypass_embargo")]
    pub bypass_embargo: bool,

    /// Trust the Forwarded/X-Forwarded-For headers when resolving the
    /// client address. Only enable behind a proxy you control.
    #[serde(default = "AccessConfig::default_trust_forwarded")]
    pub trust_forwarded: bool,

    /// Human-edited IP reservations, compiled at startup.
    #[serde(default = "AccessConfig::default_ip")]
    pub ip: Vec<IpRuleConfig>,

    /// E-mail patterns for the email mode: exact addresses or `*suffix`.
    #[serde(default = "AccessConfig::default_email_patterns")]
    pub email_patterns: Vec<String>,

    /// External identity-provider tags accepted by the external mode.
    #[serde(default = "AccessConfig::default_providers")]
    pub providers: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IpRuleConfig {
    /// A single address or CIDR range, e.g. "10.1.0.0/16".
    pub range: String,

    /// Collections this range opens; empty means every collection.
    #[serde(default)]
    pub allow: Vec<u64>,

    /// Collections this range must never open.
    #[serde(default)]
    pub deny: Vec<u64>,
}

impl CommonConfig for AccessConfig {
    fn default() -> Self {
        Self {
            modes: Self::default_modes(),
            bypass_embargo: Self::default_bypass_embargo(),
            trust_forwarded: Self::default_trust_forwarded(),
            ip: Self::default_ip(),
            email_patterns: Self::default_email_patterns(),
            providers: Self::default_providers(),
        }
    }

    fn complete(&mut self, _ps: &PathSet) -> Result<()> {
        for mode in self.modes.iter() {
            if !MODE_ORDER.contains(&mode.as_str()) {
                bail!(
                    "unknown access mode '{mode}', expected one of: {}",
                    MODE_ORDER.join(", ")
                );
            }
        }

        let mut seen = Vec::new();
        for mode in self.modes.iter() {
            if seen.contains(mode) {
                bail!("duplicate access mode '{mode}'");
            }
            seen.push(mode.clone());
        }

        Ok(())
    }
}

impl AccessConfig {
    fn default_modes() -> Vec<String> {
        vec![
            String::from("ip"),
            String::from("session"),
            String::from("grant"),
        ]
    }

    fn default_bypass_embargo() -> bool {
        false
    }

    fn default_trust_forwarded() -> bool {
        false
    }

    fn default_ip() -> Vec<IpRuleConfig> {
        vec![]
    }

    fn default_email_patterns() -> Vec<String> {
        vec![]
    }

    fn default_providers() -> Vec<String> {
        vec![]
    }
}
