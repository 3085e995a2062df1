use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};

use anyhow::{bail, Context, Result};

use crate::server::db::Transaction;

use super::config::IpRuleConfig;
use super::{AccessCheck, AccessMode, AncestorCache, ModeResponse};

/// One compiled reservation: a numeric address range with the collections it
/// opens (empty = all) and the collections it explicitly forbids.
#[derive(Debug, Clone)]
pub struct IpRange {
    pub low: u32,
    pub high: u32,
    pub allow: HashSet<u64>,
    pub deny: HashSet<u64>,
}

/// The reservation list, compiled from the human-edited config into sorted
/// numeric bounds so a lookup is a single binary search.
#[derive(Debug, Clone, Default)]
pub struct IpReservations {
    ranges: Vec<IpRange>,
}

impl IpReservations {
    pub fn compile(rules: &[IpRuleConfig]) -> Result<Self> {
        let mut ranges = Vec::with_capacity(rules.len());
        for rule in rules {
            let (low, high) = parse_range(&rule.range)
                .with_context(|| format!("parse ip reservation '{}'", rule.range))?;
            ranges.push(IpRange {
                low,
                high,
                allow: rule.allow.iter().copied().collect(),
                deny: rule.deny.iter().copied().collect(),
            });
        }

        ranges.sort_by_key(|r| r.low);
        for pair in ranges.windows(2) {
            if pair[1].low <= pair[0].high {
                bail!(
                    "overlapping ip reservations: {} and {}",
                    Ipv4Addr::from(pair[0].low),
                    Ipv4Addr::from(pair[1].low)
                );
            }
        }

        Ok(Self { ranges })
    }

    pub fn lookup(&self, ip: Ipv4Addr) -> Option<&IpRange> {
        let ip = u32::from(ip);
        let idx = self.ranges.partition_point(|r| r.low <= ip);
        if idx == 0 {
            return None;
        }
        let candidate = &self.ranges[idx - 1];
        if ip <= candidate.high {
            Some(candidate)
        } else {
            None
        }
    }
}

/// Parses a single address or a CIDR range into numeric bounds.
fn parse_range(s: &str) -> Result<(u32, u32)> {
    match s.split_once('/') {
        Some((addr, prefix)) => {
            let addr: Ipv4Addr = addr.parse().context("invalid ipv4 address")?;
            let prefix: u32 = prefix.parse().context("invalid prefix length")?;
            if prefix > 32 {
                bail!("prefix length {prefix} out of range");
            }
            let mask = if prefix == 0 {
                0
            } else {
                u32::MAX << (32 - prefix)
            };
            let low = u32::from(addr) & mask;
            let high = low | !mask;
            Ok((low, high))
        }
        None => {
            let addr: Ipv4Addr = s.parse().context("invalid ipv4 address")?;
            let value = u32::from(addr);
            Ok((value, value))
        }
    }
}

/// Grants access when the client address falls in a reserved range whose
/// allow/deny lists admit the record's collection. A missing or non-IPv4
/// address is simply no match, never an error.
pub struct IpMode {
    reservations: IpReservations,
}

impl IpMode {
    pub fn new(reservations: IpReservations) -> Self {
        Self { reservations }
    }
}

impl AccessMode for IpMode {
    fn check(
        &self,
        tx: &dyn Transaction,
        check: &AccessCheck,
        cache: &mut AncestorCache,
    ) -> Result<ModeResponse> {
        let ip = match check.client_ip {
            Some(IpAddr::V4(ip)) => ip,
            _ => return Ok(ModeResponse::Continue),
        };

        let range = match self.reservations.lookup(ip) {
            Some(range) => range,
            None => return Ok(ModeResponse::Continue),
        };

        let collection = cache.collection_of(tx, check.resource)?;
        match collection {
            Some(collection) => {
                if range.deny.contains(&collection) {
                    return Ok(ModeResponse::Continue);
                }
                if range.allow.is_empty() || range.allow.contains(&collection) {
                    return Ok(ModeResponse::Allow);
                }
                Ok(ModeResponse::Continue)
            }
            // Records outside any collection are only opened by ranges
            // without an allow list
            None => {
                if range.allow.is_empty() {
                    Ok(ModeResponse::Allow)
                } else {
                    Ok(ModeResponse::Continue)
                }
            }
        }
    }
}
