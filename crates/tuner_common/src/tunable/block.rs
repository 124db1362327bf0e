//! Per block device queue settings, encoded as `dev@value` tokens.
//!
//! `IO_SCHEDULER` replaces the scheduler of every device; `NRREQ` sets the
//! queue depth, where a desired `0` doubles each device's current depth.

use super::{
    bracketed, join_tokens, registry::Handler, split_tokens, write_sysfs_all, TunableContext,
    TunableKey,
};
use crate::error::{Result, TuneError};
use crate::system::System;

pub(crate) const HANDLER: Handler = Handler { read, merge, write };

fn queue_attr(key: &TunableKey) -> Result<&'static str> {
    match key.name.as_str() {
        "IO_SCHEDULER" => Ok("scheduler"),
        "NRREQ" => Ok("nr_requests"),
        other => Err(TuneError::parse(key, format!("unsupported block setting '{}'", other))),
    }
}

fn queue_path(dev: &str, attr: &str) -> String {
    format!("block/{}/queue/{}", dev, attr)
}

/// `dev@value` for every block device exposing the queue attribute.
pub fn read(sys: &dyn System, key: &TunableKey, _ctx: &TunableContext) -> Result<String> {
    let attr = queue_attr(key)?;
    let pairs: Vec<(String, String)> = sys
        .list_sysfs("block")
        .into_iter()
        .filter_map(|dev| {
            let raw = sys.read_sysfs(&queue_path(&dev, attr)).ok()?;
            let value = bracketed(&raw).to_string();
            Some((dev, value))
        })
        .collect();
    Ok(join_tokens(&pairs, '@'))
}

pub fn merge(key: &TunableKey, current: &str, desired: &str, _ctx: &TunableContext) -> Result<String> {
    let desired = desired.trim();
    let devices = split_tokens(key, current, '@')?;
    if desired.is_empty() {
        return Ok(join_tokens(&devices, '@'));
    }
    let merged: Vec<(&str, String)> = match queue_attr(key)? {
        "scheduler" => {
            let scheduler = desired.to_lowercase();
            devices
                .iter()
                .map(|(dev, _)| (*dev, scheduler.clone()))
                .collect()
        }
        _ => {
            let depth: u64 = desired
                .parse()
                .map_err(|_| TuneError::parse(key, format!("queue depth '{}' is not a number", desired)))?;
            devices
                .iter()
                .map(|(dev, cur)| {
                    if depth != 0 {
                        return Ok((*dev, depth.to_string()));
                    }
                    let cur: u64 = cur.parse().map_err(|_| {
                        TuneError::parse(key, format!("{} has queue depth '{}'", dev, cur))
                    })?;
                    let doubled = cur
                        .checked_mul(2)
                        .ok_or_else(|| TuneError::merge(key, format!("{} queue depth overflows", dev)))?;
                    Ok((*dev, doubled.to_string()))
                })
                .collect::<Result<_>>()?
        }
    };
    Ok(join_tokens(&merged, '@'))
}

/// Writes every device or none of them.
pub fn write(sys: &dyn System, key: &TunableKey, value: &str, _ctx: &TunableContext) -> Result<()> {
    let attr = queue_attr(key)?;
    let writes: Vec<(String, String)> = split_tokens(key, value, '@')?
        .into_iter()
        .map(|(dev, v)| (queue_path(dev, attr), v.to_string()))
        .collect();
    write_sysfs_all(sys, key, &writes)
}
