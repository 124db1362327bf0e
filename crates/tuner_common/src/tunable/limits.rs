//! Resource limits in `/etc/security/limits.conf`.
//!
//! Values are `domain:value` tokens, each followed by a space, one per limit
//! domain (`"@sapsys:32800 @sdba:32800 "`). An empty value means the file
//! has no entry for that domain.

use std::path::Path;

use super::{registry::Handler, split_tokens, TunableContext, TunableKey};
use crate::error::{Result, TuneError};
use crate::system::System;

pub(crate) const HANDLER: Handler = Handler { read, merge, write };

pub const LIMITS_CONF: &str = "/etc/security/limits.conf";

/// Limit values that already mean "no limit" and are never lowered.
const UNLIMITED: [&str; 3] = ["unlimited", "infinity", "-1"];

fn limit_type(key: &TunableKey) -> Result<&'static str> {
    match key.name.as_str() {
        "LIMIT_SOFT" => Ok("soft"),
        "LIMIT_HARD" => Ok("hard"),
        other => Err(TuneError::parse(key, format!("unsupported limit '{}'", other))),
    }
}

fn limit_item<'a>(key: &TunableKey, ctx: &'a TunableContext) -> Result<&'a str> {
    ctx.limit_item
        .as_deref()
        .ok_or_else(|| TuneError::parse(key, "no LIMIT_ITEM configured"))
}

/// `memlock` default: 90% of total memory, in KiB.
pub fn memlock_default(total_memory_mb: u64) -> u64 {
    let kib = total_memory_mb * 1024;
    kib - kib * 10 / 100
}

fn encode(pairs: &[(&str, String)]) -> String {
    pairs
        .iter()
        .map(|(dom, value)| format!("{}:{} ", dom, value))
        .collect()
}

/// Value of the last matching `domain type item value` line.
fn lookup<'a>(content: &'a str, domain: &str, ltype: &str, item: &str) -> Option<&'a str> {
    content
        .lines()
        .filter(|l| !l.trim_start().starts_with('#'))
        .filter_map(|l| {
            let f: Vec<&str> = l.split_whitespace().collect();
            (f.len() == 4 && f[0] == domain && f[1] == ltype && f[2] == item).then(|| f[3])
        })
        .last()
}

pub fn read(sys: &dyn System, key: &TunableKey, ctx: &TunableContext) -> Result<String> {
    let ltype = limit_type(key)?;
    let item = limit_item(key, ctx)?;
    let content = sys
        .read_file(Path::new(LIMITS_CONF))
        .map_err(|e| TuneError::apply(key, format!("{}: {}", LIMITS_CONF, e)))?
        .unwrap_or_default();
    let pairs: Vec<(&str, String)> = ctx
        .limit_domains
        .iter()
        .map(|dom| {
            let value = lookup(&content, dom, ltype, item).unwrap_or("");
            (dom.as_str(), value.to_string())
        })
        .collect();
    Ok(encode(&pairs))
}

/// Broadcast the desired limit to every domain present in `current`.
///
/// Domains already unlimited keep their value. For `memlock` a desired `0`
/// asks for the computed default, applied only where no limit is set yet.
pub fn merge(key: &TunableKey, current: &str, desired: &str, ctx: &TunableContext) -> Result<String> {
    let item = limit_item(key, ctx)?;
    let desired = desired.trim();
    let domains = split_tokens(key, current, ':')?;
    let mut merged = Vec::with_capacity(domains.len());
    for (dom, cur) in domains {
        let value = if desired.is_empty() || UNLIMITED.contains(&cur) {
            cur.to_string()
        } else if UNLIMITED.contains(&desired) {
            desired.to_string()
        } else if item == "memlock" && desired == "0" {
            if cur.is_empty() || cur == "0" {
                if ctx.total_memory_mb == 0 {
                    return Err(TuneError::merge(key, "total memory size unknown"));
                }
                memlock_default(ctx.total_memory_mb).to_string()
            } else {
                cur.to_string()
            }
        } else {
            desired.to_string()
        };
        merged.push((dom, value));
    }
    Ok(encode(&merged))
}

/// Rewrite the entries for every domain; an empty value drops the entry.
pub fn write(sys: &dyn System, key: &TunableKey, value: &str, ctx: &TunableContext) -> Result<()> {
    let ltype = limit_type(key)?;
    let item = limit_item(key, ctx)?;
    let path = Path::new(LIMITS_CONF);
    let entries = split_tokens(key, value, ':')?;
    let content = sys
        .read_file(path)
        .map_err(|e| TuneError::apply(key, format!("{}: {}", LIMITS_CONF, e)))?
        .unwrap_or_default();

    let mut lines: Vec<String> = content
        .lines()
        .filter(|l| {
            let f: Vec<&str> = l.split_whitespace().collect();
            !(f.len() == 4
                && f[1] == ltype
                && f[2] == item
                && entries.iter().any(|(dom, _)| *dom == f[0]))
        })
        .map(|l| l.to_string())
        .collect();
    for (dom, v) in &entries {
        if !v.is_empty() {
            lines.push(format!("{} {} {} {}", dom, ltype, item, v));
        }
    }

    let mut updated = lines.join("\n");
    if !updated.is_empty() {
        updated.push('\n');
    }
    if updated == content {
        return Ok(());
    }
    sys.write_file(path, Some(&updated))
        .map_err(|e| TuneError::apply(key, format!("{}: {}", LIMITS_CONF, e)))
}
