//! Virtual memory knobs: transparent hugepages and kernel samepage merging.

use super::{allow_or, bracketed, registry::Handler, TunableContext, TunableKey};
use crate::error::{Result, TuneError};
use crate::system::System;

pub(crate) const HANDLER: Handler = Handler { read, merge, write };

struct Knob {
    name: &'static str,
    path: &'static str,
    allowed: &'static [&'static str],
    fallback: &'static str,
}

const KNOBS: [Knob; 2] = [
    Knob {
        name: "THP",
        path: "kernel/mm/transparent_hugepage/enabled",
        allowed: &["always", "madvise", "never"],
        fallback: "never",
    },
    Knob {
        name: "KSM",
        path: "kernel/mm/ksm/run",
        allowed: &["0", "1"],
        fallback: "0",
    },
];

fn knob(key: &TunableKey) -> Option<&'static Knob> {
    KNOBS.iter().find(|k| k.name == key.name)
}

/// Unknown knobs read as "".
pub fn read(sys: &dyn System, key: &TunableKey, _ctx: &TunableContext) -> Result<String> {
    match knob(key) {
        Some(k) => sys
            .read_sysfs(k.path)
            .map(|raw| bracketed(&raw).to_string())
            .map_err(|e| TuneError::apply(key, format!("{}: {}", k.path, e))),
        None => Ok(String::new()),
    }
}

pub fn merge(key: &TunableKey, _current: &str, desired: &str, _ctx: &TunableContext) -> Result<String> {
    let desired = desired.trim();
    Ok(match knob(key) {
        Some(k) => allow_or(desired, k.allowed, k.fallback).to_string(),
        None => desired.to_string(),
    })
}

pub fn write(sys: &dyn System, key: &TunableKey, value: &str, _ctx: &TunableContext) -> Result<()> {
    match knob(key) {
        Some(k) if !value.is_empty() => sys
            .write_sysfs(k.path, value)
            .map_err(|e| TuneError::apply(key, format!("{}: {}", k.path, e))),
        _ => Ok(()),
    }
}
