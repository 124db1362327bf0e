//! Family to handler dispatch.
//!
//! Each family has exactly one handler: a `read` of the live value, a pure
//! `merge` of current and desired values, and a `write` of a merged value.

use tracing::debug;

use super::{block, cpu, grub, limits, login, mem, pagecache, rpm, service, sysctl, vm};
use super::{Family, TunableContext, TunableKey};
use crate::error::Result;
use crate::system::System;

pub type ReadFn = fn(&dyn System, &TunableKey, &TunableContext) -> Result<String>;
pub type MergeFn = fn(&TunableKey, &str, &str, &TunableContext) -> Result<String>;
pub type WriteFn = fn(&dyn System, &TunableKey, &str, &TunableContext) -> Result<()>;

/// Read, merge and write operations of one family
#[derive(Clone, Copy)]
pub struct Handler {
    pub read: ReadFn,
    pub merge: MergeFn,
    pub write: WriteFn,
}

static HANDLERS: [(Family, Handler); 11] = [
    (Family::Sysctl, sysctl::HANDLER),
    (Family::Block, block::HANDLER),
    (Family::Limits, limits::HANDLER),
    (Family::Vm, vm::HANDLER),
    (Family::Cpu, cpu::HANDLER),
    (Family::Mem, mem::HANDLER),
    (Family::Pagecache, pagecache::HANDLER),
    (Family::Grub, grub::HANDLER),
    (Family::Service, service::HANDLER),
    (Family::Login, login::HANDLER),
    (Family::Rpm, rpm::HANDLER),
];

pub fn handler(family: Family) -> &'static Handler {
    &HANDLERS[family.index()].1
}

pub fn read(sys: &dyn System, key: &TunableKey, ctx: &TunableContext) -> Result<String> {
    (handler(key.family).read)(sys, key, ctx)
}

pub fn merge(key: &TunableKey, current: &str, desired: &str, ctx: &TunableContext) -> Result<String> {
    let merged = (handler(key.family).merge)(key, current, desired, ctx)?;
    debug!("{}: current '{}' desired '{}' -> '{}'", key, current, desired, merged);
    Ok(merged)
}

pub fn write(sys: &dyn System, key: &TunableKey, value: &str, ctx: &TunableContext) -> Result<()> {
    (handler(key.family).write)(sys, key, value, ctx)
}
