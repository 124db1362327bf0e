//! Per-CPU power knobs.
//!
//! `energy_perf_bias` and `governor` read as `all:value` when every CPU
//! agrees and as `cpu0:value cpu1:value ...` otherwise; `none` marks hardware
//! without the knob. `force_latency` is a single resume latency in
//! microseconds applied to every CPU.

use super::{join_tokens, registry::Handler, split_tokens, write_sysfs_all, TunableContext, TunableKey};
use crate::error::{Result, TuneError};
use crate::system::System;

pub(crate) const HANDLER: Handler = Handler { read, merge, write };

const CPU_DIR: &str = "devices/system/cpu";

/// Symbolic energy/performance bias levels.
const BIAS_LEVELS: [(&str, &str); 3] = [("performance", "0"), ("normal", "6"), ("powersave", "15")];

fn knob_file(key: &TunableKey) -> Result<&'static str> {
    match key.name.as_str() {
        "energy_perf_bias" => Ok("power/energy_perf_bias"),
        "governor" => Ok("cpufreq/scaling_governor"),
        "force_latency" => Ok("power/pm_qos_resume_latency_us"),
        other => Err(TuneError::parse(key, format!("unsupported cpu knob '{}'", other))),
    }
}

fn cpus(sys: &dyn System) -> Vec<String> {
    let mut cpus: Vec<String> = sys
        .list_sysfs(CPU_DIR)
        .into_iter()
        .filter(|n| n.strip_prefix("cpu").map_or(false, |id| !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())))
        .collect();
    cpus.sort_by_key(|n| n[3..].parse::<u32>().unwrap_or(u32::MAX));
    cpus
}

fn knob_path(cpu: &str, file: &str) -> String {
    format!("{}/{}/{}", CPU_DIR, cpu, file)
}

/// CPUs that carry the knob, with its current value
fn knob_values(sys: &dyn System, file: &str) -> Vec<(String, String)> {
    cpus(sys)
        .into_iter()
        .filter_map(|cpu| {
            let v = sys.read_sysfs(&knob_path(&cpu, file)).ok()?;
            Some((cpu, v))
        })
        .collect()
}

pub fn read(sys: &dyn System, key: &TunableKey, _ctx: &TunableContext) -> Result<String> {
    let values = knob_values(sys, knob_file(key)?);

    if key.name == "force_latency" {
        return Ok(values.first().map(|(_, v)| v.clone()).unwrap_or_else(|| "none".to_string()));
    }
    match values.first() {
        None => Ok("all:none".to_string()),
        Some((_, first)) if values.iter().all(|(_, v)| v == first) => Ok(format!("all:{}", first)),
        Some(_) => Ok(join_tokens(&values, ':')),
    }
}

fn bias_value(key: &TunableKey, desired: &str) -> Result<String> {
    if let Some((_, level)) = BIAS_LEVELS.iter().find(|(name, _)| name.eq_ignore_ascii_case(desired)) {
        return Ok(level.to_string());
    }
    match desired.parse::<u8>() {
        Ok(n) if n <= 15 => Ok(n.to_string()),
        _ => Err(TuneError::merge(
            key,
            format!("'{}' is no energy_perf_bias level (performance, normal, powersave or 0-15)", desired),
        )),
    }
}

pub fn merge(key: &TunableKey, current: &str, desired: &str, _ctx: &TunableContext) -> Result<String> {
    let desired = desired.trim();
    if desired.is_empty() {
        return Ok(current.to_string());
    }
    let value = match key.name.as_str() {
        "force_latency" => return Ok(desired.to_string()),
        "energy_perf_bias" => bias_value(key, desired)?,
        "governor" => desired.to_string(),
        other => {
            return Err(TuneError::parse(key, format!("unsupported cpu knob '{}'", other)))
        }
    };
    let merged: Vec<(&str, String)> = split_tokens(key, current, ':')?
        .into_iter()
        .map(|(cpu, cur)| {
            if cur == "none" {
                (cpu, cur.to_string())
            } else {
                (cpu, value.clone())
            }
        })
        .collect();
    Ok(join_tokens(&merged, ':'))
}

pub fn write(sys: &dyn System, key: &TunableKey, value: &str, _ctx: &TunableContext) -> Result<()> {
    let file = knob_file(key)?;
    // offline or limited CPUs may lack the knob; `read` skips them too
    let all: Vec<String> = knob_values(sys, file).into_iter().map(|(cpu, _)| cpu).collect();
    let mut writes = Vec::new();
    if key.name == "force_latency" {
        if value.is_empty() || value == "none" {
            return Ok(());
        }
        for cpu in &all {
            writes.push((knob_path(cpu, file), value.to_string()));
        }
    } else {
        for (target, v) in split_tokens(key, value, ':')? {
            if v == "none" {
                continue;
            }
            if target == "all" {
                writes.extend(all.iter().map(|cpu| (knob_path(cpu, file), v.to_string())));
            } else {
                writes.push((knob_path(target, file), v.to_string()));
            }
        }
    }
    write_sysfs_all(sys, key, &writes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::InMemorySystem;
    use crate::tunable::Family;

    fn merge_cpu(name: &str, current: &str, desired: &str) -> Result<String> {
        merge(
            &TunableKey::new(Family::Cpu, name),
            current,
            desired,
            &TunableContext::default(),
        )
    }

    #[test]
    fn test_force_latency_scalar() {
        assert_eq!(merge_cpu("force_latency", "1000", "70").unwrap(), "70");
    }

    #[test]
    fn test_bias_lookup_broadcast() {
        assert_eq!(merge_cpu("energy_perf_bias", "all:15", "performance").unwrap(), "all:0");
        assert_eq!(
            merge_cpu("energy_perf_bias", "cpu0:15 cpu1:6 cpu2:0", "performance").unwrap(),
            "cpu0:0 cpu1:0 cpu2:0"
        );
        assert_eq!(merge_cpu("energy_perf_bias", "all:0", "powersave").unwrap(), "all:15");
        assert_eq!(merge_cpu("energy_perf_bias", "all:none", "performance").unwrap(), "all:none");
        assert!(matches!(
            merge_cpu("energy_perf_bias", "all:6", "turbo"),
            Err(TuneError::Merge { .. })
        ));
    }

    #[test]
    fn test_governor_broadcast() {
        assert_eq!(merge_cpu("governor", "all:powersave", "performance").unwrap(), "all:performance");
        assert_eq!(
            merge_cpu("governor", "cpu0:powersave cpu1:performance cpu2:powersave", "performance").unwrap(),
            "cpu0:performance cpu1:performance cpu2:performance"
        );
    }

    #[test]
    fn test_read_collapses_uniform_cpus() {
        let sys = InMemorySystem::new()
            .with_sysfs("devices/system/cpu/cpu0/cpufreq/scaling_governor", "powersave")
            .with_sysfs("devices/system/cpu/cpu1/cpufreq/scaling_governor", "powersave")
            .with_sysfs("devices/system/cpu/cpu10/cpufreq/scaling_governor", "performance")
            .with_sysfs("devices/system/cpu/cpufreq/boost", "1");
        let key = TunableKey::new(Family::Cpu, "governor");
        let ctx = TunableContext::default();

        assert_eq!(
            read(&sys, &key, &ctx).unwrap(),
            "cpu0:powersave cpu1:powersave cpu10:performance"
        );
        write(&sys, &key, "all:performance", &ctx).unwrap();
        assert_eq!(read(&sys, &key, &ctx).unwrap(), "all:performance");
    }

    #[test]
    fn test_broadcast_skips_cpus_without_knob() {
        let sys = InMemorySystem::new()
            .with_sysfs("devices/system/cpu/cpu0/cpufreq/scaling_governor", "powersave")
            .with_sysfs("devices/system/cpu/cpu1/online", "0")
            .with_sysfs("devices/system/cpu/cpu2/cpufreq/scaling_governor", "powersave");
        let key = TunableKey::new(Family::Cpu, "governor");
        let ctx = TunableContext::default();

        let current = read(&sys, &key, &ctx).unwrap();
        assert_eq!(current, "all:powersave");
        let merged = merge(&key, &current, "performance", &ctx).unwrap();
        write(&sys, &key, &merged, &ctx).unwrap();

        assert_eq!(read(&sys, &key, &ctx).unwrap(), "all:performance");
        assert!(sys.sysfs("devices/system/cpu/cpu1/cpufreq/scaling_governor").is_none());
        write(&sys, &key, &current, &ctx).unwrap();
        assert_eq!(
            sys.sysfs("devices/system/cpu/cpu2/cpufreq/scaling_governor").as_deref(),
            Some("powersave")
        );
    }

    #[test]
    fn test_missing_knob_reads_none() {
        let sys = InMemorySystem::new();
        let key = TunableKey::new(Family::Cpu, "energy_perf_bias");
        assert_eq!(read(&sys, &key, &TunableContext::default()).unwrap(), "all:none");
        write(&sys, &key, "all:none", &TunableContext::default()).unwrap();
    }
}
