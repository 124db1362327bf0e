//! Kernel parameters, scalar or vector (`kernel.sem = 1250 256000 100 8192`).

use super::{registry::Handler, TunableContext, TunableKey};
use crate::error::{Result, TuneError};
use crate::system::System;

pub(crate) const HANDLER: Handler = Handler { read, merge, write };

/// Live value, fields tab separated like `/proc/sys` prints vectors.
pub fn read(sys: &dyn System, key: &TunableKey, _ctx: &TunableContext) -> Result<String> {
    let raw = sys
        .read_sysctl(&key.name)
        .map_err(|e| TuneError::apply(key, e.to_string()))?;
    Ok(raw.split_whitespace().collect::<Vec<_>>().join("\t"))
}

/// Scalar desired values replace the current value; vector desired values
/// must have exactly as many fields as the current one.
pub fn merge(key: &TunableKey, current: &str, desired: &str, _ctx: &TunableContext) -> Result<String> {
    let wanted: Vec<&str> = desired.split_whitespace().collect();
    match wanted.len() {
        0 => Ok(current.to_string()),
        1 => Ok(wanted[0].to_string()),
        n => {
            let have = current.split_whitespace().count();
            if have != n {
                return Err(TuneError::merge(
                    key,
                    format!("desired value has {} fields, current value has {}", n, have),
                ));
            }
            Ok(wanted.join("\t"))
        }
    }
}

pub fn write(sys: &dyn System, key: &TunableKey, value: &str, _ctx: &TunableContext) -> Result<()> {
    sys.write_sysctl(&key.name, value)
        .map_err(|e| TuneError::apply(key, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::InMemorySystem;
    use crate::tunable::Family;

    fn key() -> TunableKey {
        TunableKey::new(Family::Sysctl, "TestParam")
    }

    #[test]
    fn test_scalar_replaces() {
        let ctx = TunableContext::default();
        assert_eq!(merge(&key(), "120", "100", &ctx).unwrap(), "100");
    }

    #[test]
    fn test_vector_fields_tab_joined() {
        let ctx = TunableContext::default();
        assert_eq!(
            merge(&key(), "120 300 200", "100 330 180", &ctx).unwrap(),
            "100\t330\t180"
        );
    }

    #[test]
    fn test_vector_length_mismatch_fails() {
        let ctx = TunableContext::default();
        let err = merge(&key(), "120 300", "100 330 180", &ctx).unwrap_err();
        assert!(matches!(err, TuneError::Merge { .. }), "{}", err);
    }

    #[test]
    fn test_empty_desired_keeps_current() {
        let ctx = TunableContext::default();
        assert_eq!(merge(&key(), "120\t300", "", &ctx).unwrap(), "120\t300");
    }

    #[test]
    fn test_read_normalizes_whitespace() {
        let sys = InMemorySystem::new().with_sysctl("kernel.sem", "250  32000\t32 128");
        let k = TunableKey::new(Family::Sysctl, "kernel.sem");
        assert_eq!(
            read(&sys, &k, &TunableContext::default()).unwrap(),
            "250\t32000\t32\t128"
        );
    }
}
