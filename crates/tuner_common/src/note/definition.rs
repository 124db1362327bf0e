//! Note definition files.
//!
//! ```text
//! # Linux settings for SAP HANA
//! [sysctl]
//! vm.swappiness = 10
//!
//! [limits]
//! LIMIT_ITEM = nofile
//! LIMIT_DOMAIN = @sapsys @sdba
//! LIMIT_SOFT = 32800
//! ```
//!
//! One section per tunable family. A leading comment line is the note's
//! description, other comments are ignored. `LIMIT_ITEM` and `LIMIT_DOMAIN`
//! describe the `[limits]` tunables rather than being tunables themselves.

use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{Result, TuneError};
use crate::tunable::{Family, TunableContext, TunableKey};

const LIMIT_ITEM: &str = "LIMIT_ITEM";
const LIMIT_DOMAIN: &str = "LIMIT_DOMAIN";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteDefinition {
    pub id: String,
    pub description: String,
    /// Declared tunables and desired values, in file order
    pub tunables: Vec<(TunableKey, String)>,
    pub limit_item: Option<String>,
    pub limit_domains: Vec<String>,
}

impl NoteDefinition {
    pub fn parse(id: &str, content: &str) -> Result<Self> {
        let mut def = NoteDefinition {
            id: id.to_string(),
            ..Default::default()
        };
        let mut section: Option<Family> = None;
        let mut seen_content = false;

        for (idx, raw) in content.lines().enumerate() {
            let line = raw.trim();
            let at = || format!("{}:{}", id, idx + 1);
            if line.is_empty() {
                continue;
            }
            if let Some(comment) = line.strip_prefix('#') {
                if !seen_content && def.description.is_empty() {
                    def.description = comment.trim().to_string();
                }
                continue;
            }
            seen_content = true;

            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                section = Some(
                    Family::from_section(name)
                        .ok_or_else(|| TuneError::parse(at(), format!("unknown section [{}]", name)))?,
                );
                continue;
            }
            let family = section.ok_or_else(|| TuneError::parse(at(), "entry outside of a section"))?;
            let (name, value) = line
                .split_once('=')
                .ok_or_else(|| TuneError::parse(at(), format!("expected KEY = value, got '{}'", line)))?;
            def.set(family, name.trim(), value.trim());
        }
        Ok(def)
    }

    pub fn load(id: &str, path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(id, &content)
    }

    fn set(&mut self, family: Family, name: &str, value: &str) {
        match (family, name) {
            (Family::Limits, LIMIT_ITEM) => self.limit_item = Some(value.to_string()),
            (Family::Limits, LIMIT_DOMAIN) => {
                self.limit_domains = value.split_whitespace().map(str::to_string).collect()
            }
            _ => {
                let key = TunableKey::new(family, name);
                match self.tunables.iter_mut().find(|(k, _)| *k == key) {
                    Some((_, v)) => *v = value.to_string(),
                    None => self.tunables.push((key, value.to_string())),
                }
            }
        }
    }

    /// Layer an override file on top.
    ///
    /// Values replace the note's own per key; an empty value drops the key
    /// from the note. Keys the note does not declare are ignored.
    pub fn apply_override(&mut self, content: &str) -> Result<()> {
        let ovw = NoteDefinition::parse(&self.id, content)?;
        if ovw.limit_item.is_some() {
            self.limit_item = ovw.limit_item;
        }
        if !ovw.limit_domains.is_empty() {
            self.limit_domains = ovw.limit_domains;
        }
        for (key, value) in ovw.tunables {
            let Some(pos) = self.tunables.iter().position(|(k, _)| *k == key) else {
                warn!("override for {} ignores {}: not part of the note", self.id, key);
                continue;
            };
            if value.is_empty() {
                debug!("override for {} drops {}", self.id, key);
                self.tunables.remove(pos);
            } else {
                self.tunables[pos].1 = value;
            }
        }
        Ok(())
    }

    pub fn desired(&self, key: &TunableKey) -> Option<&str> {
        self.tunables
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Handler context the note declares for `family`.
    pub fn context(&self, family: Family) -> TunableContext {
        match family {
            Family::Limits => TunableContext {
                limit_item: self.limit_item.clone(),
                limit_domains: self.limit_domains.clone(),
                ..Default::default()
            },
            _ => TunableContext::default(),
        }
    }
}
