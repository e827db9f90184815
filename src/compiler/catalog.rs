//! Source/sink catalog
//!
//! Name-based recognition of taint-introducing calls (sources) and calls that
//! write through a pointer argument (sinks).

use std::collections::HashSet;

use crate::config::GuardConfig;

#[derive(Debug, Clone)]
pub struct SourceCatalog {
    sources: HashSet<String>,
    sinks: HashSet<String>,
    case_sensitive: bool,
}

impl SourceCatalog {
    pub fn new<S, K>(sources: S, sinks: K, case_sensitive: bool) -> Self
    where
        S: IntoIterator,
        S::Item: AsRef<str>,
        K: IntoIterator,
        K::Item: AsRef<str>,
    {
        let normalize = |name: &str| {
            if case_sensitive {
                name.to_string()
            } else {
                name.to_ascii_lowercase()
            }
        };
        Self {
            sources: sources.into_iter().map(|s| normalize(s.as_ref())).collect(),
            sinks: sinks.into_iter().map(|s| normalize(s.as_ref())).collect(),
            case_sensitive,
        }
    }

    pub fn from_config(config: &GuardConfig) -> Self {
        Self::new(&config.sources, &config.sinks, config.case_sensitive)
    }

    pub fn is_source(&self, name: &str) -> bool {
        self.lookup(&self.sources, name)
    }

    pub fn is_sink(&self, name: &str) -> bool {
        self.lookup(&self.sinks, name)
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    fn lookup(&self, set: &HashSet<String>, name: &str) -> bool {
        if self.case_sensitive {
            set.contains(name)
        } else {
            set.contains(&name.to_ascii_lowercase())
        }
    }
}

impl Default for SourceCatalog {
    fn default() -> Self {
        Self::from_config(&GuardConfig::default())
    }
}
