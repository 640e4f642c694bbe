//! Allowlist of domain suffixes.
//!
//! Built once from the command line and never modified afterwards.

use std::fmt;

use hickory_proto::rr::Name;

use crate::error::{Error, Result};

/// An ordered set of admitted domain suffixes.
#[derive(Debug, Clone, Default)]
pub struct Allowlist {
    /// Lower-cased, fully qualified suffixes.
    suffixes: Vec<Name>,
}

impl Allowlist {
    /// Create an allowlist from raw suffixes.
    ///
    /// Entries are trimmed; empty entries are dropped so an empty `-d` value
    /// yields a pass-through allowlist. Unicode entries are stored in their
    /// punycode form.
    pub fn new<'a>(suffixes: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let mut names = Vec::new();
        for raw in suffixes {
            let suffix = raw.trim().trim_matches('.');
            if suffix.is_empty() {
                continue;
            }
            let fqdn = format!("{}.", suffix);
            let name = Name::from_ascii(&fqdn)
                .or_else(|_| Name::from_utf8(&fqdn))
                .map_err(|e| Error::Config(format!("invalid domain suffix {:?}: {}", raw, e)))?;
            names.push(name.to_lowercase());
        }

        Ok(Self { suffixes: names })
    }

    /// Parse a comma-separated suffix list.
    pub fn parse(list: &str) -> Result<Self> {
        Self::new(list.split(','))
    }

    /// Check if a query name is admitted.
    ///
    /// Names are compared label by label, ignoring ASCII case:
    /// `sub.example.com.` and `example.com.` are under `example.com`,
    /// `notexample.com.` is not.
    pub fn admits(&self, name: &Name) -> bool {
        self.suffixes.is_empty() || self.suffixes.iter().any(|suffix| suffix.zone_of(name))
    }

    /// Returns true when every query is admitted.
    pub fn is_empty(&self) -> bool {
        self.suffixes.is_empty()
    }

    /// Returns the number of configured suffixes.
    pub fn len(&self) -> usize {
        self.suffixes.len()
    }
}

impl fmt::Display for Allowlist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, suffix) in self.suffixes.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            f.write_str(&suffix.to_ascii())?;
        }
        Ok(())
    }
}
