//! Finds the database entry backing a host.
//!
//! Strategies are tried in a fixed order and the first hit wins:
//! the host name as title, the `keepass_title` alias, the rendered title
//! mask, and finally a search over entry URLs built from the connection
//! variables the host already has.

use crate::database::KeepassDatabase;
use crate::error::Result;
use crate::models::{Entry, HostVars};
use minijinja::{context, Environment};
use serde_json::Value;
use std::fmt;

/// Title mask that is equivalent to looking up the host name itself.
pub const DEFAULT_TITLE_MASK: &str = "{{ hostname }}";

/// Host variable holding an alternative entry title.
pub const TITLE_ALIAS_VAR: &str = "keepass_title";

/// A host as seen by the vars plugin.
#[derive(Debug, Clone, Default)]
pub struct HostIdentity {
    pub name: String,
    pub vars: HostVars,
}

impl HostIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vars: HostVars::new(),
        }
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// A known variable rendered as text, ignoring nulls.
    fn var(&self, key: &str) -> Option<String> {
        match self.vars.get(key)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// Which strategy produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Title,
    Alias,
    Mask,
    Url,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Title => "title",
            Self::Alias => "keepass_title",
            Self::Mask => "title mask",
            Self::Url => "url",
        };
        f.write_str(name)
    }
}

/// A successful resolution.
#[derive(Debug, Clone, Copy)]
pub struct Resolved<'db> {
    pub entry: &'db Entry,
    pub strategy: Strategy,
}

/// Resolution chain over one opened database.
pub struct Resolver<'db> {
    db: &'db KeepassDatabase,
    title_mask: Option<String>,
    env: Environment<'static>,
}

impl<'db> Resolver<'db> {
    pub fn new(db: &'db KeepassDatabase) -> Self {
        Self {
            db,
            title_mask: None,
            env: Environment::new(),
        }
    }

    /// Set the title mask. The default mask counts as unset.
    pub fn with_title_mask(mut self, mask: Option<&str>) -> Self {
        self.title_mask = mask
            .filter(|mask| !mask.is_empty() && *mask != DEFAULT_TITLE_MASK)
            .map(str::to_string);
        self
    }

    /// Render the title mask for `hostname`.
    pub fn render_mask(&self, hostname: &str) -> Result<Option<String>> {
        let Some(mask) = self.title_mask.as_deref() else {
            return Ok(None);
        };
        let title = self.env.render_str(mask, context! { hostname => hostname })?;
        Ok(Some(title))
    }

    /// Literal titles to try, in order and without repeats.
    pub fn candidate_titles(&self, host: &HostIdentity) -> Result<Vec<(Strategy, String)>> {
        let mut candidates = vec![(Strategy::Title, host.name.clone())];
        if let Some(alias) = host.var(TITLE_ALIAS_VAR) {
            candidates.push((Strategy::Alias, alias));
        }
        if let Some(title) = self.render_mask(&host.name)? {
            candidates.push((Strategy::Mask, title));
        }

        let mut seen = Vec::new();
        candidates.retain(|(_, title)| {
            if seen.contains(title) {
                false
            } else {
                seen.push(title.clone());
                true
            }
        });
        Ok(candidates)
    }

    /// URL pattern from `[ansible_connection://]ansible_host[:ansible_port]`.
    pub fn url_pattern(host: &HostIdentity) -> Option<String> {
        let mut pattern = host.var("ansible_host")?;
        if let Some(connection) = host.var("ansible_connection") {
            pattern = format!("{}://{}", connection, pattern);
        }
        if let Some(port) = host.var("ansible_port") {
            pattern = format!("{}:{}", pattern, port);
        }
        Some(pattern)
    }

    /// Find the entry for `host`. A miss is `Ok(None)`.
    pub fn resolve(&self, host: &HostIdentity) -> Result<Option<Resolved<'db>>> {
        for (strategy, title) in self.candidate_titles(host)? {
            if let Some(entry) = self.db.find_entry_by_title(&title) {
                tracing::debug!("Host '{}' matched entry '{}' by {}", host.name, title, strategy);
                return Ok(Some(Resolved { entry, strategy }));
            }
        }

        if let Some(pattern) = Self::url_pattern(host) {
            if let Some(entry) = self.db.find_entry_by_url(&pattern) {
                tracing::debug!("Host '{}' matched entry '{}' by url", host.name, entry.title);
                return Ok(Some(Resolved {
                    entry,
                    strategy: Strategy::Url,
                }));
            }
        }

        tracing::debug!("No KeePass entry for host '{}'", host.name);
        Ok(None)
    }
}
