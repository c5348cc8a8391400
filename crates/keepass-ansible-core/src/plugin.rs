//! Plugin adapters.
//!
//! Each adapter exposes the operations Ansible expects from an inventory or
//! vars plugin and receives its collaborators (vault access, password
//! prompt, option sources) explicitly instead of from global state.

use crate::database::KeepassDatabase;
use crate::error::{Error, Result};
use crate::inventory::InventorySink;
use crate::mapper::to_variables;
use crate::models::HostVars;
use crate::options::{
    inventory_options, load_plugin_config, vars_options, OptionSources, OptionSpec,
    ResolvedOptions,
};
use crate::resolver::{HostIdentity, Resolver};
use crate::unlock::{open_store, PasswordPrompt, StoreCredentials};
use crate::vault::VaultDecryptor;
use crate::walker::walk;
use std::path::Path;

/// File name suffixes accepted by the inventory plugin.
pub const INVENTORY_SUFFIXES: &[&str] = &[
    "keepass.yaml",
    "keepass.yml",
    "keepass_hosts.yaml",
    "keepass_hosts.yml",
];

/// An inventory source plugin.
pub trait InventoryPlugin {
    /// Get the plugin name
    fn name(&self) -> &str;

    /// Declared options
    fn options(&self) -> Vec<OptionSpec>;

    /// Whether `path` is possibly a valid source for this plugin.
    fn verify_file(&self, path: &Path) -> bool;

    /// Populate `sink` from the source file at `path`.
    fn parse(&mut self, path: &Path, sink: &mut dyn InventorySink) -> Result<()>;
}

/// Something the vars plugin is asked about.
#[derive(Debug, Clone)]
pub enum Entity {
    Host(HostIdentity),
    Group(String),
}

/// A host variables plugin.
pub trait VarsPlugin {
    /// Get the plugin name
    fn name(&self) -> &str;

    /// Declared options
    fn options(&self) -> Vec<OptionSpec>;

    /// Variables for the first host in `entities` that has an entry.
    fn get_vars(&mut self, entities: &[Entity]) -> Result<HostVars>;
}

fn credentials(options: &ResolvedOptions) -> Result<StoreCredentials> {
    Ok(StoreCredentials {
        database: options.require("keepass_database")?.into(),
        keyfile: options.get_path("keepass_key"),
        password: options
            .get("keepass_pass")
            .filter(|pass| !pass.is_empty())
            .map(str::to_string),
    })
}

/// Inventory plugin reading hosts from a group of the database.
pub struct KeepassInventory {
    vault: Box<dyn VaultDecryptor>,
    prompt: Box<dyn PasswordPrompt>,
}

impl KeepassInventory {
    pub const NAME: &'static str = "keepass_inventory";

    pub fn new(vault: Box<dyn VaultDecryptor>, prompt: Box<dyn PasswordPrompt>) -> Self {
        Self { vault, prompt }
    }
}

impl InventoryPlugin for KeepassInventory {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn options(&self) -> Vec<OptionSpec> {
        inventory_options()
    }

    fn verify_file(&self, path: &Path) -> bool {
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        path.is_file() && INVENTORY_SUFFIXES.iter().any(|s| file_name.ends_with(s))
    }

    fn parse(&mut self, path: &Path, sink: &mut dyn InventorySink) -> Result<()> {
        let inline = load_plugin_config(path)?;
        let options = OptionSources::new()
            .without_env()
            .with_inline(inline)
            .resolve(&self.options())?;
        let root_name = options.require("keepass_root")?;

        let db = open_store(&credentials(&options)?, self.vault.as_ref(), self.prompt.as_mut())?;
        let root = db
            .find_group(root_name)
            .ok_or_else(|| Error::RootGroupNotFound(root_name.to_string()))?;

        tracing::info!("Loading inventory from KeePass group '{}'", root_name);
        walk(root, sink);
        Ok(())
    }
}

/// Vars plugin resolving hosts to entries.
pub struct KeepassVars {
    vault: Box<dyn VaultDecryptor>,
    prompt: Box<dyn PasswordPrompt>,
    sources: OptionSources,
    state: Option<(ResolvedOptions, KeepassDatabase)>,
}

impl KeepassVars {
    pub const NAME: &'static str = "keepass_vars";

    pub fn new(
        vault: Box<dyn VaultDecryptor>,
        prompt: Box<dyn PasswordPrompt>,
        sources: OptionSources,
    ) -> Self {
        Self {
            vault,
            prompt,
            sources,
            state: None,
        }
    }

    /// Use an already opened database instead of opening one from options.
    pub fn with_database(mut self, options: ResolvedOptions, db: KeepassDatabase) -> Self {
        self.state = Some((options, db));
        self
    }

    fn ensure_open(&mut self) -> Result<&(ResolvedOptions, KeepassDatabase)> {
        if self.state.is_none() {
            let options = self.sources.resolve(&vars_options())?;
            let db = open_store(&credentials(&options)?, self.vault.as_ref(), self.prompt.as_mut())?;
            self.state = Some((options, db));
        }
        self.state
            .as_ref()
            .ok_or_else(|| Error::Configuration("KeePass database is not open".to_string()))
    }
}

impl VarsPlugin for KeepassVars {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn options(&self) -> Vec<OptionSpec> {
        vars_options()
    }

    fn get_vars(&mut self, entities: &[Entity]) -> Result<HostVars> {
        let (options, db) = self.ensure_open()?;
        let resolver = Resolver::new(db).with_title_mask(options.get("keepass_title_mask"));

        for entity in entities {
            let Entity::Host(host) = entity else {
                continue;
            };
            if let Some(resolved) = resolver.resolve(host)? {
                tracing::debug!(
                    "Variables for '{}' from entry '{}' ({})",
                    host.name,
                    resolved.entry.title,
                    resolved.strategy
                );
                return Ok(to_variables(resolved.entry));
            }
        }
        Ok(HostVars::new())
    }
}
