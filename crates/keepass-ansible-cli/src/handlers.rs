//! Subcommand handling.

use crate::prompt::TerminalPrompt;
use anyhow::{bail, Context, Result};
use keepass_ansible_core::options::{find_ansible_cfg, load_ini, OptionSources};
use keepass_ansible_core::{
    AnsibleVaultCommand, Entity, HostIdentity, Inventory, InventoryPlugin, KeepassInventory,
    KeepassVars, NoVault, VaultDecryptor, VarsPlugin,
};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Pick the vault collaborator.
pub fn vault(password_file: Option<PathBuf>) -> Box<dyn VaultDecryptor> {
    match password_file {
        Some(file) => Box::new(AnsibleVaultCommand::new(file)),
        None => Box::new(NoVault),
    }
}

/// Parse `KEY=VALUE`; values that are valid JSON keep their type.
pub fn parse_var(raw: &str) -> std::result::Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;
    if key.is_empty() {
        return Err(format!("empty variable name in '{}'", raw));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// `inventory --list` / `inventory --host`.
pub fn inventory(config: &Path, host: Option<&str>, vault: Box<dyn VaultDecryptor>) -> Result<()> {
    let mut plugin = KeepassInventory::new(vault, Box::new(TerminalPrompt));
    if !plugin.verify_file(config) {
        bail!(
            "{} is not a keepass_inventory source (expected *keepass.yml or *keepass_hosts.yml)",
            config.display()
        );
    }

    let mut inventory = Inventory::new();
    plugin
        .parse(config, &mut inventory)
        .with_context(|| format!("Failed to build inventory from {}", config.display()))?;

    match host {
        Some(host) => {
            let vars = inventory.host_vars(host).cloned().unwrap_or_default();
            print_json(&serde_json::to_value(vars)?)
        }
        None => print_json(&inventory.to_json()),
    }
}

/// `vars HOST --var k=v ...`.
pub fn vars(
    host: String,
    known: Vec<(String, Value)>,
    ini: Option<PathBuf>,
    vault: Box<dyn VaultDecryptor>,
) -> Result<()> {
    let mut sources = OptionSources::new();
    if let Some(path) = ini.or_else(find_ansible_cfg) {
        tracing::debug!("Reading [keepass] options from {}", path.display());
        sources = sources.with_ini(load_ini(&path)?);
    }

    let mut identity = HostIdentity::new(host);
    identity.vars.extend(known);

    let mut plugin = KeepassVars::new(vault, Box::new(TerminalPrompt), sources);
    let vars = plugin.get_vars(&[Entity::Host(identity)])?;
    print_json(&serde_json::to_value(vars)?)
}

/// `verify PATH`.
pub fn verify(path: &Path) -> bool {
    let plugin = KeepassInventory::new(Box::new(NoVault), Box::new(TerminalPrompt));
    let accepted = plugin.verify_file(path);
    tracing::info!("{} accepted by {}: {}", path.display(), plugin.name(), accepted);
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var_keeps_json_types() {
        assert_eq!(
            parse_var("ansible_port=2222").unwrap(),
            ("ansible_port".to_string(), Value::from(2222))
        );
        assert_eq!(
            parse_var("ansible_host=10.0.0.5").unwrap(),
            ("ansible_host".to_string(), Value::from("10.0.0.5"))
        );
        assert_eq!(
            parse_var("note=a=b").unwrap(),
            ("note".to_string(), Value::from("a=b"))
        );
    }

    #[test]
    fn test_parse_var_rejects_garbage() {
        assert!(parse_var("novalue").is_err());
        assert!(parse_var("=x").is_err());
    }
}
