//! KeePass-backed inventory and host variables for Ansible.
//!
//! This crate opens a KeePass database, maps its groups and entries onto an
//! inventory, and resolves individual hosts to entries for a vars plugin.

pub mod database;
pub mod error;
pub mod inventory;
pub mod mapper;
pub mod models;
pub mod options;
pub mod plugin;
pub mod resolver;
pub mod unlock;
pub mod vault;
pub mod walker;

pub use database::{KeepassDatabase, OpenFailure, TransientFailure};
pub use error::{Error, Result};
pub use inventory::{Inventory, InventorySink};
pub use mapper::to_variables;
pub use models::{Entry, Group, HostVars};
pub use plugin::{Entity, InventoryPlugin, KeepassInventory, KeepassVars, VarsPlugin};
pub use resolver::{HostIdentity, Resolver, Strategy};
pub use unlock::{open_store, PasswordPrompt, StoreCredentials, Unlocker};
pub use vault::{AnsibleVaultCommand, NoVault, VaultDecryptor};
