//! Error types shared by the store, resolver and plugin adapters.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors. Anything in here aborts the run.
#[derive(Debug, Error)]
pub enum Error {
    /// A required option is missing or has an unusable value.
    #[error("{0}")]
    Configuration(String),

    /// `keepass_pass` is vault-encrypted and no vault secret is configured.
    #[error("'keepass_pass' encrypted by vault, but vault-password not provided. Please use option --ask-vault-password")]
    VaultSecretMissing,

    /// The vault collaborator failed to decrypt a value.
    #[error("Vault decryption failed: {0}")]
    Vault(String),

    /// The configured `keepass_root` does not exist in the database.
    #[error("Group '{0}' not found in KeePass database")]
    RootGroupNotFound(String),

    /// Reading the interactive password failed.
    #[error("Failed to read password: {0}")]
    Prompt(String),

    /// The database could not be opened and retrying will not help.
    #[error("Failed to open database {path}: {message}")]
    Database { path: PathBuf, message: String },

    /// The title mask is not a valid template.
    #[error("Invalid keepass_title_mask: {0}")]
    Template(#[from] minijinja::Error),

    /// Plugin configuration file could not be read or parsed.
    #[error("Failed to read plugin config {path}: {message}")]
    PluginConfig { path: PathBuf, message: String },
}
