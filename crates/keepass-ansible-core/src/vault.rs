//! Access to vault-encrypted option values.
//!
//! Decryption is delegated to the host tooling; this module only detects
//! vault payloads and hands them to a [`VaultDecryptor`].

use crate::error::{Error, Result};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

const VAULT_HEADER: &str = "$ANSIBLE_VAULT;";

/// Whether `text` looks like an Ansible vault payload.
pub fn is_vault_payload(text: &str) -> bool {
    text.trim_start().starts_with(VAULT_HEADER)
}

/// Decrypts vault payloads on behalf of the plugins.
pub trait VaultDecryptor {
    /// Whether `text` is vault ciphertext.
    fn is_encrypted(&self, text: &str) -> bool {
        is_vault_payload(text)
    }

    /// Whether at least one vault secret is available.
    fn has_secrets(&self) -> bool;

    /// Decrypt a vault payload.
    fn decrypt(&self, payload: &str) -> Result<Vec<u8>>;
}

/// A vault with no secrets. Any encrypted value is a configuration error.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoVault;

impl VaultDecryptor for NoVault {
    fn has_secrets(&self) -> bool {
        false
    }

    fn decrypt(&self, _payload: &str) -> Result<Vec<u8>> {
        Err(Error::VaultSecretMissing)
    }
}

/// Decrypts through the `ansible-vault` executable.
#[derive(Debug, Clone)]
pub struct AnsibleVaultCommand {
    program: PathBuf,
    password_file: PathBuf,
}

impl AnsibleVaultCommand {
    pub fn new(password_file: impl Into<PathBuf>) -> Self {
        Self {
            program: PathBuf::from("ansible-vault"),
            password_file: password_file.into(),
        }
    }

    /// Use a different executable, e.g. a wrapper script.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }
}

impl VaultDecryptor for AnsibleVaultCommand {
    fn has_secrets(&self) -> bool {
        self.password_file.is_file()
    }

    fn decrypt(&self, payload: &str) -> Result<Vec<u8>> {
        let mut child = Command::new(&self.program)
            .arg("decrypt")
            .arg("--vault-password-file")
            .arg(&self.password_file)
            .args(["--output", "-", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Vault(format!("cannot run {}: {}", self.program.display(), e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(payload.as_bytes())
                .map_err(|e| Error::Vault(e.to_string()))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| Error::Vault(e.to_string()))?;
        if !output.status.success() {
            return Err(Error::Vault(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(output.stdout)
    }
}

/// Turn a configured `keepass_pass` into the plain password.
///
/// Single-line sources (INI, environment) carry vault payloads with literal
/// `\n` sequences, which are expanded before decryption.
pub fn reveal_password(raw: &str, vault: &dyn VaultDecryptor) -> Result<String> {
    if !vault.is_encrypted(raw) {
        return Ok(raw.to_string());
    }
    if !vault.has_secrets() {
        return Err(Error::VaultSecretMissing);
    }
    let payload = raw.replace("\\n", "\n");
    let plain = vault.decrypt(&payload)?;
    let plain = String::from_utf8(plain)
        .map_err(|_| Error::Vault("decrypted keepass_pass is not valid UTF-8".to_string()))?;
    Ok(plain.trim_end_matches(['\r', '\n']).to_string())
}
