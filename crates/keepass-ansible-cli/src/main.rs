//! keepass-ansible - Ansible inventory and host variables from KeePass
//!
//! Speaks the dynamic inventory script protocol (`--list` / `--host`) and
//! resolves single hosts the way the vars plugin does.

mod handlers;
mod prompt;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Ansible inventory and host variables from a KeePass database
#[derive(Parser, Debug)]
#[command(name = "keepass-ansible", version, about)]
struct Args {
    /// File holding the vault password, used to decrypt a vaulted keepass_pass
    #[arg(long, global = true, env = "ANSIBLE_VAULT_PASSWORD_FILE", value_name = "FILE")]
    vault_password_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the inventory described by a keepass_inventory source file
    Inventory {
        /// Plugin source file (*keepass.yml, *keepass_hosts.yml)
        config: PathBuf,

        /// Print the whole inventory (default)
        #[arg(long, conflicts_with = "host")]
        list: bool,

        /// Print the variables of one host
        #[arg(long, value_name = "HOST")]
        host: Option<String>,
    },
    /// Resolve the variables of one host through the vars plugin
    Vars {
        /// Inventory host name
        host: String,

        /// Variables the host already has, e.g. ansible_host=10.0.0.5
        #[arg(long = "var", value_name = "KEY=VALUE", value_parser = handlers::parse_var)]
        vars: Vec<(String, serde_json::Value)>,

        /// INI file with a [keepass] section (defaults to Ansible's lookup)
        #[arg(long, value_name = "FILE")]
        ini: Option<PathBuf>,
    },
    /// Check whether the inventory plugin accepts a source file
    Verify {
        path: PathBuf,
    },
}

fn main() -> Result<ExitCode> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("keepass_ansible_core=info".parse()?),
        )
        .with_writer(std::io::stderr) // stdout carries the JSON output
        .init();

    let args = Args::parse();
    let vault = handlers::vault(args.vault_password_file);

    match args.command {
        Command::Inventory { config, host, .. } => {
            handlers::inventory(&config, host.as_deref(), vault)?;
        }
        Command::Vars { host, vars, ini } => {
            handlers::vars(host, vars, ini, vault)?;
        }
        Command::Verify { path } => {
            if !handlers::verify(&path) {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
