//! Plugin option schemas and layered option lookup.
//!
//! Values are taken from the plugin's own YAML file first, then from
//! environment variables, then from the `[keepass]` section of
//! `ansible.cfg`, and finally from the declared default.

use crate::error::{Error, Result};
use crate::resolver::DEFAULT_TITLE_MASK;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// Declaration of one plugin option.
#[derive(Debug, Clone)]
pub struct OptionSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
    pub default: Option<&'static str>,
    /// `(section, key)` pairs in `ansible.cfg`.
    pub ini: Vec<(&'static str, &'static str)>,
    /// Environment variable aliases, first set one wins.
    pub env: Vec<&'static str>,
    /// Accepted values; empty means any.
    pub choices: Vec<&'static str>,
}

impl OptionSpec {
    /// Create a new required string option
    pub fn required(name: &'static str, description: &'static str) -> Self {
        Self {
            required: true,
            ..Self::optional(name, description)
        }
    }

    /// Create a new optional string option
    pub fn optional(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            required: false,
            default: None,
            ini: Vec::new(),
            env: Vec::new(),
            choices: Vec::new(),
        }
    }

    pub fn default_value(mut self, value: &'static str) -> Self {
        self.default = Some(value);
        self
    }

    pub fn ini(mut self, section: &'static str, key: &'static str) -> Self {
        self.ini.push((section, key));
        self
    }

    pub fn env(mut self, name: &'static str) -> Self {
        self.env.push(name);
        self
    }

    pub fn choices(mut self, choices: &[&'static str]) -> Self {
        self.choices.extend_from_slice(choices);
        self
    }
}

/// Options of the inventory plugin, read from its YAML source file.
pub fn inventory_options() -> Vec<OptionSpec> {
    vec![
        OptionSpec::required("plugin", "Token that ensures this is a source file for the plugin.")
            .choices(&["keepass_inventory", "snakems.ansible.keepass_inventory"]),
        OptionSpec::required("keepass_database", "Path to KeePass database"),
        OptionSpec::optional("keepass_key", "Path to key-file. Set if needed"),
        OptionSpec::optional(
            "keepass_pass",
            "Password for KeePass database. Plain or encrypted by ansible-vault. If not set, it will be prompted",
        ),
        OptionSpec::required("keepass_root", "Group from which to take hosts"),
    ]
}

/// Options of the vars plugin.
pub fn vars_options() -> Vec<OptionSpec> {
    vec![
        OptionSpec::required("keepass_database", "Path to KeePass database")
            .ini("keepass", "database")
            .env("ANSIBLE_KEEPASS_DATABASE"),
        OptionSpec::optional("keepass_key", "Path to key-file. Set if needed")
            .ini("keepass", "key")
            .env("ANSIBLE_KEEPASS_KEY"),
        OptionSpec::optional(
            "keepass_pass",
            "Password for KeePass database. Plain or encrypted by ansible-vault. If not set, it will be prompted",
        )
        .ini("keepass", "password")
        .env("ANSIBLE_KEEPASS_PASSWORD")
        .env("ANSIBLE_KEEPASS_PASS"),
        OptionSpec::optional(
            "keepass_title_mask",
            "If entry not found by hostname, try search by mask. Macros: {{ hostname }}",
        )
        .default_value(DEFAULT_TITLE_MASK)
        .ini("keepass", "title_mask")
        .ini("keepass", "filter_title")
        .env("ANSIBLE_KEEPASS_TITLE_MASK")
        .env("ANSIBLE_FILTER_TITLE"),
    ]
}

type EnvLookup = Box<dyn Fn(&str) -> Option<String>>;

/// Where option values come from.
pub struct OptionSources {
    inline: serde_yaml::Mapping,
    ini: Option<config::Config>,
    env: EnvLookup,
}

impl Default for OptionSources {
    fn default() -> Self {
        Self::new()
    }
}

impl OptionSources {
    /// Sources backed by the process environment only.
    pub fn new() -> Self {
        Self {
            inline: serde_yaml::Mapping::new(),
            ini: None,
            env: Box::new(|name: &str| std::env::var(name).ok()),
        }
    }

    pub fn with_inline(mut self, inline: serde_yaml::Mapping) -> Self {
        self.inline = inline;
        self
    }

    pub fn with_ini(mut self, ini: config::Config) -> Self {
        self.ini = Some(ini);
        self
    }

    pub fn with_env(mut self, env: impl Fn(&str) -> Option<String> + 'static) -> Self {
        self.env = Box::new(env);
        self
    }

    /// Ignore the environment entirely.
    pub fn without_env(self) -> Self {
        self.with_env(|_| None)
    }

    fn inline_value(&self, name: &str) -> Option<String> {
        self.inline.get(name).and_then(yaml_to_string)
    }

    fn env_value(&self, spec: &OptionSpec) -> Option<String> {
        spec.env
            .iter()
            .find_map(|var| (self.env)(var).filter(|value| !value.is_empty()))
    }

    fn ini_value(&self, spec: &OptionSpec) -> Option<String> {
        let ini = self.ini.as_ref()?;
        spec.ini
            .iter()
            .find_map(|(section, key)| ini.get_string(&format!("{}.{}", section, key)).ok())
    }

    /// Resolve every option of `schema`.
    pub fn resolve(&self, schema: &[OptionSpec]) -> Result<ResolvedOptions> {
        let mut values = IndexMap::new();
        for spec in schema {
            let value = self
                .inline_value(spec.name)
                .or_else(|| self.env_value(spec))
                .or_else(|| self.ini_value(spec))
                .or_else(|| spec.default.map(str::to_string));

            match value {
                Some(value) => {
                    if !spec.choices.is_empty() && !spec.choices.iter().any(|choice| *choice == value) {
                        return Err(Error::Configuration(format!(
                            "'{}' must be one of {:?}, got '{}'",
                            spec.name, spec.choices, value
                        )));
                    }
                    values.insert(spec.name.to_string(), value);
                }
                None if spec.required => {
                    return Err(Error::Configuration(format!(
                        "'{}' must be set in config",
                        spec.name
                    )));
                }
                None => {}
            }
        }
        Ok(ResolvedOptions { values })
    }
}

/// Scalar YAML values as text. `!vault` tagged values yield their payload.
fn yaml_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Tagged(tagged) => yaml_to_string(&tagged.value),
        _ => None,
    }
}

/// Final option values.
#[derive(Debug, Clone, Default)]
pub struct ResolvedOptions {
    values: IndexMap<String, String>,
}

impl ResolvedOptions {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn get_path(&self, name: &str) -> Option<PathBuf> {
        self.get(name).map(PathBuf::from)
    }

    pub fn require(&self, name: &str) -> Result<&str> {
        self.get(name)
            .ok_or_else(|| Error::Configuration(format!("'{}' must be set in config", name)))
    }
}

/// Read a plugin YAML source file.
pub fn load_plugin_config(path: &Path) -> Result<serde_yaml::Mapping> {
    let plugin_config_error = |message: String| Error::PluginConfig {
        path: path.to_path_buf(),
        message,
    };
    let contents = std::fs::read_to_string(path).map_err(|e| plugin_config_error(e.to_string()))?;
    match serde_yaml::from_str::<serde_yaml::Value>(&contents)
        .map_err(|e| plugin_config_error(e.to_string()))?
    {
        serde_yaml::Value::Mapping(mapping) => Ok(mapping),
        serde_yaml::Value::Null => Ok(serde_yaml::Mapping::new()),
        _ => Err(plugin_config_error("expected a mapping".to_string())),
    }
}

/// Read an INI file such as `ansible.cfg`.
pub fn load_ini(path: &Path) -> Result<config::Config> {
    config::Config::builder()
        .add_source(config::File::from(path).format(config::FileFormat::Ini))
        .build()
        .map_err(|e| Error::Configuration(format!("Failed to read {}: {}", path.display(), e)))
}

/// Locate `ansible.cfg` the way Ansible does.
pub fn find_ansible_cfg() -> Option<PathBuf> {
    let mut candidates = Vec::new();
    if let Ok(explicit) = std::env::var("ANSIBLE_CONFIG") {
        candidates.push(PathBuf::from(explicit));
    }
    candidates.push(PathBuf::from("ansible.cfg"));
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".ansible.cfg"));
    }
    candidates.push(PathBuf::from("/etc/ansible/ansible.cfg"));
    candidates.into_iter().find(|path| path.is_file())
}
