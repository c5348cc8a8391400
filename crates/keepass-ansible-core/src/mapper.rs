//! Turns a credential entry into connection variables.

use crate::models::{Entry, HostVars};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use url::{Host, Url};

/// Connection type assumed for URLs without a scheme.
pub const DEFAULT_SCHEME: &str = "ssh";

static HAS_SCHEME: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^.*?://").expect("valid regex"));

/// Authority with an explicit `:port`, optionally after userinfo or an IPv6 literal.
static EXPLICIT_PORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^:/?#]*://(?:[^/?#@]*@)?(?:\[[^\]]*\]|[^:/?#\[]*):[0-9]+(?:[/?#]|$)")
        .expect("valid regex")
});

/// Entry path as a `/`-joined string; unnamed segments become empty strings.
pub fn entry_path(entry: &Entry) -> String {
    entry
        .path
        .iter()
        .map(|segment| segment.as_deref().unwrap_or(""))
        .collect::<Vec<_>>()
        .join("/")
}

/// Connection parameters decoded from an entry URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub scheme: String,
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Parse an entry URL, defaulting to `ssh://` when no scheme is present.
pub fn parse_endpoint(raw: &str) -> Result<Endpoint, url::ParseError> {
    let normalized = if HAS_SCHEME.is_match(raw) {
        raw.to_string()
    } else {
        format!("{}://{}", DEFAULT_SCHEME, raw)
    };
    let url = Url::parse(&normalized)?;

    let host = match url.host() {
        Some(Host::Domain(domain)) if domain.is_empty() => None,
        Some(Host::Domain(domain)) => Some(domain.to_lowercase()),
        Some(Host::Ipv4(addr)) => Some(addr.to_string()),
        Some(Host::Ipv6(addr)) => Some(addr.to_string()),
        None => None,
    };

    // `url` hides the scheme's default port even when it was written out.
    let port = if EXPLICIT_PORT.is_match(&normalized) {
        url.port_or_known_default()
    } else {
        url.port()
    };

    Ok(Endpoint {
        scheme: url.scheme().to_string(),
        host,
        port,
    })
}

/// Map an entry onto host variables.
///
/// Custom properties are applied last and override the well-known keys. An
/// unparseable URL leaves out the connection keys and is logged.
pub fn to_variables(entry: &Entry) -> HostVars {
    let mut vars = HostVars::new();
    vars.insert("keepass_entry_path".into(), Value::String(entry_path(entry)));
    vars.insert("ansible_user".into(), Value::String(entry.username.clone()));
    vars.insert("ansible_password".into(), Value::String(entry.password.clone()));

    match parse_endpoint(&entry.url) {
        Ok(endpoint) => {
            vars.insert("ansible_connection".into(), Value::String(endpoint.scheme));
            if let Some(host) = endpoint.host {
                vars.insert("ansible_host".into(), Value::String(host));
            }
            if let Some(port) = endpoint.port {
                vars.insert("ansible_port".into(), Value::from(port));
            }
        }
        Err(err) => {
            tracing::warn!(
                "Entry '{}' has an unusable URL {:?}: {}",
                entry_path(entry),
                entry.url,
                err
            );
        }
    }

    for (key, value) in &entry.custom_properties {
        vars.insert(key.clone(), Value::String(value.clone()));
    }
    vars
}
