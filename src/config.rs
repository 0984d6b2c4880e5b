//! Service configuration, read once from the environment at startup

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{HookError, Result};
use crate::sidebar::SidebarOptions;

pub const DEFAULT_PORT: u16 = 6159;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_DOCS_DIR: &str = "/docs";
pub const DEFAULT_GIT_REMOTE: &str = "origin";
pub const DEFAULT_GIT_BRANCH: &str = "main";
pub const DEFAULT_GIT_BIN: &str = "git";
pub const DEFAULT_UPDATE_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_LOCK_WAIT_SECS: u64 = 60;

/// How the sidebar is rebuilt after a pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegenerateWith {
    /// Run the in-process generator over the docs directory.
    Builtin,
    /// Run an external program (already split into program + args) in the docs directory.
    Command(Vec<String>),
}

#[derive(Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub secret: String,
    pub docs_dir: PathBuf,
    pub git_remote: String,
    pub git_branch: String,
    pub git_bin: String,
    pub regenerate: RegenerateWith,
    pub sidebar_config: Option<PathBuf>,
    pub update_timeout: Duration,
    pub lock_wait: Duration,
    pub log_dir: Option<PathBuf>,
}

impl ServiceConfig {
    /// Reads the configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let secret = get("WEBHOOK_SECRET").ok_or_else(|| {
            HookError::ConfigError("WEBHOOK_SECRET must be set to a non-empty value".to_string())
        })?;

        let regenerate = match get("SIDEBAR_COMMAND") {
            Some(command) => {
                RegenerateWith::Command(command.split_whitespace().map(String::from).collect())
            }
            None => RegenerateWith::Builtin,
        };

        Ok(Self {
            host: get("WEBHOOK_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_or("WEBHOOK_PORT", get("WEBHOOK_PORT"), DEFAULT_PORT)?,
            secret,
            docs_dir: PathBuf::from(
                get("DOCS_DIR").unwrap_or_else(|| DEFAULT_DOCS_DIR.to_string()),
            ),
            git_remote: get("GIT_REMOTE").unwrap_or_else(|| DEFAULT_GIT_REMOTE.to_string()),
            git_branch: get("GIT_BRANCH").unwrap_or_else(|| DEFAULT_GIT_BRANCH.to_string()),
            git_bin: get("GIT_BIN").unwrap_or_else(|| DEFAULT_GIT_BIN.to_string()),
            regenerate,
            sidebar_config: get("SIDEBAR_CONFIG").map(PathBuf::from),
            update_timeout: parse_secs(
                "UPDATE_TIMEOUT_SECS",
                get("UPDATE_TIMEOUT_SECS"),
                DEFAULT_UPDATE_TIMEOUT_SECS,
            )?,
            lock_wait: parse_secs(
                "UPDATE_LOCK_WAIT_SECS",
                get("UPDATE_LOCK_WAIT_SECS"),
                DEFAULT_LOCK_WAIT_SECS,
            )?,
            log_dir: get("LOG_DIR").map(PathBuf::from),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Sidebar options from `SIDEBAR_CONFIG`, or the defaults when unset.
    pub fn sidebar_options(&self) -> Result<SidebarOptions> {
        match &self.sidebar_config {
            Some(path) => load_sidebar_options(path),
            None => Ok(SidebarOptions::default()),
        }
    }
}

// Keeps the secret out of logs and error output.
impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secret", &"<redacted>")
            .field("docs_dir", &self.docs_dir)
            .field("git_remote", &self.git_remote)
            .field("git_branch", &self.git_branch)
            .field("git_bin", &self.git_bin)
            .field("regenerate", &self.regenerate)
            .field("sidebar_config", &self.sidebar_config)
            .field("update_timeout", &self.update_timeout)
            .field("lock_wait", &self.lock_wait)
            .field("log_dir", &self.log_dir)
            .finish()
    }
}

fn parse_or<T: FromStr>(key: &str, value: Option<String>, default: T) -> Result<T> {
    match value {
        Some(raw) => raw.trim().parse().map_err(|_| {
            HookError::ConfigError(format!("{} has an invalid value '{}'", key, raw))
        }),
        None => Ok(default),
    }
}

/// Whole seconds, at least one.
fn parse_secs(key: &str, value: Option<String>, default: u64) -> Result<Duration> {
    match parse_or(key, value, default)? {
        0 => Err(HookError::ConfigError(format!("{} must be at least 1 second", key))),
        secs => Ok(Duration::from_secs(secs)),
    }
}

/// Load and parse a sidebar options file
pub fn load_sidebar_options(path: &Path) -> Result<SidebarOptions> {
    let raw = fs::read_to_string(path).map_err(|e| {
        HookError::ConfigError(format!(
            "Failed to read sidebar config '{}': {}",
            path.display(),
            e
        ))
    })?;

    let options: SidebarOptions = toml::from_str(&raw).map_err(|e| {
        HookError::ConfigError(format!(
            "Failed to parse sidebar config '{}': {}",
            path.display(),
            e
        ))
    })?;
    options.validate()?;
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::from_lookup(lookup(&[("WEBHOOK_SECRET", "s3cret")])).unwrap();
        assert_eq!(config.port, 6159);
        assert_eq!(config.docs_dir, PathBuf::from("/docs"));
        assert_eq!(config.git_remote, "origin");
        assert_eq!(config.git_branch, "main");
        assert_eq!(config.git_bin, "git");
        assert_eq!(config.regenerate, RegenerateWith::Builtin);
        assert_eq!(config.update_timeout, Duration::from_secs(300));
        assert_eq!(config.lock_wait, Duration::from_secs(60));
        assert_eq!(config.bind_address(), "0.0.0.0:6159");
    }

    #[test]
    fn test_missing_or_empty_secret_is_fatal() {
        assert!(matches!(
            ServiceConfig::from_lookup(lookup(&[])),
            Err(HookError::ConfigError(_))
        ));
        assert!(matches!(
            ServiceConfig::from_lookup(lookup(&[("WEBHOOK_SECRET", "  ")])),
            Err(HookError::ConfigError(_))
        ));
    }

    #[test]
    fn test_overrides() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("WEBHOOK_SECRET", "s3cret"),
            ("WEBHOOK_PORT", "8080"),
            ("DOCS_DIR", "/srv/docs"),
            ("GIT_REMOTE", "upstream"),
            ("GIT_BRANCH", "docs"),
            ("SIDEBAR_COMMAND", "node generate-sidebar.js"),
            ("UPDATE_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.docs_dir, PathBuf::from("/srv/docs"));
        assert_eq!(config.git_remote, "upstream");
        assert_eq!(config.git_branch, "docs");
        assert_eq!(
            config.regenerate,
            RegenerateWith::Command(vec!["node".to_string(), "generate-sidebar.js".to_string()])
        );
        assert_eq!(config.update_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_port_rejected() {
        let result = ServiceConfig::from_lookup(lookup(&[
            ("WEBHOOK_SECRET", "s3cret"),
            ("WEBHOOK_PORT", "not-a-port"),
        ]));
        assert!(matches!(result, Err(HookError::ConfigError(msg)) if msg.contains("WEBHOOK_PORT")));
    }

    #[test]
    fn test_zero_durations_rejected() {
        for key in ["UPDATE_TIMEOUT_SECS", "UPDATE_LOCK_WAIT_SECS"] {
            let result =
                ServiceConfig::from_lookup(lookup(&[("WEBHOOK_SECRET", "s3cret"), (key, "0")]));
            assert!(matches!(result, Err(HookError::ConfigError(msg)) if msg.contains(key)));
        }
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config =
            ServiceConfig::from_lookup(lookup(&[("WEBHOOK_SECRET", "hunter2hunter2")])).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hunter2hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
