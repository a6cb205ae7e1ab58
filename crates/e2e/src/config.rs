//! QA environment configuration
//!
//! Credentials and the base URL come from the process environment, falling
//! back to a `.env` file (or `.env.<name>` when a named environment is
//! selected). Process variables always win over file values.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{E2eError, E2eResult};

pub const BASE_URL_VAR: &str = "ALIQUOT_BASE_URL";
pub const USERNAME_VAR: &str = "ALIQUOT_USERNAME";
pub const PASSWORD_VAR: &str = "ALIQUOT_PASSWORD";

/// Variables that must resolve before any browser work starts
pub const REQUIRED_VARS: [&str; 3] = [BASE_URL_VAR, USERNAME_VAR, PASSWORD_VAR];

/// Resolved configuration for the QA target
#[derive(Clone)]
pub struct EnvConfig {
    /// Base URL without a trailing slash
    pub base_url: String,

    pub username: String,

    pub password: String,

    /// Named environment (`--env=staging` reads `.env.staging`)
    pub env_name: Option<String>,
}

impl fmt::Debug for EnvConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"***")
            .field("env_name", &self.env_name)
            .finish()
    }
}

/// Path of the environment file for an optional named environment
pub fn env_file_path(root: &Path, env_name: Option<&str>) -> PathBuf {
    match env_name {
        Some(name) => root.join(format!(".env.{}", name)),
        None => root.join(".env"),
    }
}

impl EnvConfig {
    /// Load configuration from the process environment and the env file under `root`
    pub fn load(root: &Path, env_name: Option<&str>) -> E2eResult<Self> {
        Self::load_with(root, env_name, |key| std::env::var(key).ok())
    }

    /// Load configuration with an explicit variable lookup in place of the process environment
    pub fn load_with<F>(root: &Path, env_name: Option<&str>, lookup: F) -> E2eResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = env_file_path(root, env_name);
        let file_present = path.is_file();
        let file_vars = if file_present {
            read_env_file(&path)?
        } else {
            HashMap::new()
        };

        let resolve = |key: &str| -> Option<String> {
            lookup(key)
                .or_else(|| file_vars.get(key).cloned())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let missing: Vec<String> = REQUIRED_VARS
            .iter()
            .filter(|key| resolve(**key).is_none())
            .map(|key| key.to_string())
            .collect();

        if !missing.is_empty() {
            if !file_present {
                return Err(E2eError::EnvFileMissing(path.display().to_string()));
            }
            return Err(E2eError::MissingEnv(missing));
        }

        // All three resolved above
        let base_url = normalize_base_url(&resolve(BASE_URL_VAR).unwrap_or_default())?;
        let username = resolve(USERNAME_VAR).unwrap_or_default();
        let password = resolve(PASSWORD_VAR).unwrap_or_default();

        Ok(Self {
            base_url,
            username,
            password,
            env_name: env_name.map(String::from),
        })
    }

    /// Absolute URL for an application path
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

/// Validate the environment before any page navigation
pub fn validate_environment(root: &Path, env_name: Option<&str>) -> E2eResult<EnvConfig> {
    let config = EnvConfig::load(root, env_name)?;
    info!(
        "Environment OK: {} as {}{}",
        config.base_url,
        config.username,
        config
            .env_name
            .as_deref()
            .map(|n| format!(" (env: {})", n))
            .unwrap_or_default()
    );
    Ok(config)
}

fn read_env_file(path: &Path) -> E2eResult<HashMap<String, String>> {
    debug!("Reading environment file {}", path.display());
    let mut vars = HashMap::new();
    for item in dotenvy::from_path_iter(path)? {
        let (key, value) = item?;
        vars.insert(key, value);
    }
    Ok(vars)
}

fn normalize_base_url(raw: &str) -> E2eResult<String> {
    if !(raw.starts_with("http://") || raw.starts_with("https://")) {
        return Err(E2eError::Config(format!(
            "{} must start with http:// or https://, got '{}'",
            BASE_URL_VAR, raw
        )));
    }
    Ok(raw.trim_end_matches('/').to_string())
}
