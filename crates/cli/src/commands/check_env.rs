//! `aliquot check-env`

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::Path;

use aliquot_e2e::config::env_file_path;
use aliquot_e2e::preflight::{check_reachable, ProbeConfig};
use aliquot_e2e::{validate_environment, EnvConfig};

use crate::output::{print_error, print_item, print_success, OutputFormat, TableDisplay};

#[derive(Args, Debug, Default)]
pub struct CheckEnvArgs {
    /// Load `.env.<NAME>` instead of `.env`
    #[arg(long, value_name = "NAME")]
    pub env: Option<String>,

    /// Skip the reachability probe
    #[arg(long)]
    pub no_probe: bool,
}

/// Resolved environment for display; the password is never shown
#[derive(Serialize, Debug)]
pub struct EnvRow {
    pub env_file: String,
    pub base_url: String,
    pub username: String,
    pub password: &'static str,
}

impl EnvRow {
    fn new(config: &EnvConfig, root: &Path) -> Self {
        Self {
            env_file: env_file_path(root, config.env_name.as_deref()).display().to_string(),
            base_url: config.base_url.clone(),
            username: config.username.clone(),
            password: "***",
        }
    }
}

impl TableDisplay for EnvRow {
    fn headers() -> Vec<&'static str> {
        vec!["Env File", "Base URL", "Username", "Password"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.env_file.clone(),
            self.base_url.clone(),
            self.username.clone(),
            self.password.to_string(),
        ]
    }
}

pub async fn execute(args: CheckEnvArgs, root: &Path, format: OutputFormat) -> Result<i32> {
    let config = match validate_environment(root, args.env.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            print_error(&e.to_string());
            return Ok(1);
        }
    };
    print_item(&EnvRow::new(&config, root), format);

    if args.no_probe {
        return Ok(0);
    }

    match check_reachable(&config.base_url, &ProbeConfig::default()).await {
        Ok(status) => {
            print_success(&format!("{} answered HTTP {}", config.base_url, status));
            Ok(0)
        }
        Err(e) => {
            print_error(&e.to_string());
            Ok(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_env_file_exits_one() {
        let dir = tempfile::tempdir().unwrap();
        let args = CheckEnvArgs {
            env: Some("nowhere".into()),
            no_probe: true,
        };
        assert_eq!(execute(args, dir.path(), OutputFormat::Plain).await.unwrap(), 1);
    }

    #[test]
    fn test_row_redacts_password() {
        let config = EnvConfig {
            base_url: "https://qa.aliquot.test".into(),
            username: "qa".into(),
            password: "hunter2".into(),
            env_name: Some("staging".into()),
        };
        let row = EnvRow::new(&config, Path::new("/srv"));
        assert!(row.env_file.ends_with(".env.staging"));
        assert!(!row.row().iter().any(|c| c.contains("hunter2")));
    }
}
