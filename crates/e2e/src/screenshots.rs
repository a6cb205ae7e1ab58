//! Screenshot storage
//!
//! Screenshots land in a single directory with either step-named
//! (`<test>-<name>.png`) or timestamped (`<prefix>-YYYYMMDD-HHMMSS-mmm.png`)
//! file names.

use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::browser::{BrowserPage, ScreenshotOptions};
use crate::error::E2eResult;

#[derive(Debug, Clone)]
pub struct ScreenshotStore {
    dir: PathBuf,
}

impl ScreenshotStore {
    /// Create the store, creating the directory if needed
    pub fn new(dir: impl Into<PathBuf>) -> E2eResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Remove screenshots left by a previous run
    pub fn reset(&self) -> E2eResult<()> {
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "png").unwrap_or(false) {
                std::fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    pub fn step_path(&self, test: &str, name: &str) -> PathBuf {
        self.dir
            .join(format!("{}-{}.png", sanitize(test), sanitize(name)))
    }

    pub fn timestamped_path(&self, prefix: &str) -> PathBuf {
        let stamp = Local::now().format("%Y%m%d-%H%M%S-%3f");
        self.dir.join(format!("{}-{}.png", sanitize(prefix), stamp))
    }

    /// Capture into `path`
    pub async fn capture(
        &self,
        page: &dyn BrowserPage,
        path: PathBuf,
        options: &ScreenshotOptions,
    ) -> E2eResult<PathBuf> {
        page.screenshot(&path, options).await?;
        debug!("Screenshot saved: {}", path.display());
        Ok(path)
    }

    /// Best-effort full-page capture for diagnosing a failure
    pub async fn capture_debug(&self, page: &dyn BrowserPage, label: &str) -> Option<PathBuf> {
        let path = self.timestamped_path(&format!("debug-{}", label));
        let options = ScreenshotOptions {
            selector: None,
            full_page: true,
        };
        match self.capture(page, path, &options).await {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Could not capture debug screenshot for '{}': {}", label, e);
                None
            }
        }
    }
}

/// Reduce a name to `[a-z0-9_-]`, collapsing runs of other characters into `-`
pub fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    let trimmed = out.trim_matches('-');
    if trimmed.is_empty() {
        "screenshot".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("Customer Search", "customer-search")]
    #[test_case("site_management/tabs", "site_management-tabs")]
    #[test_case("  --Report: Q3 (draft)--  ", "report-q3-draft")]
    #[test_case("***", "screenshot")]
    fn test_sanitize(input: &str, expected: &str) {
        assert_eq!(sanitize(input), expected);
    }

    #[test]
    fn test_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScreenshotStore::new(dir.path().join("shots")).unwrap();
        assert!(store.dir().is_dir());

        let step = store.step_path("Inventory filter", "after search");
        assert_eq!(step.file_name().unwrap(), "inventory-filter-after-search.png");

        let stamped = store.timestamped_path("debug login");
        let file = stamped.file_name().unwrap().to_string_lossy().to_string();
        assert!(file.starts_with("debug-login-"));
        assert!(file.ends_with(".png"));
    }

    #[test]
    fn test_reset_only_removes_png_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScreenshotStore::new(dir.path()).unwrap();
        std::fs::write(dir.path().join("old.png"), b"png").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"keep").unwrap();

        store.reset().unwrap();
        assert!(!dir.path().join("old.png").exists());
        assert!(dir.path().join("notes.txt").exists());
    }
}
