//! Process-wide configuration.
//!
//! All environment lookups happen once, in [`Config::from_env`]. The
//! resulting value is passed by reference into every pipeline component,
//! so nothing below this module reads the environment on its own.
//!
//! ```text
//! ~/.ktrun/
//! └── cache/      # Compiled jars and fetched URL includes (flat)
//! $TMPDIR/ktrun/  # stdin/literal scriptlets and preamble files
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Overrides the artifact cache directory.
pub const ENV_CACHE_DIR: &str = "KTRUN_CACHE_DIR";
/// Custom preamble text prepended to every top-level script.
pub const ENV_PREAMBLE: &str = "KTRUN_PREAMBLE";
/// Display name used in usage text and diagnostics.
pub const ENV_NAME: &str = "KTRUN_NAME";
/// Kotlin installation directory (containing `bin/kotlinc`).
pub const ENV_KOTLIN_HOME: &str = "KOTLIN_HOME";
/// Extra runtime options passed to the `kotlin` launcher.
pub const ENV_RUNTIME_OPTS: &str = "KTRUN_RUNTIME_OPTS";
/// Program used to resolve dependency coordinates.
pub const ENV_RESOLVER: &str = "KTRUN_RESOLVER";

const DEFAULT_RESOLVER: &str = "coursier";
const DEFAULT_NAME: &str = "ktrun";

/// Configuration for one ktrun process.
#[derive(Debug, Clone)]
pub struct Config {
    /// Flat directory holding compiled artifacts and fetched includes.
    pub cache_dir: PathBuf,

    /// Shared temporary directory for scriptlets and preamble files.
    pub temp_dir: PathBuf,

    /// Preamble prepended to top-level scripts, if any.
    pub custom_preamble: Option<String>,

    /// Name shown in usage text and diagnostics.
    pub display_name: String,

    /// Kotlin installation directory override.
    pub kotlin_home: Option<PathBuf>,

    /// Runtime option tokens appended to every launch.
    pub runtime_options: Vec<String>,

    /// Program used for dependency resolution.
    pub resolver_program: String,
}

impl Config {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Build the configuration from explicit key/value pairs.
    ///
    /// Empty values are treated as unset.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut config = Self::with_cache_dir(default_cache_dir());

        for (key, value) in vars {
            let value: String = value.into();
            if value.trim().is_empty() {
                continue;
            }

            match key.as_ref() {
                ENV_CACHE_DIR => config.cache_dir = PathBuf::from(value),
                ENV_PREAMBLE => config.custom_preamble = Some(value),
                ENV_NAME => config.display_name = value,
                ENV_KOTLIN_HOME => config.kotlin_home = Some(PathBuf::from(value)),
                ENV_RUNTIME_OPTS => {
                    config.runtime_options = value.split_whitespace().map(String::from).collect();
                }
                ENV_RESOLVER => config.resolver_program = value,
                _ => {}
            }
        }

        config
    }

    /// Configuration rooted at an explicit cache directory, everything else default.
    pub fn with_cache_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            temp_dir: std::env::temp_dir().join("ktrun"),
            custom_preamble: None,
            display_name: DEFAULT_NAME.to_string(),
            kotlin_home: None,
            runtime_options: Vec::new(),
            resolver_program: DEFAULT_RESOLVER.to_string(),
        }
    }

    /// Use a different temporary directory.
    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self
    }

    /// Create the cache and temp directories if they don't exist.
    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.cache_dir)?;
        fs::create_dir_all(&self.temp_dir)?;
        Ok(())
    }

    /// The cache directory.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}

/// `~/.ktrun/cache`, falling back to the temp dir when there is no home.
fn default_cache_dir() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(".ktrun").join("cache"),
        None => std::env::temp_dir().join("ktrun").join("cache"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_from_vars_overrides() {
        let config = Config::from_vars([
            (ENV_CACHE_DIR, "/tmp/kc"),
            (ENV_PREAMBLE, "val x = 1"),
            (ENV_NAME, "kt"),
            (ENV_KOTLIN_HOME, "/opt/kotlin"),
            (ENV_RUNTIME_OPTS, "-J-Xmx2g  -J-ea"),
            (ENV_RESOLVER, "/usr/local/bin/cs"),
            ("UNRELATED", "ignored"),
        ]);

        assert_eq!(config.cache_dir, PathBuf::from("/tmp/kc"));
        assert_eq!(config.custom_preamble.as_deref(), Some("val x = 1"));
        assert_eq!(config.display_name, "kt");
        assert_eq!(config.kotlin_home, Some(PathBuf::from("/opt/kotlin")));
        assert_eq!(config.runtime_options, vec!["-J-Xmx2g", "-J-ea"]);
        assert_eq!(config.resolver_program, "/usr/local/bin/cs");
    }

    #[test]
    fn test_empty_values_are_unset() {
        let config = Config::from_vars([(ENV_PREAMBLE, "  "), (ENV_NAME, "")]);
        assert!(config.custom_preamble.is_none());
        assert_eq!(config.display_name, "ktrun");
        assert_eq!(config.resolver_program, "coursier");
    }

    #[test]
    fn test_ensure_dirs() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let config = Config::with_cache_dir(temp.path().join("cache"))
            .with_temp_dir(temp.path().join("tmp"));

        config.ensure_dirs().expect("Failed to create dirs");
        assert!(config.cache_dir().is_dir());
        assert!(config.temp_dir.is_dir());
    }
}
