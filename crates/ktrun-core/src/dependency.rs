//! Dependency resolution.
//!
//! Resolution itself is delegated to an external engine. This module turns
//! declared coordinates and repositories into one engine invocation and its
//! output into a classpath string. There is no retry and no fallback
//! repository; caching of downloaded artifacts is the engine's business.

use std::process::{Command, Stdio};

use crate::config::Config;
use crate::directives::{Coordinate, Repository};
use crate::error::{Error, Result};

/// Resolves coordinates into a classpath.
pub trait DependencyResolver {
    /// Return the classpath for `dependencies`, in the engine's order.
    fn resolve(&self, dependencies: &[Coordinate], repositories: &[Repository]) -> Result<String>;
}

/// Resolver that shells out to a coursier-compatible `fetch --classpath`.
pub struct CommandResolver {
    program: String,
}

impl CommandResolver {
    /// Resolver running `program`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Resolver for the configured program.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.resolver_program.clone())
    }

    /// Arguments passed to the engine.
    pub fn arguments(dependencies: &[Coordinate], repositories: &[Repository]) -> Vec<String> {
        let mut args = vec!["fetch".to_string(), "--classpath".to_string()];

        for repository in repositories {
            args.push("-r".to_string());
            args.push(repository.url.clone());
        }

        args.extend(dependencies.iter().map(engine_coordinate));
        args
    }
}

impl DependencyResolver for CommandResolver {
    fn resolve(&self, dependencies: &[Coordinate], repositories: &[Repository]) -> Result<String> {
        if dependencies.is_empty() {
            return Ok(String::new());
        }

        tracing::info!(
            "Resolving {} dependencies: {}",
            dependencies.len(),
            dependencies
                .iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let output = Command::new(&self.program)
            .args(Self::arguments(dependencies, repositories))
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                Error::DependencyResolution(format!("failed to run {}: {}", self.program, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::DependencyResolution(stderr.trim_end().to_string()));
        }

        let classpath = String::from_utf8_lossy(&output.stdout).trim().to_string();
        tracing::debug!("Resolved classpath: {}", classpath);
        Ok(classpath)
    }
}

/// Coordinate in the engine's syntax: `g:a:v[,classifier=c][,type=t]`.
fn engine_coordinate(coordinate: &Coordinate) -> String {
    let mut arg = format!(
        "{}:{}:{}",
        coordinate.group, coordinate.artifact, coordinate.version
    );
    if let Some(classifier) = &coordinate.classifier {
        arg.push_str(&format!(",classifier={}", classifier));
    }
    if let Some(packaging) = &coordinate.packaging {
        arg.push_str(&format!(",type={}", packaging));
    }
    arg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arguments() {
        let deps = vec![
            Coordinate::new("com.squareup.okio", "okio", "3.6.0"),
            "net.java.dev.jna:jna:5.13.0:jpms@jar".parse().unwrap(),
        ];
        let repos = vec![Repository::new("jitpack", "https://jitpack.io")];

        assert_eq!(
            CommandResolver::arguments(&deps, &repos),
            vec![
                "fetch",
                "--classpath",
                "-r",
                "https://jitpack.io",
                "com.squareup.okio:okio:3.6.0",
                "net.java.dev.jna:jna:5.13.0,classifier=jpms,type=jar",
            ]
        );
    }

    #[test]
    fn test_no_dependencies_skips_engine() {
        let resolver = CommandResolver::new("/nonexistent/resolver");
        assert_eq!(resolver.resolve(&[], &[]).unwrap(), "");
    }

    #[test]
    fn test_missing_engine_is_resolution_error() {
        let resolver = CommandResolver::new("/nonexistent/resolver");
        let err = resolver
            .resolve(&[Coordinate::new("a", "b", "1")], &[])
            .unwrap_err();
        assert!(matches!(err, Error::DependencyResolution(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_engine_failure_carries_stderr() {
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        let temp = TempDir::new().expect("Failed to create temp dir");
        let script = temp.path().join("resolver");
        std::fs::write(&script, "#!/bin/sh\necho 'not found: a:b:1' >&2\nexit 3\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let resolver = CommandResolver::new(script.display().to_string());
        let err = resolver
            .resolve(&[Coordinate::new("a", "b", "1")], &[])
            .unwrap_err();

        match err {
            Error::DependencyResolution(message) => assert_eq!(message, "not found: a:b:1"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_engine_output_is_classpath() {
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        let temp = TempDir::new().expect("Failed to create temp dir");
        let script = temp.path().join("resolver");
        std::fs::write(&script, "#!/bin/sh\necho '/m2/a.jar:/m2/b.jar'\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let resolver = CommandResolver::new(script.display().to_string());
        let classpath = resolver
            .resolve(&[Coordinate::new("a", "b", "1")], &[])
            .unwrap();
        assert_eq!(classpath, "/m2/a.jar:/m2/b.jar");
    }
}
