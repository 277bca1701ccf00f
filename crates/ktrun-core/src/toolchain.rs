//! Kotlin compiler toolchain.
//!
//! The build pipeline only talks to the [`Toolchain`] trait: hand it one
//! expanded compilation unit, get back a jar at the requested path and the
//! class the launcher has to invoke. [`KotlincToolchain`] is the real
//! implementation on top of `kotlinc`.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::config::Config;
use crate::entry;
use crate::error::{Error, Result};
use crate::resource::SourceKind;

/// Everything needed to compile one expanded unit.
#[derive(Debug, Clone)]
pub struct CompileRequest<'a> {
    /// Expanded source text.
    pub source: &'a str,
    pub kind: SourceKind,
    /// Base name of the root resource; determines class names.
    pub base_name: &'a str,
    pub package: Option<&'a str>,
    /// Explicit entry point (class-style sources only).
    pub entry_point: Option<&'a str>,
    /// Joined compile classpath.
    pub classpath: String,
    pub compiler_options: Vec<String>,
    /// Where the jar must be written.
    pub output: PathBuf,
}

/// Result of a successful compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledUnit {
    /// Fully qualified class the launcher invokes.
    pub entry_symbol: String,
}

/// A compiler collaborator.
pub trait Toolchain {
    /// Compile `request.source` into a jar at `request.output`.
    fn compile(&self, request: &CompileRequest<'_>) -> Result<CompiledUnit>;

    /// Invocable class of the unit described by `request`.
    ///
    /// Used on cache hits, where nothing is compiled.
    fn entry_symbol(&self, request: &CompileRequest<'_>) -> String {
        entry::entry_symbol(
            request.kind,
            request.base_name,
            request.package,
            request.entry_point,
        )
    }
}

/// `kotlinc`-backed toolchain.
#[derive(Debug, Clone)]
pub struct KotlincToolchain {
    /// Path to `kotlinc`.
    kotlinc: PathBuf,

    /// Path to the `kotlin` launcher.
    launcher: PathBuf,
}

impl KotlincToolchain {
    /// Locate the toolchain in `KOTLIN_HOME/bin`, falling back to `PATH`.
    pub fn locate(config: &Config) -> Result<Self> {
        let kotlinc = Self::find_tool(config, "kotlinc")?;
        let launcher = Self::find_tool(config, "kotlin")?;

        tracing::debug!("Using kotlinc at {}", kotlinc.display());

        Ok(Self { kotlinc, launcher })
    }

    /// Path to `kotlinc`; without arguments it starts the interactive shell.
    pub fn kotlinc(&self) -> &Path {
        &self.kotlinc
    }

    /// Path to the `kotlin` launcher.
    pub fn launcher(&self) -> &Path {
        &self.launcher
    }

    fn find_tool(config: &Config, name: &str) -> Result<PathBuf> {
        if let Some(home) = &config.kotlin_home {
            let candidate = home.join("bin").join(name);
            if candidate.is_file() {
                return Ok(candidate);
            }
            tracing::warn!(
                "{} not found under {}, falling back to PATH",
                name,
                home.display()
            );
        }

        which::which(name).map_err(|_| {
            Error::Configuration(format!(
                "{} not found in KOTLIN_HOME or on PATH",
                name
            ))
        })
    }
}

impl Toolchain for KotlincToolchain {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<CompiledUnit> {
        let work = tempfile::Builder::new().prefix("ktrun-compile-").tempdir()?;

        let class_name = entry::normalize_name(request.base_name);
        let source_file = work
            .path()
            .join(format!("{}.{}", class_name, request.kind.extension()));
        fs::write(&source_file, request.source)?;

        let mut sources = vec![source_file];
        if request.kind == SourceKind::Script {
            let wrapper = work
                .path()
                .join(format!("{}.kt", entry::wrapper_class_name(request.base_name)));
            fs::write(&wrapper, entry::wrapper_source(request.base_name, request.package))?;
            sources.push(wrapper);
        }

        let mut cmd = Command::new(&self.kotlinc);
        if !request.classpath.is_empty() {
            cmd.arg("-classpath").arg(&request.classpath);
        }
        cmd.args(&request.compiler_options)
            .arg("-d")
            .arg(&request.output)
            .args(&sources)
            .stdin(Stdio::null());

        tracing::info!("Compiling {}", request.base_name);
        tracing::debug!("Running {:?}", cmd);

        let output = cmd.output().map_err(|e| Error::Compilation {
            script: request.base_name.to_string(),
            message: format!("failed to run {}: {}", self.kotlinc.display(), e),
        })?;

        if !output.status.success() {
            return Err(Error::Compilation {
                script: request.base_name.to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
            });
        }

        Ok(CompiledUnit {
            entry_symbol: self.entry_symbol(request),
        })
    }
}
