//! Build orchestration.
//!
//! [`BuildOrchestrator::build`] turns one resolved source resource into a
//! classpath and a cached jar:
//!
//! 1. inject preambles (top-level only) and expand includes;
//! 2. derive the cache slot from the expanded checksum;
//! 3. build every `//COMPILE` module depth-first, in declaration order;
//! 4. resolve the unit's own dependencies;
//! 5. compose the classpath;
//! 6. compile unless the cache already has the artifact.
//!
//! Modules are built sequentially because a later module receives the
//! classpath accumulated by the earlier ones.

use std::fmt;
use std::path::PathBuf;

use rustc_hash::FxHashSet;

use crate::cache::ArtifactCache;
use crate::config::Config;
use crate::dependency::DependencyResolver;
use crate::directives::{DirectiveSet, Located};
use crate::error::{Error, Result};
use crate::include::{ExpandedSource, IncludeResolver};
use crate::preamble::{PreambleInjector, PreambleOptions};
use crate::resource::{Fetcher, Location, SourceResource};
use crate::toolchain::{CompileRequest, Toolchain};

/// Separator between classpath segments on this platform.
pub const CLASSPATH_SEPARATOR: &str = if cfg!(windows) { ";" } else { ":" };

/// An ordered classpath without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classpath {
    segments: Vec<String>,
    seen: FxHashSet<String>,
}

impl Classpath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a joined classpath string.
    pub fn parse(joined: &str) -> Self {
        let mut classpath = Self::new();
        classpath.push_joined(joined);
        classpath
    }

    /// Append one segment unless it is empty or already present.
    pub fn push(&mut self, segment: impl Into<String>) {
        let segment = segment.into();
        if !segment.is_empty() && self.seen.insert(segment.clone()) {
            self.segments.push(segment);
        }
    }

    /// Append every segment of a joined classpath string.
    pub fn push_joined(&mut self, joined: &str) {
        for segment in joined.split(CLASSPATH_SEPARATOR) {
            self.push(segment.trim());
        }
    }

    /// Append every segment of `other`.
    pub fn extend(&mut self, other: &Classpath) {
        for segment in &other.segments {
            self.push(segment.clone());
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segments joined with [`CLASSPATH_SEPARATOR`].
    pub fn join(&self) -> String {
        self.segments.join(CLASSPATH_SEPARATOR)
    }
}

impl fmt::Display for Classpath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.join())
    }
}

/// Per-build switches. Compile modules are always built with the default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Prepend the configured custom preamble.
    pub custom_preamble: bool,
    /// Prepend the text-processing preamble.
    pub text_support: bool,
    /// Stop after classpath composition; nothing is compiled.
    pub interactive: bool,
    /// Extra compiler option tokens (from the command line).
    pub compiler_options: Vec<String>,
    /// Extra runtime option tokens (from the command line).
    pub runtime_options: Vec<String>,
}

/// What a build hands back to its caller.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    /// Composed classpath, not including the unit's own artifact.
    pub classpath: Classpath,

    /// Compiled jar; `None` in interactive mode.
    pub artifact: Option<PathBuf>,

    /// Class the launcher invokes.
    pub entry_symbol: String,

    /// Runtime option tokens for the launcher.
    pub runtime_options: Vec<String>,

    /// Checksum of the expanded source.
    pub checksum: String,

    /// Whether the artifact was already cached.
    pub cache_hit: bool,
}

impl BuildOutput {
    /// Classpath to run with: the artifact followed by the composed classpath.
    ///
    /// This is also what a compile module contributes to its parent.
    pub fn runtime_classpath(&self) -> Classpath {
        let mut classpath = Classpath::new();
        if let Some(artifact) = &self.artifact {
            classpath.push(artifact.display().to_string());
        }
        classpath.extend(&self.classpath);
        classpath
    }
}

/// Drives one top-level build and its compile modules.
pub struct BuildOrchestrator<'a> {
    config: &'a Config,
    cache: ArtifactCache,
    fetcher: &'a dyn Fetcher,
    resolver: &'a dyn DependencyResolver,
    toolchain: &'a dyn Toolchain,
}

impl<'a> BuildOrchestrator<'a> {
    pub fn new(
        config: &'a Config,
        fetcher: &'a dyn Fetcher,
        resolver: &'a dyn DependencyResolver,
        toolchain: &'a dyn Toolchain,
    ) -> Self {
        Self {
            config,
            cache: ArtifactCache::new(config.cache_dir()),
            fetcher,
            resolver,
            toolchain,
        }
    }

    /// Build `resource` on top of an inherited classpath.
    pub fn build(
        &self,
        resource: &SourceResource,
        options: &BuildOptions,
        inherited: &Classpath,
    ) -> Result<BuildOutput> {
        let mut modules = Vec::new();
        self.build_unit(resource, options, inherited, &mut modules)
    }

    fn build_unit(
        &self,
        resource: &SourceResource,
        options: &BuildOptions,
        inherited: &Classpath,
        modules: &mut Vec<String>,
    ) -> Result<BuildOutput> {
        let identity = resource.identity();
        if modules.contains(&identity) {
            let mut chain = modules.clone();
            chain.push(identity);
            return Err(Error::ModuleCycle { chain });
        }

        let expanded = self.expand(resource, options)?;
        for origin in &expanded.origins {
            tracing::debug!("  from {}", origin);
        }
        let directives = &expanded.directives;
        let entry = self.cache.entry(&resource.base_name, &expanded.checksum);

        modules.push(identity);
        let module_chain = self.build_modules(&directives.compile_modules, modules)?;
        modules.pop();

        let mut classpath = inherited.clone();
        classpath.extend(&module_chain);
        for archive in &directives.archives {
            classpath.push(self.archive_path(archive)?);
        }
        if !directives.dependencies.is_empty() {
            let resolved = self
                .resolver
                .resolve(&directives.dependencies, &directives.repositories)?;
            classpath.push_joined(&resolved);
        }

        let mut runtime_options = self.config.runtime_options.clone();
        runtime_options.extend(directives.runtime_options.iter().cloned());
        runtime_options.extend(options.runtime_options.iter().cloned());

        let request = self.compile_request(resource, &expanded, &classpath, options, entry.path.clone());
        let entry_symbol = self.toolchain.entry_symbol(&request);

        if options.interactive {
            tracing::debug!("Interactive mode, skipping compilation");
            return Ok(BuildOutput {
                classpath,
                artifact: None,
                entry_symbol,
                runtime_options,
                checksum: expanded.checksum,
                cache_hit: false,
            });
        }

        let cache_hit = self.cache.contains(&entry);
        let (artifact, entry_symbol) = if cache_hit {
            tracing::debug!("Cache hit for {}", entry.path.display());
            (entry.path.clone(), entry_symbol)
        } else {
            let mut entry_symbol = entry_symbol;
            let artifact = self.cache.insert_with(&entry, |staged| {
                let request = CompileRequest {
                    output: staged.to_path_buf(),
                    ..request.clone()
                };
                entry_symbol = self.toolchain.compile(&request)?.entry_symbol;
                Ok(())
            })?;
            (artifact, entry_symbol)
        };

        Ok(BuildOutput {
            classpath,
            artifact: Some(artifact),
            entry_symbol,
            runtime_options,
            checksum: expanded.checksum,
            cache_hit,
        })
    }

    /// Preamble injection and include expansion.
    fn expand(&self, resource: &SourceResource, options: &BuildOptions) -> Result<ExpandedSource> {
        let text = resource.read()?;
        let text = PreambleInjector::new(self.config).inject(
            &text,
            PreambleOptions {
                custom: options.custom_preamble,
                text_support: options.text_support,
            },
        )?;

        IncludeResolver::new(resource.kind, &self.cache, self.fetcher).expand(resource, &text)
    }

    /// Build compile modules in order; each one sees the chain built so far.
    fn build_modules(
        &self,
        targets: &[Located<String>],
        modules: &mut Vec<String>,
    ) -> Result<Classpath> {
        let mut chain = Classpath::new();

        for target in targets {
            let module = match target.context.locate(&target.value)? {
                Location::Path(path) => SourceResource::from_file(&path)?,
                Location::Url(url) => SourceResource::from_url(&url, self.config, self.fetcher)?,
            };
            tracing::info!("Building compile module {}", module.display_name());

            let output = self.build_unit(&module, &BuildOptions::default(), &chain, modules)?;
            chain.extend(&output.runtime_classpath());
        }

        Ok(chain)
    }

    fn archive_path(&self, archive: &Located<String>) -> Result<String> {
        match archive.context.locate(&archive.value)? {
            Location::Path(path) => Ok(path.display().to_string()),
            Location::Url(url) => Err(Error::directive(format!(
                "archive {} must be a local file",
                url
            ))),
        }
    }

    fn compile_request<'r>(
        &self,
        resource: &'r SourceResource,
        expanded: &'r ExpandedSource,
        classpath: &Classpath,
        options: &BuildOptions,
        output: PathBuf,
    ) -> CompileRequest<'r> {
        let directives: &DirectiveSet = &expanded.directives;
        let mut compiler_options = directives.compiler_options.clone();
        compiler_options.extend(options.compiler_options.iter().cloned());

        CompileRequest {
            source: &expanded.text,
            kind: resource.kind,
            base_name: &resource.base_name,
            package: directives.package.as_deref(),
            entry_point: directives.entry_point.as_deref(),
            classpath: classpath.join(),
            compiler_options,
            output,
        }
    }
}
