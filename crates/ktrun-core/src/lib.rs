//! Build pipeline for ktrun.
//!
//! This crate provides:
//! - Directive parsing (`//DEPS`, `//INCLUDE`, `//COMPILE`, ...)
//! - Include expansion with cycle detection and directive hoisting
//! - Preamble injection
//! - Dependency resolution through an external engine
//! - A content-addressed artifact cache
//! - Recursive builds of compile modules with classpath composition

pub mod build;
pub mod cache;
pub mod checksum;
pub mod config;
pub mod dependency;
pub mod directives;
pub mod entry;
pub mod error;
pub mod include;
pub mod preamble;
pub mod resource;
pub mod toolchain;

pub use build::{BuildOptions, BuildOrchestrator, BuildOutput, Classpath};
pub use cache::{ArtifactCache, CacheEntry};
pub use config::Config;
pub use dependency::{CommandResolver, DependencyResolver};
pub use directives::{Coordinate, DirectiveParser, DirectiveSet, Repository};
pub use error::{Error, Result};
pub use include::{ExpandedSource, IncludeResolver};
pub use preamble::{PreambleInjector, PreambleOptions};
pub use resource::{Fetcher, HttpFetcher, IncludeContext, SourceKind, SourceResource};
pub use toolchain::{CompileRequest, CompiledUnit, KotlincToolchain, Toolchain};
