//! Include expansion.
//!
//! Expands `//INCLUDE` (and `@file:Include`) references into one merged
//! compilation unit. The traversal is an explicit depth-first walk over the
//! include graph with a [`Visited`] set threaded through every call:
//!
//! - a resource that is already on the current include path is a cycle and
//!   fails with [`Error::IncludeCycle`];
//! - a resource that was fully expanded earlier (diamond includes) is
//!   skipped, so its definitions appear once.
//!
//! Directives of every visited resource are merged into one
//! [`DirectiveSet`] in document order. Lines Kotlin only accepts at the top
//! of a file (`@file:` annotations, imports, the root's `package`) are
//! hoisted into a header ahead of the merged body.

use std::fs;

use rustc_hash::FxHashSet;

use crate::cache::{ArtifactCache, write_if_absent};
use crate::checksum::sha256_hex;
use crate::directives::{DirectiveKind, DirectiveParser, DirectiveSet, Form, Token, tokenize};
use crate::error::{Error, Result};
use crate::resource::{Fetcher, IncludeContext, Location, Origin, SourceKind, SourceResource, url_base};

/// The merged compilation unit.
#[derive(Debug, Clone)]
pub struct ExpandedSource {
    /// Final source text handed to the compiler.
    pub text: String,

    /// SHA-256 of `text`.
    pub checksum: String,

    /// Directives hoisted from the whole include graph.
    pub directives: DirectiveSet,

    /// Every expanded resource, root first, in traversal order.
    ///
    /// Diagnostic only: directives that need a base location carry their
    /// own context in [`Located`](crate::directives::Located).
    pub origins: Vec<Location>,
}

/// Resources seen during one expansion.
#[derive(Debug, Default)]
pub struct Visited {
    /// Identities on the current include path, root first.
    stack: Vec<String>,
    /// Identities already expanded completely.
    done: FxHashSet<String>,
}

impl Visited {
    /// Enter `identity`, failing if it is already on the include path.
    pub fn enter(&mut self, identity: &str) -> Result<()> {
        if self.stack.iter().any(|seen| seen == identity) {
            let mut chain = self.stack.clone();
            chain.push(identity.to_string());
            return Err(Error::IncludeCycle { chain });
        }
        self.stack.push(identity.to_string());
        Ok(())
    }

    /// Leave the innermost resource.
    pub fn leave(&mut self) {
        if let Some(identity) = self.stack.pop() {
            self.done.insert(identity);
        }
    }

    /// Whether `identity` has been expanded completely.
    pub fn is_done(&self, identity: &str) -> bool {
        self.done.contains(identity)
    }
}

/// Accumulates the pieces of the merged unit.
#[derive(Default)]
struct Merged {
    annotations: Vec<String>,
    package: Option<String>,
    imports: Vec<String>,
    body: Vec<String>,
    directives: DirectiveSet,
    origins: Vec<Location>,
    seen_headers: FxHashSet<String>,
}

impl Merged {
    fn push_header(&mut self, line: &str, is_import: bool) {
        if self.seen_headers.insert(line.to_string()) {
            if is_import {
                self.imports.push(line.to_string());
            } else {
                self.annotations.push(line.to_string());
            }
        }
    }

    fn into_text(self, trailing_newline: bool) -> (String, DirectiveSet, Vec<Location>) {
        let mut header: Vec<String> = self.annotations;
        if let Some(package) = &self.package {
            header.push(format!("package {}", package));
        }
        header.extend(self.imports);

        let mut text = header.join("\n");
        if !header.is_empty() {
            text.push_str("\n\n");
        }
        text.push_str(&self.body.join("\n"));
        if trailing_newline {
            text.push('\n');
        }

        (text, self.directives, self.origins)
    }
}

/// Expands includes of a root resource.
pub struct IncludeResolver<'a> {
    /// Kind of the unit being compiled; applies to every included resource.
    kind: SourceKind,
    cache: &'a ArtifactCache,
    fetcher: &'a dyn Fetcher,
}

impl<'a> IncludeResolver<'a> {
    pub fn new(kind: SourceKind, cache: &'a ArtifactCache, fetcher: &'a dyn Fetcher) -> Self {
        Self {
            kind,
            cache,
            fetcher,
        }
    }

    /// Expand `root`, whose content is `text` (possibly with injected
    /// preamble includes ahead of the real source).
    pub fn expand(&self, root: &SourceResource, text: &str) -> Result<ExpandedSource> {
        let location = match &root.origin {
            Origin::Url(url) => Location::Url(url.clone()),
            _ => Location::Path(root.path.clone()),
        };

        let mut visited = Visited::default();
        let mut merged = Merged::default();

        visited.enter(&root.identity())?;
        merged.origins.push(location);
        self.visit(text, &root.context, &root.identity(), true, &mut visited, &mut merged)?;
        visited.leave();

        let (text, directives, origins) = merged.into_text(text.ends_with('\n'));
        let checksum = sha256_hex(&text);

        tracing::debug!(
            "Expanded {} ({} resources, checksum {})",
            root.display_name(),
            origins.len(),
            &checksum[..12]
        );

        Ok(ExpandedSource {
            text,
            checksum,
            directives,
            origins,
        })
    }

    /// Process the lines of one resource.
    fn visit(
        &self,
        text: &str,
        context: &IncludeContext,
        identity: &str,
        is_root: bool,
        visited: &mut Visited,
        merged: &mut Merged,
    ) -> Result<()> {
        let parser = DirectiveParser::new(self.kind, context.clone());
        let lines = tokenize(text);

        for line in &lines {
            match &line.token {
                Token::Directive { kind, form, args } => {
                    let directives = parser
                        .reduce(std::slice::from_ref(line))
                        .map_err(|e| in_resource(e, identity))?;
                    merged.directives.merge(directives);

                    if *kind == DirectiveKind::Include {
                        for target in args {
                            self.include(context.locate(target)?, identity, visited, merged)?;
                        }
                    } else if *form == Form::Comment {
                        merged.body.push(line.text.to_string());
                    } else {
                        // Keep annotation directives in the checksummed text
                        // without handing the annotation to the compiler.
                        merged.body.push(format!("// {}", line.text.trim()));
                    }
                }
                Token::Package(name) => {
                    if is_root && merged.package.is_none() && !name.is_empty() {
                        merged.package = Some(name.to_string());
                        merged.directives.package = Some(name.to_string());
                    }
                }
                Token::Import(import) => merged.push_header(import, true),
                Token::FileAnnotation(annotation) => merged.push_header(annotation, false),
                Token::Shebang => {}
                Token::UnknownMarker(_) | Token::Code => merged.body.push(line.text.to_string()),
            }
        }

        Ok(())
    }

    /// Expand one include reference.
    fn include(
        &self,
        location: Location,
        includer: &str,
        visited: &mut Visited,
        merged: &mut Merged,
    ) -> Result<()> {
        let (identity, text, context) = match &location {
            Location::Path(path) => {
                let canonical = fs::canonicalize(path).map_err(|e| {
                    Error::Resource(format!(
                        "cannot read include {} (from {}): {}",
                        path.display(),
                        includer,
                        e
                    ))
                })?;
                let identity = canonical.display().to_string();
                if visited.is_done(&identity) {
                    tracing::debug!("Skipping already included {}", identity);
                    return Ok(());
                }
                let text = fs::read_to_string(&canonical).map_err(|e| {
                    Error::Resource(format!("cannot read include {}: {}", identity, e))
                })?;
                let dir = canonical
                    .parent()
                    .map(|p| p.to_path_buf())
                    .unwrap_or_default();
                (identity, text, IncludeContext::Dir(dir))
            }
            Location::Url(url) => {
                if visited.is_done(url) {
                    tracing::debug!("Skipping already included {}", url);
                    return Ok(());
                }
                let text = self.fetch_cached(url)?;
                (url.clone(), text, IncludeContext::Url(url_base(url)?))
            }
        };

        visited.enter(&identity)?;
        merged.origins.push(location);
        self.visit(&text, &context, &identity, false, visited, merged)?;
        visited.leave();

        Ok(())
    }

    /// Read a URL include from the cache directory, fetching it once.
    fn fetch_cached(&self, url: &str) -> Result<String> {
        let local = self.cache.include_path(url);
        if !local.is_file() {
            let content = self.fetcher.fetch(url)?;
            write_if_absent(&local, content.as_bytes())?;
        }

        fs::read_to_string(&local)
            .map_err(|e| Error::Resource(format!("cannot read cached include {}: {}", url, e)))
    }
}

fn in_resource(err: Error, identity: &str) -> Error {
    match err {
        Error::Directive { line, message } => Error::Directive {
            line,
            message: format!("{} in {}", message, identity),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directives::Coordinate;
    use std::cell::Cell;
    use std::path::Path;
    use tempfile::TempDir;

    struct CountingFetcher {
        body: &'static str,
        calls: Cell<usize>,
    }

    impl Fetcher for CountingFetcher {
        fn fetch(&self, _url: &str) -> Result<String> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.body.to_string())
        }
    }

    fn fetcher() -> CountingFetcher {
        CountingFetcher {
            body: "",
            calls: Cell::new(0),
        }
    }

    fn write(dir: &Path, name: &str, content: &str) -> SourceResource {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        SourceResource::from_file(&path).unwrap()
    }

    fn expand(
        root: &SourceResource,
        cache: &ArtifactCache,
        fetcher: &dyn Fetcher,
    ) -> Result<ExpandedSource> {
        let text = root.read()?;
        IncludeResolver::new(root.kind, cache, fetcher).expand(root, &text)
    }

    #[test]
    fn test_include_substituted_in_place() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let cache = ArtifactCache::new(temp.path().join("cache"));
        write(temp.path(), "lib/util.kts", "fun twice(x: Int) = 2 * x");
        let root = write(
            temp.path(),
            "main.kts",
            "println(\"start\")\n//INCLUDE lib/util.kts\nprintln(twice(2))\n",
        );

        let expanded = expand(&root, &cache, &fetcher()).unwrap();

        assert_eq!(
            expanded.text,
            "println(\"start\")\nfun twice(x: Int) = 2 * x\nprintln(twice(2))\n"
        );
        assert_eq!(expanded.origins.len(), 2);
        assert_eq!(expanded.directives.includes[0].value, "lib/util.kts");
    }

    #[test]
    fn test_directives_hoisted_from_includes() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let cache = ArtifactCache::new(temp.path().join("cache"));
        write(
            temp.path(),
            "lib/deps.kts",
            "//DEPS org.slf4j:slf4j-api:2.0.9\n//JAR vendor.jar\nval log = 1",
        );
        let root = write(
            temp.path(),
            "main.kts",
            "//DEPS com.squareup.okio:okio:3.6.0\n//INCLUDE lib/deps.kts\n//DEPS org.slf4j:slf4j-api:2.0.9\nprintln(log)",
        );

        let expanded = expand(&root, &cache, &fetcher()).unwrap();

        assert_eq!(
            expanded.directives.dependencies,
            vec![
                Coordinate::new("com.squareup.okio", "okio", "3.6.0"),
                Coordinate::new("org.slf4j", "slf4j-api", "2.0.9"),
            ]
        );
        let archive = &expanded.directives.archives[0];
        assert_eq!(archive.value, "vendor.jar");
        assert_eq!(
            archive.context,
            IncludeContext::Dir(fs::canonicalize(temp.path().join("lib")).unwrap())
        );
    }

    #[test]
    fn test_direct_cycle_fails() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let cache = ArtifactCache::new(temp.path().join("cache"));
        let root = write(temp.path(), "self.kts", "//INCLUDE self.kts\nprintln(1)");

        let err = expand(&root, &cache, &fetcher()).unwrap_err();
        match err {
            Error::IncludeCycle { chain } => assert_eq!(chain.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_transitive_cycle_fails() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let cache = ArtifactCache::new(temp.path().join("cache"));
        write(temp.path(), "b.kts", "//INCLUDE a.kts\nval b = 2");
        let root = write(temp.path(), "a.kts", "//INCLUDE b.kts\nval a = 1");

        let err = expand(&root, &cache, &fetcher()).unwrap_err();
        match err {
            Error::IncludeCycle { chain } => {
                assert_eq!(chain.len(), 3);
                assert!(chain[0].ends_with("a.kts"));
                assert!(chain[1].ends_with("b.kts"));
                assert!(chain[2].ends_with("a.kts"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_diamond_included_once() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let cache = ArtifactCache::new(temp.path().join("cache"));
        write(temp.path(), "d.kts", "val d = 4");
        write(temp.path(), "b.kts", "//INCLUDE d.kts\nval b = 2");
        write(temp.path(), "c.kts", "//INCLUDE d.kts\nval c = 3");
        let root = write(temp.path(), "a.kts", "//INCLUDE b.kts\n//INCLUDE c.kts\nprintln(d)");

        let expanded = expand(&root, &cache, &fetcher()).unwrap();

        assert_eq!(expanded.text.matches("val d = 4").count(), 1);
        assert_eq!(expanded.text, "val d = 4\nval b = 2\nval c = 3\nprintln(d)");
    }

    #[test]
    fn test_headers_hoisted() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let cache = ArtifactCache::new(temp.path().join("cache"));
        write(
            temp.path(),
            "util.kt",
            "package other\nimport java.io.File\nimport kotlin.math.max\nfun size(f: File) = f.length()",
        );
        let root = write(
            temp.path(),
            "main.kt",
            "#!/usr/bin/env ktrun\n@file:JvmName(\"Tool\")\npackage tools\nimport java.io.File\n//INCLUDE util.kt\nfun main() = println(size(File(\".\")))",
        );

        let expanded = expand(&root, &cache, &fetcher()).unwrap();

        assert_eq!(
            expanded.text,
            "@file:JvmName(\"Tool\")\npackage tools\nimport java.io.File\nimport kotlin.math.max\n\nfun size(f: File) = f.length()\nfun main() = println(size(File(\".\")))"
        );
        assert_eq!(expanded.directives.package.as_deref(), Some("tools"));
    }

    #[test]
    fn test_annotation_directives_commented_out() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let cache = ArtifactCache::new(temp.path().join("cache"));
        let root = write(
            temp.path(),
            "main.kts",
            "@file:DependsOn(\"a:b:1\")\n//DEPS c:d:2\nprintln(1)",
        );

        let expanded = expand(&root, &cache, &fetcher()).unwrap();

        assert_eq!(
            expanded.text,
            "// @file:DependsOn(\"a:b:1\")\n//DEPS c:d:2\nprintln(1)"
        );
        assert_eq!(expanded.directives.dependencies.len(), 2);
    }

    #[test]
    fn test_url_include_fetched_once() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let cache = ArtifactCache::new(temp.path().join("cache"));
        let root = write(
            temp.path(),
            "main.kts",
            "//INCLUDE https://example.com/lib/remote.kts\nprintln(remote)",
        );
        let fetcher = CountingFetcher {
            body: "val remote = 42",
            calls: Cell::new(0),
        };

        let first = expand(&root, &cache, &fetcher).unwrap();
        let second = expand(&root, &cache, &fetcher).unwrap();

        assert_eq!(fetcher.calls.get(), 1);
        assert_eq!(first.checksum, second.checksum);
        assert_eq!(first.text, "val remote = 42\nprintln(remote)");
        assert_eq!(
            first.origins[1],
            Location::Url("https://example.com/lib/remote.kts".into())
        );
    }

    #[test]
    fn test_missing_include_fails() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let cache = ArtifactCache::new(temp.path().join("cache"));
        let root = write(temp.path(), "main.kts", "//INCLUDE missing.kts");

        let err = expand(&root, &cache, &fetcher()).unwrap_err();
        assert!(matches!(err, Error::Resource(_)));
    }

    #[test]
    fn test_identical_content_identical_checksum() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let cache = ArtifactCache::new(temp.path().join("cache"));
        let a = write(temp.path(), "one.kts", "println(1)\n");
        let b = write(temp.path(), "two.kts", "println(1)\n");

        let a = expand(&a, &cache, &fetcher()).unwrap();
        let b = expand(&b, &cache, &fetcher()).unwrap();
        assert_eq!(a.checksum, b.checksum);
    }
}
