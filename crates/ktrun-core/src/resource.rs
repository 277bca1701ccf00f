//! Source resources and how a command-line argument becomes one.
//!
//! A resource is always backed by a readable local file. Arguments that
//! aren't plain script files (stdin, URLs, process substitution handles,
//! inline literals) are materialized into the shared temp directory under a
//! name that embeds the checksum of their content, so repeated invocations
//! reuse the same file.

use std::fmt;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use url::Url;

use crate::cache::write_if_absent;
use crate::checksum::sha256_hex;
use crate::config::Config;
use crate::error::{Error, Result};

/// Base name used for stdin, literal and process-substitution scripts.
pub const SCRIPTLET_NAME: &str = "scriptlet";

/// Whether a source is a script (`.kts`) or a class-style file (`.kt`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Top-level statements; the compiler wraps them in a script class.
    Script,
    /// Declarations only; the entry point is a `main` function.
    Class,
}

impl SourceKind {
    /// Kind for a file extension, if it is one ktrun recognizes.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "kts" => Some(Self::Script),
            "kt" => Some(Self::Class),
            _ => None,
        }
    }

    /// Kind for a path, if its extension is recognized.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Script => "kts",
            Self::Class => "kt",
        }
    }
}

/// Base location against which relative references are resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IncludeContext {
    /// A local directory.
    Dir(PathBuf),
    /// A URL prefix ending in `/`.
    Url(String),
}

/// Where a reference points after resolution against a context.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
    Path(PathBuf),
    Url(String),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Url(url) => f.write_str(url),
        }
    }
}

impl IncludeContext {
    /// Context of the current working directory.
    pub fn current_dir() -> Result<Self> {
        Ok(Self::Dir(std::env::current_dir()?))
    }

    /// Resolve a reference found in a resource with this context.
    ///
    /// `file://` references always name a local file, whatever the context.
    pub fn locate(&self, target: &str) -> Result<Location> {
        let target = target.trim();
        if is_url(target) {
            return Ok(Location::Url(target.to_string()));
        }
        if target.starts_with("file://") {
            return file_url_path(target).map(Location::Path);
        }

        match self {
            Self::Dir(dir) => {
                let path = Path::new(target);
                if path.is_absolute() {
                    Ok(Location::Path(path.to_path_buf()))
                } else {
                    Ok(Location::Path(dir.join(path)))
                }
            }
            Self::Url(base) => join_url(base, target).map(Location::Url),
        }
    }
}

impl fmt::Display for IncludeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dir(dir) => write!(f, "{}", dir.display()),
            Self::Url(url) => f.write_str(url),
        }
    }
}

/// How the resource was originally supplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    File,
    Url(String),
    Stdin,
    Substitution(PathBuf),
    Literal,
}

/// A resolved source resource.
#[derive(Debug, Clone)]
pub struct SourceResource {
    /// How the resource was supplied.
    pub origin: Origin,

    /// Local file holding the content.
    pub path: PathBuf,

    /// File name without extension; determines artifact and class names.
    pub base_name: String,

    /// Script or class style.
    pub kind: SourceKind,

    /// Base for relative references inside this resource.
    pub context: IncludeContext,
}

impl SourceResource {
    /// Use a local file directly. Unknown extensions are treated as scripts.
    pub fn from_file(path: &Path) -> Result<Self> {
        let path = fs::canonicalize(path).map_err(|e| {
            Error::Resource(format!("cannot read {}: {}", path.display(), e))
        })?;
        if !path.is_file() {
            return Err(Error::Resource(format!("{} is not a file", path.display())));
        }

        let kind = SourceKind::from_path(&path).unwrap_or(SourceKind::Script);
        let context = IncludeContext::Dir(
            path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("/")),
        );

        Ok(Self {
            origin: Origin::File,
            base_name: file_stem(&path),
            path,
            kind,
            context,
        })
    }

    /// Fetch a URL into the temp directory.
    pub fn from_url(url: &str, config: &Config, fetcher: &dyn Fetcher) -> Result<Self> {
        let content = fetcher.fetch(url)?;
        let segment = last_segment(url);
        let (stem, kind) = match segment.rsplit_once('.') {
            Some((stem, ext)) if SourceKind::from_extension(ext).is_some() && !stem.is_empty() => {
                (stem.to_string(), SourceKind::from_extension(ext).unwrap_or(SourceKind::Script))
            }
            _ if !segment.is_empty() => (segment.to_string(), SourceKind::Script),
            _ => (SCRIPTLET_NAME.to_string(), SourceKind::Script),
        };

        let base_name = format!("{}.{}", stem, sha256_hex(&content));
        let path = config
            .temp_dir
            .join(format!("{}.{}", base_name, kind.extension()));
        write_if_absent(&path, content.as_bytes())?;
        tracing::debug!("Fetched {} into {}", url, path.display());

        Ok(Self {
            origin: Origin::Url(url.to_string()),
            path,
            base_name,
            kind,
            context: IncludeContext::Url(url_base(url)?),
        })
    }

    /// Materialize script text into the temp directory.
    fn from_text(content: &str, origin: Origin, config: &Config) -> Result<Self> {
        let base_name = format!("{}.{}", SCRIPTLET_NAME, sha256_hex(content));
        let kind = SourceKind::Script;
        let path = config
            .temp_dir
            .join(format!("{}.{}", base_name, kind.extension()));
        write_if_absent(&path, content.as_bytes())?;

        Ok(Self {
            origin,
            path,
            base_name,
            kind,
            context: IncludeContext::current_dir()?,
        })
    }

    /// Read the resource content.
    pub fn read(&self) -> Result<String> {
        fs::read_to_string(&self.path)
            .map_err(|e| Error::Resource(format!("cannot read {}: {}", self.path.display(), e)))
    }

    /// Stable identifier for cycle detection.
    pub fn identity(&self) -> String {
        match &self.origin {
            Origin::Url(url) => url.clone(),
            _ => self.path.display().to_string(),
        }
    }

    /// Human-readable name for diagnostics.
    pub fn display_name(&self) -> String {
        match &self.origin {
            Origin::Url(url) => url.clone(),
            Origin::Stdin => "<stdin>".to_string(),
            Origin::Literal => "<inline>".to_string(),
            Origin::File | Origin::Substitution(_) => self.path.display().to_string(),
        }
    }
}

/// Resolve a command-line script argument into a resource.
///
/// Rules, in order: a readable `.kts`/`.kt` file is used as-is; `-` or
/// `/dev/stdin` reads standard input; an `http(s)://` URL is fetched; any
/// other readable file (e.g. `<(cat foo)`) is copied; everything else is
/// inline script text.
pub fn resolve(
    arg: &str,
    config: &Config,
    fetcher: &dyn Fetcher,
    stdin: &mut dyn Read,
) -> Result<SourceResource> {
    let path = Path::new(arg);

    if SourceKind::from_path(path).is_some() && path.is_file() {
        return SourceResource::from_file(path);
    }

    if arg == "-" || arg == "/dev/stdin" {
        let mut content = String::new();
        stdin
            .read_to_string(&mut content)
            .map_err(|e| Error::Resource(format!("cannot read stdin: {}", e)))?;
        return SourceResource::from_text(&content, Origin::Stdin, config);
    }

    if is_url(arg) {
        return SourceResource::from_url(arg, config, fetcher);
    }

    // Process substitution hands over a pipe such as /dev/fd/63, not a regular file.
    if fs::metadata(path).is_ok_and(|meta| !meta.is_dir()) {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Resource(format!("cannot read {}: {}", arg, e)))?;
        return SourceResource::from_text(
            &content,
            Origin::Substitution(path.to_path_buf()),
            config,
        );
    }

    if SourceKind::from_path(path).is_some() && !arg.contains(char::is_whitespace) {
        return Err(Error::Resource(format!("script file not found: {}", arg)));
    }

    SourceResource::from_text(arg, Origin::Literal, config)
}

/// Fetches remote resources.
pub trait Fetcher {
    /// Return the body of `url`.
    fn fetch(&self, url: &str) -> Result<String>;
}

/// HTTP(S) fetcher backed by `ureq`.
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            agent: ureq::Agent::new(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<String> {
        tracing::info!("Fetching {}", url);
        let response = self.agent.get(url).call().map_err(|e| match e {
            ureq::Error::Status(code, _) => {
                Error::Resource(format!("failed to fetch {}: HTTP {}", url, code))
            }
            ureq::Error::Transport(transport) => {
                Error::Resource(format!("failed to fetch {}: {}", url, transport))
            }
        })?;

        response
            .into_string()
            .map_err(|e| Error::Resource(format!("failed to read body of {}: {}", url, e)))
    }
}

/// Whether `s` is an HTTP(S) URL.
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| SCRIPTLET_NAME.to_string())
}

/// Final path segment of a URL, empty when there is none.
fn last_segment(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.path_segments().and_then(|mut s| s.next_back()).map(String::from))
        .unwrap_or_default()
}

/// The URL's directory: everything up to the last `/` of its path.
pub(crate) fn url_base(url: &str) -> Result<String> {
    Url::parse(url)
        .and_then(|u| u.join("./"))
        .map(|u| u.to_string())
        .map_err(|e| Error::Resource(format!("invalid URL {}: {}", url, e)))
}

/// Resolve a relative reference against a URL base.
fn join_url(base: &str, target: &str) -> Result<String> {
    Url::parse(base)
        .and_then(|u| u.join(target))
        .map(|u| u.to_string())
        .map_err(|e| Error::Resource(format!("cannot resolve {} against {}: {}", target, base, e)))
}

/// Local path of a `file://` URL.
fn file_url_path(target: &str) -> Result<PathBuf> {
    Url::parse(target)
        .ok()
        .and_then(|u| u.to_file_path().ok())
        .ok_or_else(|| Error::Resource(format!("invalid file URL {}", target)))
}

/// `file://` URL for an absolute local path.
pub(crate) fn file_url(path: &Path) -> Result<String> {
    Url::from_file_path(path)
        .map(|u| u.to_string())
        .map_err(|()| Error::Resource(format!("{} is not an absolute path", path.display())))
}
