//! Directive value types.

use std::fmt;
use std::str::FromStr;

use rustc_hash::FxHashSet;

use crate::error::Error;
use crate::resource::IncludeContext;

/// A Maven coordinate: `group:artifact:version[:classifier[:type]]` or
/// `group:artifact:version[:classifier]@type`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Coordinate {
    pub group: String,
    pub artifact: String,
    pub version: String,
    pub classifier: Option<String>,
    pub packaging: Option<String>,
}

impl Coordinate {
    /// Create a plain `group:artifact:version` coordinate.
    pub fn new(
        group: impl Into<String>,
        artifact: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            artifact: artifact.into(),
            version: version.into(),
            classifier: None,
            packaging: None,
        }
    }
}

impl FromStr for Coordinate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || Error::directive(format!("malformed dependency coordinate '{}'", s));

        if s.is_empty() || s.contains(char::is_whitespace) {
            return Err(malformed());
        }

        let (body, at_type) = match s.split_once('@') {
            Some((body, ty)) if !ty.is_empty() && !ty.contains(['@', ':']) => (body, Some(ty)),
            Some(_) => return Err(malformed()),
            None => (s, None),
        };

        let parts: Vec<&str> = body.split(':').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(malformed());
        }

        let (classifier, packaging) = match (parts.len(), at_type) {
            (3, ty) => (None, ty),
            (4, ty) => (Some(parts[3]), ty),
            (5, None) => (Some(parts[3]), Some(parts[4])),
            _ => return Err(malformed()),
        };

        Ok(Self {
            group: parts[0].to_string(),
            artifact: parts[1].to_string(),
            version: parts[2].to_string(),
            classifier: classifier.map(String::from),
            packaging: packaging.map(String::from),
        })
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.artifact, self.version)?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{}", classifier)?;
        }
        if let Some(packaging) = &self.packaging {
            write!(f, "@{}", packaging)?;
        }
        Ok(())
    }
}

/// A Maven repository declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Repository {
    pub id: String,
    pub url: String,
}

impl Repository {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
        }
    }
}

impl FromStr for Repository {
    type Err = Error;

    /// Parse the `id=url` comment form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((id, url)) if !id.trim().is_empty() && !url.trim().is_empty() => {
                Ok(Self::new(id.trim(), url.trim()))
            }
            _ => Err(Error::directive(format!(
                "malformed repository '{}', expected id=url",
                s
            ))),
        }
    }
}

/// A value together with the include context of the resource declaring it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Located<T> {
    pub value: T,
    pub context: IncludeContext,
}

/// All directives of a source unit.
///
/// Every list keeps first-seen order. Coordinates, repositories, includes,
/// compile modules and archives are de-duplicated; option tokens are kept
/// as written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectiveSet {
    pub dependencies: Vec<Coordinate>,
    pub repositories: Vec<Repository>,
    pub includes: Vec<Located<String>>,
    pub compile_modules: Vec<Located<String>>,
    pub archives: Vec<Located<String>>,
    pub runtime_options: Vec<String>,
    pub compiler_options: Vec<String>,
    pub entry_point: Option<String>,
    pub package: Option<String>,
}

impl DirectiveSet {
    /// Union `other` into `self`, keeping first-seen order.
    ///
    /// Singular values (entry point, package) keep the value already present.
    pub fn merge(&mut self, other: DirectiveSet) {
        push_unique(&mut self.dependencies, other.dependencies);
        push_unique(&mut self.repositories, other.repositories);
        push_unique(&mut self.includes, other.includes);
        push_unique(&mut self.compile_modules, other.compile_modules);
        push_unique(&mut self.archives, other.archives);
        self.runtime_options.extend(other.runtime_options);
        self.compiler_options.extend(other.compiler_options);

        if self.entry_point.is_none() {
            self.entry_point = other.entry_point;
        }
        if self.package.is_none() {
            self.package = other.package;
        }
    }
}

/// Append the items of `new` that aren't in `list` yet.
pub(crate) fn push_unique<T: Clone + Eq + std::hash::Hash>(list: &mut Vec<T>, new: Vec<T>) {
    let mut seen: FxHashSet<T> = list.iter().cloned().collect();
    for item in new {
        if seen.insert(item.clone()) {
            list.push(item);
        }
    }
}
