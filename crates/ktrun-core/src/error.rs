//! Error types for ktrun-core.

use thiserror::Error;

/// Result type for ktrun-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building a script.
///
/// Every variant is fatal to the current top-level invocation. A failure
/// inside a compile module surfaces unchanged as the parent's failure.
#[derive(Debug, Error)]
pub enum Error {
    /// The compiler toolchain could not be located.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A resource could not be read or fetched.
    #[error("resource error: {0}")]
    Resource(String),

    /// An include chain refers back to one of its own members.
    #[error("include cycle detected: {}", chain.join(" -> "))]
    IncludeCycle { chain: Vec<String> },

    /// A compile module (transitively) declares itself.
    #[error("compile module cycle detected: {}", chain.join(" -> "))]
    ModuleCycle { chain: Vec<String> },

    /// Malformed directive or unsupported directive combination.
    #[error("directive error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    Directive {
        line: Option<usize>,
        message: String,
    },

    /// The dependency resolution engine failed.
    #[error("dependency resolution failed:\n{0}")]
    DependencyResolution(String),

    /// The compiler exited unsuccessfully.
    #[error("compilation failed for {script}:\n{message}")]
    Compilation { script: String, message: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a directive error without a line number.
    pub fn directive(message: impl Into<String>) -> Self {
        Self::Directive {
            line: None,
            message: message.into(),
        }
    }

    /// Render the error followed by a recovery hint, if one applies.
    pub fn with_hint(&self) -> String {
        let hint = match self {
            Self::Configuration(_) => {
                Some("install kotlinc and put it on PATH, or point KOTLIN_HOME at the installation")
            }
            Self::IncludeCycle { .. } => Some("remove one of the //INCLUDE directives in the chain"),
            Self::ModuleCycle { .. } => Some("a //COMPILE target must not depend on its declarer"),
            Self::Directive { .. } => {
                Some("coordinates use the form group:artifact:version[:classifier][@type]")
            }
            Self::DependencyResolution(_) => {
                Some("check the coordinates and any //MAVEN_REPO declarations, or set KTRUN_RESOLVER")
            }
            Self::Resource(_) | Self::Compilation { .. } | Self::Io(_) => None,
        };

        match hint {
            Some(hint) => format!("{self}\n\nhint: {hint}"),
            None => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_names_chain() {
        let err = Error::IncludeCycle {
            chain: vec!["a.kts".into(), "b.kts".into(), "a.kts".into()],
        };
        assert_eq!(err.to_string(), "include cycle detected: a.kts -> b.kts -> a.kts");
    }

    #[test]
    fn test_directive_line_number() {
        let err = Error::Directive {
            line: Some(3),
            message: "bad".into(),
        };
        assert_eq!(err.to_string(), "directive error at line 3: bad");
        assert_eq!(Error::directive("bad").to_string(), "directive error: bad");
    }

    #[test]
    fn test_hint_appended() {
        let err = Error::Configuration("kotlinc not found".into());
        assert!(err.with_hint().contains("hint: install kotlinc"));

        let err = Error::Resource("gone".into());
        assert_eq!(err.with_hint(), "resource error: gone");
    }
}
