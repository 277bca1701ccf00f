//! Preamble injection.
//!
//! Preambles are ordinary includes: each one is written to the shared temp
//! directory under a name derived from its checksum, and an `//INCLUDE`
//! line with its `file://` URL is prepended to the script. The URL form
//! keeps the reference local even when the script itself came from a URL. Preamble code therefore
//! goes through the same checksum, hoisting and cycle checks as any other
//! include, and repeated runs reuse the same file.

use std::path::PathBuf;

use crate::cache::write_if_absent;
use crate::checksum::sha256_hex;
use crate::config::Config;
use crate::error::Result;
use crate::resource::file_url;

/// Preamble enabled by text-processing mode.
pub const TEXT_PREAMBLE: &str = "//DEPS com.github.holgerbrandl:kscript-support-api:1.2.5

import kscript.text.*
val lines = resolveArgFile(args)
";

/// Which preambles to inject.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreambleOptions {
    /// Prepend the configured custom preamble, if any.
    pub custom: bool,
    /// Prepend [`TEXT_PREAMBLE`].
    pub text_support: bool,
}

/// Materializes preambles and prepends include references to them.
pub struct PreambleInjector<'a> {
    config: &'a Config,
}

impl<'a> PreambleInjector<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Return `source` with include lines for the selected preambles in front.
    pub fn inject(&self, source: &str, options: PreambleOptions) -> Result<String> {
        let mut preambles: Vec<&str> = Vec::new();
        if options.custom
            && let Some(custom) = &self.config.custom_preamble
        {
            preambles.push(custom);
        }
        if options.text_support {
            preambles.push(TEXT_PREAMBLE);
        }

        if preambles.is_empty() {
            return Ok(source.to_string());
        }

        let mut text = String::new();
        for preamble in preambles {
            let path = std::path::absolute(self.materialize(preamble)?)?;
            text.push_str(&format!("//INCLUDE {}\n", file_url(&path)?));
        }
        text.push_str(source);

        Ok(text)
    }

    /// Write `preamble` to its checksum-keyed file and return the path.
    pub fn materialize(&self, preamble: &str) -> Result<PathBuf> {
        let path = self
            .config
            .temp_dir
            .join(format!("preamble.{}.kts", sha256_hex(preamble)));
        write_if_absent(&path, preamble.as_bytes())?;
        Ok(path)
    }
}
