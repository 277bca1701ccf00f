//! Cache clearing for ktrun CLI.

use ktrun_core::{ArtifactCache, Config};

/// Remove every file in the artifact cache.
pub fn execute(config: &Config) -> anyhow::Result<()> {
    let cache = ArtifactCache::new(config.cache_dir());

    for entry in cache.entries()? {
        tracing::debug!("Removing {}", entry.display());
    }
    cache.clear()?;

    Ok(())
}
