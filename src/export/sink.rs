use std::path::Path;

use anyhow::{Context, Result};

/// Boundary to whatever persists the serialized export. A sink failure is
/// the sink's problem alone: the caller's in-memory table and any local
/// artifact stay valid.
pub trait ExportSink {
    fn store(&self, content: &[u8], name: &str, destination: &str) -> Result<()>;
}

/// Sink that stores exports under a local directory, creating it on
/// demand. Stands in for the shared-drive upload in deployments where the
/// destination is a mounted path.
pub struct DirectorySink;

impl ExportSink for DirectorySink {
    fn store(&self, content: &[u8], name: &str, destination: &str) -> Result<()> {
        let directory = Path::new(destination);
        std::fs::create_dir_all(directory).with_context(|| {
            format!("Failed to create export directory {}", directory.display())
        })?;

        let path = directory.join(name);
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write export {}", path.display()))?;

        Ok(())
    }
}
