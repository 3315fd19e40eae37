use crate::PdfEngineError;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Writes `bytes` to `output` so that the destination either keeps its previous content or
/// holds the complete new document, never a partial one.
pub fn write_document(bytes: &[u8], output: &Path) -> Result<(), PdfEngineError> {
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut staged = NamedTempFile::new_in(dir)?;
    staged.write_all(bytes)?;
    staged.as_file().sync_all()?;
    staged.persist(output).map_err(|err| err.error)?;

    debug!(path = %output.display(), bytes = bytes.len(), "document written");
    Ok(())
}
