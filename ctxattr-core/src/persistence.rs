//! Saving and restoring validated requests as JSON.
//!
//! Files are written atomically (write to `.tmp` then rename). A restored
//! request goes through validation again, so a hand-edited file cannot
//! bypass the argument checks.

use std::io;
use std::path::Path;

use crate::args::AttributeContextArgs;
use crate::error::{CtxAttrError, Result};
use crate::validate::ContextRequest;

/// Atomically write raw bytes to a file, creating parent directories.
pub fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Save a request as pretty-printed JSON, derived flags included.
pub fn save_request(path: &Path, request: &ContextRequest) -> Result<()> {
    let json = serde_json::to_string_pretty(request)?;
    atomic_write(path, json.as_bytes())?;
    tracing::debug!(path = %path.display(), "Saved context attribution request");
    Ok(())
}

/// Load a request saved by [`save_request`] (or any flat JSON object of
/// argument keys) and validate it.
pub fn load_request(path: &Path) -> Result<ContextRequest> {
    if !path.exists() {
        return Err(CtxAttrError::RequestNotFound {
            path: path.to_path_buf(),
        });
    }
    let data = std::fs::read_to_string(path)?;
    let args: AttributeContextArgs = serde_json::from_str(&data)?;
    Ok(args.validate()?)
}
