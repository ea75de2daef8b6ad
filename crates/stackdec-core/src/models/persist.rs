use std::fs;
use std::path::Path;

use super::ModelError;

/// Prefix `body` with a 4-byte magic and a version byte.
pub(crate) fn frame(magic: &[u8; 4], version: u8, body: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(5 + body.len());
    buf.extend_from_slice(magic);
    buf.push(version);
    buf.extend_from_slice(body);
    buf
}

/// Check the header written by [`frame`] and return the body.
pub(crate) fn unframe<'a>(
    bytes: &'a [u8],
    magic: &'static [u8; 4],
    version: u8,
) -> Result<&'a [u8], ModelError> {
    if bytes.len() < 5 {
        return Err(ModelError::InvalidHeader);
    }
    if &bytes[0..4] != magic {
        return Err(ModelError::InvalidMagic {
            expected: std::str::from_utf8(magic).unwrap_or("?"),
        });
    }
    if bytes[4] != version {
        return Err(ModelError::UnsupportedVersion(bytes[4]));
    }
    Ok(&bytes[5..])
}

pub(crate) fn has_magic(bytes: &[u8], magic: &[u8; 4]) -> bool {
    bytes.len() >= 4 && &bytes[0..4] == magic
}

/// Atomic write: write to .tmp then rename.
pub(crate) fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), ModelError> {
    let tmp = path.with_extension("tmp");
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
