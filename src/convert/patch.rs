//! Header fix applied to legacy compiled containers.
//!
//! The legacy importer reads object orientation from a field the converter
//! leaves unset. The field lives at an offset stored in the header.

use std::fs;
use std::path::Path;

use crate::error::{ForgeError, Result};

const POINTER_OFFSET: usize = 0x7C;
const HEADER_SIZE: u32 = 0x94;
const REPLACEMENT: u8 = b'H';

/// Patch `data` in place, returning the patched offset.
pub fn patch_bytes(data: &mut [u8]) -> std::result::Result<usize, String> {
    let pointer = data
        .get(POINTER_OFFSET..POINTER_OFFSET + 4)
        .ok_or_else(|| format!("file is {} bytes, too short for a header", data.len()))?;
    let value = u32::from_le_bytes([pointer[0], pointer[1], pointer[2], pointer[3]]);
    let offset = value
        .checked_add(HEADER_SIZE)
        .map(|o| o as usize)
        .ok_or_else(|| "header offset overflows".to_string())?;
    let slot = data
        .get_mut(offset)
        .ok_or_else(|| format!("patch offset {:#x} is past the end of the file", offset))?;
    *slot = REPLACEMENT;
    Ok(offset)
}

/// Apply the legacy header patch to the container at `path`.
pub fn patch_container(path: &Path) -> Result<()> {
    let mut data = fs::read(path)?;
    patch_bytes(&mut data).map_err(|reason| ForgeError::CorruptContainer {
        path: path.to_path_buf(),
        reason,
    })?;
    fs::write(path, data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn container(pointer: u32, len: usize) -> Vec<u8> {
        let mut data = vec![0u8; len];
        data[POINTER_OFFSET..POINTER_OFFSET + 4].copy_from_slice(&pointer.to_le_bytes());
        data
    }

    #[test]
    fn test_patch_writes_marker_byte() {
        let mut data = container(0x10, 0x200);
        let offset = patch_bytes(&mut data).unwrap();
        assert_eq!(offset, 0x10 + 0x94);
        assert_eq!(data[offset], b'H');
        assert_eq!(data.iter().filter(|&&b| b == b'H').count(), 1);
    }

    #[test]
    fn test_patch_is_deterministic() {
        let mut once = container(0x20, 0x200);
        patch_bytes(&mut once).unwrap();
        let mut twice = once.clone();
        patch_bytes(&mut twice).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_offset_outside_file_is_corrupt() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("bad.gr2");
        fs::write(&path, container(0x1000, 0x100)).unwrap();
        let err = patch_container(&path).unwrap_err();
        assert!(matches!(err, ForgeError::CorruptContainer { .. }));
    }

    #[test]
    fn test_short_file_is_corrupt() {
        let mut data = vec![0u8; 16];
        assert!(patch_bytes(&mut data).is_err());
    }
}
