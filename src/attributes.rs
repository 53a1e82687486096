//! Persisted attribute slot for the target folder
//!
//! The record blob lives in a single named slot attached to the folder
//! whose backgrounds are being managed. The trait keeps the store testable
//! and leaves the actual storage primitive swappable; the default
//! implementation uses a hidden file inside the folder.

use std::fs;
use std::io;
use std::path::PathBuf;

use crate::constants::blob;
use crate::error::StoreError;

pub trait AttributeStore {
    /// Read the whole slot, `None` if it has never been written
    fn read_blob(&self) -> Result<Option<Vec<u8>>, StoreError>;

    /// Replace the whole slot
    fn write_blob(&self, data: &[u8]) -> Result<(), StoreError>;
}

/// Attribute slot backed by a hidden file inside the target folder
pub struct FolderAttributes {
    slot: PathBuf,
}

impl FolderAttributes {
    /// Attach to `folder`, which must be an existing directory
    pub fn new(folder: PathBuf) -> Result<Self, StoreError> {
        if !folder.is_dir() {
            return Err(StoreError::NotReady(format!(
                "target folder does not exist: {}",
                folder.display()
            )));
        }
        Ok(Self {
            slot: folder.join(blob::FILE_NAME),
        })
    }
}

impl AttributeStore for FolderAttributes {
    fn read_blob(&self) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(&self.slot) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::IoFailure(e)),
        }
    }

    fn write_blob(&self, data: &[u8]) -> Result<(), StoreError> {
        fs::write(&self.slot, data).map_err(StoreError::IoFailure)
    }
}
