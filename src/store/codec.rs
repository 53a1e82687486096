//! Record blob codec
//!
//! The whole record list travels as one opaque byte buffer stored in the
//! folder's attribute slot. The payload is versioned JSON; anything that
//! does not decode into the current format is treated as an uninitialized
//! store rather than a partial read.

use serde::{Deserialize, Serialize};

use crate::constants::blob;
use crate::error::StoreError;
use crate::store::BackgroundRecord;

#[derive(Debug, Serialize, Deserialize)]
struct RecordBlob {
    version: u32,
    records: Vec<BackgroundRecord>,
}

/// Serialize the ordered record list into the attribute payload
pub fn encode(records: &[BackgroundRecord]) -> Result<Vec<u8>, StoreError> {
    let payload = RecordBlob {
        version: blob::FORMAT_VERSION,
        records: records.to_vec(),
    };
    serde_json::to_vec(&payload)
        .map_err(|e| StoreError::NotReady(format!("failed to serialize record blob: {e}")))
}

/// Deserialize the attribute payload back into the ordered record list
pub fn decode(bytes: &[u8]) -> Result<Vec<BackgroundRecord>, StoreError> {
    let payload: RecordBlob = serde_json::from_slice(bytes)
        .map_err(|e| StoreError::NotReady(format!("corrupt record blob: {e}")))?;

    if payload.version != blob::FORMAT_VERSION {
        return Err(StoreError::NotReady(format!(
            "unsupported record blob version {}",
            payload.version
        )));
    }
    if payload.records.is_empty() {
        return Err(StoreError::NotReady("record blob has no base record".into()));
    }

    Ok(payload.records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::mask::WorkspaceMask;
    use crate::types::{Origin, Placement};
    use std::path::PathBuf;

    fn sample_records() -> Vec<BackgroundRecord> {
        let mut base_mask = WorkspaceMask::all();
        base_mask.remove(3);
        vec![
            BackgroundRecord {
                workspaces: base_mask,
                image: None,
                placement: Placement::Scaled,
                origin: Origin::default(),
                text_outline: true,
                custom: false,
            },
            BackgroundRecord {
                workspaces: WorkspaceMask::single(3),
                image: Some(PathBuf::from("/tmp/a.png")),
                placement: Placement::UseOrigin,
                origin: Origin::new(10, -20),
                text_outline: false,
                custom: true,
            },
        ]
    }

    #[test]
    fn test_roundtrip_preserves_every_field() {
        let records = sample_records();
        let bytes = encode(&records).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, records);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode(b"not json at all"),
            Err(StoreError::NotReady(_))
        ));
    }

    #[test]
    fn test_decode_rejects_unknown_version() {
        let mut bytes = encode(&sample_records()).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        let bumped = text.replace("\"version\":1", "\"version\":99");
        bytes = bumped.into_bytes();
        assert!(matches!(decode(&bytes), Err(StoreError::NotReady(_))));
    }

    #[test]
    fn test_decode_rejects_empty_record_list() {
        let bytes = br#"{"version":1,"records":[]}"#;
        assert!(matches!(decode(bytes), Err(StoreError::NotReady(_))));
    }
}
