//! Workspace background record store
//!
//! In-memory model of the ordered record list persisted in the target
//! folder's attribute slot. Record 0 always exists and holds the global
//! default; its mask marks the workspaces that follow it. Every other
//! record owns the workspaces in its own mask. Together the masks
//! partition workspaces 1..=32: each workspace belongs to exactly one
//! record at all times.
//!
//! The store is loaded once at construction and mutated in place; nothing
//! reaches the attribute slot until [`BackgroundStore::flush`], which also
//! signals the shell to redraw. Callers own the flush boundary.

pub mod codec;
pub mod mask;

use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::attributes::AttributeStore;
use crate::constants::workspace;
use crate::desktop::RefreshNotifier;
use crate::error::StoreError;
use crate::types::{Origin, Placement};
use self::mask::WorkspaceMask;

/// One stored background configuration, shared by every workspace whose
/// mask bit points at it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackgroundRecord {
    pub workspaces: WorkspaceMask,
    /// `None` means a cleared background
    pub image: Option<PathBuf>,
    pub placement: Placement,
    pub origin: Origin,
    pub text_outline: bool,
    /// Set on records created explicitly, never on the implicit record 0
    pub custom: bool,
}

impl BackgroundRecord {
    fn global_default() -> Self {
        Self {
            workspaces: WorkspaceMask::all(),
            image: None,
            placement: Placement::default(),
            origin: Origin::default(),
            text_outline: true,
            custom: false,
        }
    }
}

/// Snapshot of one workspace's effective configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceInfo {
    pub image: Option<PathBuf>,
    pub placement: Placement,
    pub origin: Origin,
    pub text_outline: bool,
    /// False when the values above came from the global default
    pub customized: bool,
}

pub struct BackgroundStore {
    attrs: Rc<dyn AttributeStore>,
    notifier: Rc<dyn RefreshNotifier>,
    records: Vec<BackgroundRecord>,
    dirty: bool,
}

impl BackgroundStore {
    /// Load the record list from the folder's attribute slot.
    ///
    /// An absent or undecodable blob means the folder has never been set
    /// up; see [`BackgroundStore::bootstrap`].
    pub fn load(
        attrs: Rc<dyn AttributeStore>,
        notifier: Rc<dyn RefreshNotifier>,
    ) -> Result<Self, StoreError> {
        let bytes = attrs.read_blob()?.ok_or_else(|| {
            StoreError::NotReady("no background attribute on this folder (run 'init')".into())
        })?;
        let records = codec::decode(&bytes)?;
        debug!(records = records.len(), "loaded background store");
        Ok(Self {
            attrs,
            notifier,
            records,
            dirty: false,
        })
    }

    /// Write a fresh blob holding only the global default record.
    ///
    /// Refuses to clobber a healthy store; a corrupt blob is replaced.
    pub fn bootstrap(
        attrs: Rc<dyn AttributeStore>,
        notifier: Rc<dyn RefreshNotifier>,
    ) -> Result<Self, StoreError> {
        if let Some(bytes) = attrs.read_blob()?
            && codec::decode(&bytes).is_ok()
        {
            return Err(StoreError::InvalidArgument(
                "store is already initialized".into(),
            ));
        }

        let records = vec![BackgroundRecord::global_default()];
        attrs.write_blob(&codec::encode(&records)?)?;
        info!("initialized background store with global default record");
        Ok(Self {
            attrs,
            notifier,
            records,
            dirty: false,
        })
    }

    /// Resolve the record index owning `workspace`.
    ///
    /// Workspace 0 always resolves to the global record. For real
    /// workspaces, `None` means "no custom record, uses the default".
    pub fn find_index(&self, workspace: u32) -> Option<usize> {
        if workspace == workspace::GLOBAL {
            return Some(0);
        }
        self.records
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, r)| r.workspaces.contains(workspace))
            .map(|(i, _)| i)
    }

    /// Give `workspace` its own record, seeded from the current global
    /// defaults, and drop it from the default set.
    pub fn create_index(&mut self, workspace: u32) -> Result<usize, StoreError> {
        if !WorkspaceMask::in_range(workspace) {
            return Err(StoreError::invalid_workspace(workspace));
        }
        let Some(base) = self.records.first() else {
            return Err(StoreError::NotReady("store has no base record".into()));
        };

        let record = BackgroundRecord {
            workspaces: WorkspaceMask::single(workspace),
            image: base.image.clone(),
            placement: base.placement,
            origin: base.origin,
            text_outline: base.text_outline,
            custom: true,
        };

        self.records[0].workspaces.remove(workspace);
        self.records.push(record);
        self.dirty = true;

        let index = self.records.len() - 1;
        debug!(workspace, index, "created workspace record");
        Ok(index)
    }

    /// Revert `workspace` to the global default, deleting its record once
    /// no workspace references it.
    pub fn remove_index(&mut self, workspace: u32) -> Result<(), StoreError> {
        if !WorkspaceMask::in_range(workspace) {
            return Err(StoreError::invalid_workspace(workspace));
        }
        let index = self
            .find_index(workspace)
            .ok_or(StoreError::NotFound(workspace))?;

        self.records[index].workspaces.remove(workspace);
        if self.records[index].workspaces.is_empty() {
            self.records.remove(index);
            debug!(workspace, index, "removed emptied workspace record");
        }
        self.records[0].workspaces.insert(workspace);
        self.dirty = true;
        Ok(())
    }

    /// Effective configuration for `workspace`.
    ///
    /// A workspace without a custom record silently reports the global
    /// default values; `customized` tells the two cases apart.
    pub fn workspace_info(&self, workspace: u32) -> WorkspaceInfo {
        let custom_index = if workspace == workspace::GLOBAL {
            None
        } else {
            self.find_index(workspace)
        };
        let record = &self.records[custom_index.unwrap_or(0)];
        WorkspaceInfo {
            image: record.image.clone(),
            placement: record.placement,
            origin: record.origin,
            text_outline: record.text_outline,
            customized: custom_index.is_some(),
        }
    }

    /// Whether `workspace` has its own record
    pub fn is_custom(&self, workspace: u32) -> bool {
        workspace != workspace::GLOBAL && self.find_index(workspace).is_some()
    }

    pub fn set_background(
        &mut self,
        image: Option<&Path>,
        workspace: u32,
    ) -> Result<(), StoreError> {
        if let Some(path) = image
            && !path.is_file()
        {
            return Err(StoreError::ValidationFailure(path.to_path_buf()));
        }
        let index = self.resolve_or_create(workspace)?;
        self.records[index].image = image.map(Path::to_path_buf);
        self.dirty = true;
        Ok(())
    }

    pub fn set_placement(&mut self, mode: Placement, workspace: u32) -> Result<(), StoreError> {
        let index = self.resolve_or_create(workspace)?;
        self.records[index].placement = mode;
        self.dirty = true;
        Ok(())
    }

    pub fn set_outline(&mut self, enabled: bool, workspace: u32) -> Result<(), StoreError> {
        let index = self.resolve_or_create(workspace)?;
        self.records[index].text_outline = enabled;
        self.dirty = true;
        Ok(())
    }

    pub fn set_offset(&mut self, x: i32, y: i32, workspace: u32) -> Result<(), StoreError> {
        let index = self.resolve_or_create(workspace)?;
        self.records[index].origin = Origin::new(x, y);
        self.dirty = true;
        Ok(())
    }

    /// Persist pending mutations and signal the shell to redraw.
    ///
    /// The refresh notification goes out even when nothing was written;
    /// the signal is idempotent and the shell re-reads the blob either way.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        if self.dirty {
            let bytes = codec::encode(&self.records)?;
            self.attrs.write_blob(&bytes)?;
            self.dirty = false;
            debug!(records = self.records.len(), "flushed background store");
        }
        self.notifier.notify_refresh();
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn records(&self) -> &[BackgroundRecord] {
        &self.records
    }

    fn resolve_or_create(&mut self, workspace: u32) -> Result<usize, StoreError> {
        if workspace == workspace::GLOBAL {
            return Ok(0);
        }
        match self.find_index(workspace) {
            Some(index) => Ok(index),
            None => self.create_index(workspace),
        }
    }

    /// Invariant check used by tests: the masks of record 0 and every
    /// custom record partition workspaces 1..=32 with no overlap or gap.
    pub(crate) fn partition_ok(&self) -> bool {
        let mut seen = WorkspaceMask::EMPTY;
        for record in &self.records {
            for w in record.workspaces.iter() {
                if seen.contains(w) {
                    return false;
                }
                seen.insert(w);
            }
        }
        seen == WorkspaceMask::all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::testing::MemoryAttributes;
    use crate::desktop::testing::{NullNotifier, RecordingNotifier};

    fn fresh_store() -> (BackgroundStore, Rc<MemoryAttributes>, Rc<RecordingNotifier>) {
        let attrs = Rc::new(MemoryAttributes::default());
        let notifier = Rc::new(RecordingNotifier::default());
        let store = BackgroundStore::bootstrap(attrs.clone(), notifier.clone()).unwrap();
        (store, attrs, notifier)
    }

    #[test]
    fn test_load_missing_blob_not_ready() {
        let attrs = Rc::new(MemoryAttributes::default());
        let result = BackgroundStore::load(attrs, Rc::new(NullNotifier));
        assert!(matches!(result, Err(StoreError::NotReady(_))));
    }

    #[test]
    fn test_load_corrupt_blob_not_ready() {
        let attrs = Rc::new(MemoryAttributes::with_blob(b"{garbage".to_vec()));
        let result = BackgroundStore::load(attrs, Rc::new(NullNotifier));
        assert!(matches!(result, Err(StoreError::NotReady(_))));
    }

    #[test]
    fn test_bootstrap_then_load() {
        let attrs = Rc::new(MemoryAttributes::default());
        BackgroundStore::bootstrap(attrs.clone(), Rc::new(NullNotifier)).unwrap();

        let store = BackgroundStore::load(attrs, Rc::new(NullNotifier)).unwrap();
        assert_eq!(store.records().len(), 1);
        assert_eq!(store.records()[0].workspaces, WorkspaceMask::all());
        assert!(store.partition_ok());
    }

    #[test]
    fn test_bootstrap_refuses_healthy_store() {
        let attrs = Rc::new(MemoryAttributes::default());
        BackgroundStore::bootstrap(attrs.clone(), Rc::new(NullNotifier)).unwrap();
        let again = BackgroundStore::bootstrap(attrs, Rc::new(NullNotifier));
        assert!(matches!(again, Err(StoreError::InvalidArgument(_))));
    }

    #[test]
    fn test_bootstrap_replaces_corrupt_blob() {
        let attrs = Rc::new(MemoryAttributes::with_blob(b"junk".to_vec()));
        let store = BackgroundStore::bootstrap(attrs, Rc::new(NullNotifier)).unwrap();
        assert!(store.partition_ok());
    }

    #[test]
    fn test_create_index_claims_workspace() {
        let (mut store, _, _) = fresh_store();
        let index = store.create_index(7).unwrap();

        assert_eq!(store.find_index(7), Some(index));
        assert!(!store.records()[0].workspaces.contains(7));
        assert!(store.records()[index].custom);
        assert!(store.partition_ok());
    }

    #[test]
    fn test_create_index_copies_global_defaults() {
        let (mut store, _, _) = fresh_store();
        store.set_placement(Placement::Tiled, workspace::GLOBAL).unwrap();
        store.set_outline(false, workspace::GLOBAL).unwrap();

        let index = store.create_index(4).unwrap();
        let record = &store.records()[index];
        assert_eq!(record.placement, Placement::Tiled);
        assert!(!record.text_outline);
        assert_eq!(record.image, None);
    }

    #[test]
    fn test_create_index_rejects_out_of_range() {
        let (mut store, _, _) = fresh_store();
        assert!(matches!(
            store.create_index(0),
            Err(StoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            store.create_index(33),
            Err(StoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_remove_index_reverts_to_default() {
        let (mut store, _, _) = fresh_store();
        store.create_index(5).unwrap();

        store.remove_index(5).unwrap();
        assert_eq!(store.find_index(5), None);
        assert!(store.records()[0].workspaces.contains(5));
        assert_eq!(store.records().len(), 1);
        assert!(store.partition_ok());
    }

    #[test]
    fn test_remove_index_requires_custom_record() {
        let (mut store, _, _) = fresh_store();
        assert!(matches!(store.remove_index(9), Err(StoreError::NotFound(9))));
    }

    #[test]
    fn test_remove_index_rejects_global() {
        let (mut store, _, _) = fresh_store();
        assert!(matches!(
            store.remove_index(0),
            Err(StoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_shared_record_survives_partial_removal() {
        // A record owning several workspaces can arrive from an
        // externally written blob; releasing one workspace must keep the
        // record alive for the others.
        let (mut store, _, _) = fresh_store();
        store.create_index(2).unwrap();
        let index = store.find_index(2).unwrap();
        store.records[index].workspaces.insert(3);
        store.records[0].workspaces.remove(3);
        assert!(store.partition_ok());

        store.remove_index(2).unwrap();
        assert_eq!(store.find_index(2), None);
        assert!(store.find_index(3).is_some());
        assert!(store.partition_ok());
    }

    #[test]
    fn test_partition_holds_across_churn() {
        let (mut store, _, _) = fresh_store();
        for w in 1..=32 {
            store.create_index(w).unwrap();
            assert!(store.partition_ok());
        }
        for w in (1..=32).step_by(2) {
            store.remove_index(w).unwrap();
            assert!(store.partition_ok());
        }
        assert_eq!(store.records().len(), 17);
    }

    #[test]
    fn test_set_background_validates_path() {
        let (mut store, _, _) = fresh_store();
        let missing = Path::new("/nonexistent/wall.png");
        assert!(matches!(
            store.set_background(Some(missing), 3),
            Err(StoreError::ValidationFailure(_))
        ));
        // the failed mutation must not leave a half-created record
        assert_eq!(store.find_index(3), None);
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_set_background_then_placement_then_flush() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("a.png");
        std::fs::write(&image, b"img").unwrap();

        let (mut store, attrs, _) = fresh_store();
        store.set_background(Some(&image), 3).unwrap();
        store.set_placement(Placement::Tiled, 3).unwrap();
        store.flush().unwrap();

        let info = store.workspace_info(3);
        assert_eq!(info.image.as_deref(), Some(image.as_path()));
        assert_eq!(info.placement, Placement::Tiled);
        assert!(info.customized);

        // and the persisted copy agrees
        let reloaded =
            BackgroundStore::load(attrs, Rc::new(NullNotifier)).unwrap();
        assert_eq!(reloaded.workspace_info(3).placement, Placement::Tiled);
    }

    #[test]
    fn test_set_offset_autocreates_from_defaults() {
        let (mut store, _, _) = fresh_store();
        store.set_offset(10, 20, 5).unwrap();

        let info = store.workspace_info(5);
        assert!(info.customized);
        assert_eq!(info.origin, Origin::new(10, 20));
        assert_eq!(info.placement, Placement::Scaled);
        assert_eq!(info.image, None);
    }

    #[test]
    fn test_clear_background() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("b.png");
        std::fs::write(&image, b"img").unwrap();

        let (mut store, _, _) = fresh_store();
        store.set_background(Some(&image), 2).unwrap();
        store.set_background(None, 2).unwrap();

        let info = store.workspace_info(2);
        assert_eq!(info.image, None);
        assert!(info.customized);
    }

    #[test]
    fn test_uncustomized_workspace_falls_back_to_global() {
        let (mut store, _, _) = fresh_store();
        store.set_placement(Placement::Centered, workspace::GLOBAL).unwrap();

        let info = store.workspace_info(12);
        assert_eq!(info.placement, Placement::Centered);
        assert!(!info.customized);
    }

    #[test]
    fn test_flush_idempotent_and_always_notifies() {
        let (mut store, attrs, notifier) = fresh_store();
        store.set_outline(false, 1).unwrap();

        store.flush().unwrap();
        let first = attrs.read_blob().unwrap().unwrap();
        assert_eq!(notifier.refresh_count(), 1);
        assert!(!store.is_dirty());

        // clean flush: no new bytes, but the shell is still signaled
        store.flush().unwrap();
        let second = attrs.read_blob().unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(notifier.refresh_count(), 2);
        assert_eq!(codec::encode(store.records()).unwrap(), second);
    }
}
