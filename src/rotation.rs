//! Background rotation engine
//!
//! Keeps, per workspace, the configured root directories and a pool of
//! candidate files not yet shown this cycle. Rotation draws uniformly at
//! random without replacement; an emptied pool triggers a full rescan on
//! the next draw, so every candidate is shown once per scan cycle before
//! any repeat.

use rand::Rng;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::scanner;
use crate::store::BackgroundStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotateOutcome {
    /// A candidate was applied to the workspace's record
    Applied(PathBuf),
    /// No valid candidate; the workspace sits out this cycle
    Skipped,
}

#[derive(Default)]
pub struct RotationEngine {
    pools: HashMap<u32, Vec<PathBuf>>,
    folders: HashMap<u32, Vec<PathBuf>>,
}

impl RotationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every workspace's folder configuration.
    ///
    /// A workspace whose folder list is unchanged keeps its current pool,
    /// so a reload that only touched unrelated keys does not restart the
    /// scan cycle. Changed workspaces start over; removed ones are dropped.
    pub fn set_folders(&mut self, map: HashMap<u32, Vec<PathBuf>>) {
        let old = std::mem::take(&mut self.folders);
        self.pools.retain(|ws, _| map.get(ws) == old.get(ws));
        self.folders = map;
        debug!(workspaces = self.folders.len(), "replaced folder configuration");
    }

    /// Workspaces with a folder configuration, ascending
    pub fn workspaces(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.folders.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn pool_len(&self, workspace: u32) -> usize {
        self.pools.get(&workspace).map_or(0, Vec::len)
    }

    pub fn folder_count(&self, workspace: u32) -> usize {
        self.folders.get(&workspace).map_or(0, Vec::len)
    }

    /// Advance one workspace to its next wallpaper.
    ///
    /// The store mutation is left unflushed; [`RotationEngine::rotate_all`]
    /// owns the flush boundary.
    pub fn rotate_one<R: Rng>(
        &mut self,
        rng: &mut R,
        workspace: u32,
        store: &mut BackgroundStore,
    ) -> Result<RotateOutcome, StoreError> {
        if self.pools.get(&workspace).is_none_or(Vec::is_empty) {
            self.rescan(workspace);
        }

        let pool = self.pools.entry(workspace).or_default();
        while !pool.is_empty() {
            let picked = rng.random_range(0..pool.len());
            let candidate = pool[picked].clone();

            // files may have vanished since the scan
            if !candidate.is_file() {
                pool.swap_remove(picked);
                debug!(workspace, path = %candidate.display(), "dropping vanished candidate");
                continue;
            }

            match store.set_background(Some(&candidate), workspace) {
                Ok(()) => {
                    pool.swap_remove(picked);
                    info!(
                        workspace,
                        remaining = pool.len(),
                        path = %candidate.display(),
                        "rotated background"
                    );
                    return Ok(RotateOutcome::Applied(candidate));
                }
                Err(StoreError::ValidationFailure(_)) => {
                    // lost the race with a deletion between the check and the apply
                    pool.swap_remove(picked);
                    continue;
                }
                Err(e) => return Err(e),
            }
        }

        info!(workspace, "no rotation candidates, skipping");
        Ok(RotateOutcome::Skipped)
    }

    /// Rotate every configured workspace, then flush the store exactly
    /// once so the shell receives a single refresh per cycle.
    pub fn rotate_all<R: Rng>(
        &mut self,
        rng: &mut R,
        store: &mut BackgroundStore,
    ) -> Result<(), StoreError> {
        for workspace in self.workspaces() {
            if let Err(e) = self.rotate_one(rng, workspace, store) {
                warn!(workspace, error = %e, "rotation failed for workspace");
            }
        }
        store.flush()
    }

    /// Repopulate a workspace's pool from a full rescan of its folders
    fn rescan(&mut self, workspace: u32) {
        let Some(folders) = self.folders.get(&workspace) else {
            return;
        };
        let mut pool = Vec::new();
        for root in folders {
            pool.extend(scanner::scan(root));
        }
        debug!(workspace, candidates = pool.len(), "rescanned rotation pool");
        self.pools.insert(workspace, pool);
    }
}
