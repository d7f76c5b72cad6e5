//! Workspace progression store.
//!
//! [`WorkspaceStore`] is the async contract the shell talks to.
//! [`KvWorkspaceStore`] keeps each workspace's progression as one JSON value
//! under `workspace.<id>.progression` in a [`KvStore`].

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::core::{Stage, WorkspaceProgression};
use crate::error::{FoundryError, Result};
use crate::storage::{KvStore, KvStoreExt};

/// Reads and updates workspace progression.
#[async_trait]
pub trait WorkspaceStore: Send + Sync {
    /// Current progression, or `None` if the workspace has none yet.
    async fn get_progression(&self, workspace_id: &str) -> Result<Option<WorkspaceProgression>>;

    /// Raise the onboarding step to at least `step`.
    ///
    /// Creates the workspace if needed. A lower step leaves the stored value
    /// alone. Returns the progression as stored afterwards.
    async fn advance_onboarding(
        &self,
        workspace_id: &str,
        step: u32,
    ) -> Result<WorkspaceProgression>;

    /// Set the onboarding step exactly, including backwards.
    ///
    /// Fails with `WorkspaceNotFound` if the workspace doesn't exist.
    async fn reset_onboarding(&self, workspace_id: &str, step: u32)
        -> Result<WorkspaceProgression>;

    /// Change the company stage, creating the workspace if needed.
    async fn set_stage(&self, workspace_id: &str, stage: Stage) -> Result<WorkspaceProgression>;
}

#[async_trait]
impl<T: WorkspaceStore + ?Sized> WorkspaceStore for Arc<T> {
    async fn get_progression(&self, workspace_id: &str) -> Result<Option<WorkspaceProgression>> {
        (**self).get_progression(workspace_id).await
    }

    async fn advance_onboarding(
        &self,
        workspace_id: &str,
        step: u32,
    ) -> Result<WorkspaceProgression> {
        (**self).advance_onboarding(workspace_id, step).await
    }

    async fn reset_onboarding(
        &self,
        workspace_id: &str,
        step: u32,
    ) -> Result<WorkspaceProgression> {
        (**self).reset_onboarding(workspace_id, step).await
    }

    async fn set_stage(&self, workspace_id: &str, stage: Stage) -> Result<WorkspaceProgression> {
        (**self).set_stage(workspace_id, stage).await
    }
}

/// Key under which a workspace's progression is stored.
pub fn progression_key(workspace_id: &str) -> String {
    format!("workspace.{}.progression", workspace_id)
}

/// Workspace store over a key-value store.
///
/// Read-modify-write cycles are serialized by an internal lock, so two
/// concurrent advances can't lose each other's update.
#[derive(Debug)]
pub struct KvWorkspaceStore<K: KvStore> {
    kv: K,
    write_lock: Mutex<()>,
}

impl<K: KvStore> KvWorkspaceStore<K> {
    pub fn new(kv: K) -> Self {
        Self {
            kv,
            write_lock: Mutex::new(()),
        }
    }

    /// The underlying key-value store.
    pub fn kv(&self) -> &K {
        &self.kv
    }

    fn write_guard(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn load(&self, workspace_id: &str) -> Result<Option<WorkspaceProgression>> {
        validate_workspace_id(workspace_id)?;
        Ok(self.kv.get(&progression_key(workspace_id), None))
    }

    fn store(&self, progression: &WorkspaceProgression) -> Result<()> {
        self.kv
            .set(&progression_key(&progression.workspace_id), progression)
    }

    /// Apply `update` to the stored progression (or a fresh one) and persist
    /// it if `update` reports a change.
    fn upsert(
        &self,
        workspace_id: &str,
        update: impl FnOnce(&mut WorkspaceProgression) -> bool,
    ) -> Result<WorkspaceProgression> {
        let _guard = self.write_guard();
        let existing = self.load(workspace_id)?;
        let created = existing.is_none();
        let mut progression =
            existing.unwrap_or_else(|| WorkspaceProgression::new(workspace_id));
        let changed = update(&mut progression);
        if changed || created {
            self.store(&progression)?;
        }
        Ok(progression)
    }
}

#[async_trait]
impl<K: KvStore> WorkspaceStore for KvWorkspaceStore<K> {
    async fn get_progression(&self, workspace_id: &str) -> Result<Option<WorkspaceProgression>> {
        self.load(workspace_id)
    }

    async fn advance_onboarding(
        &self,
        workspace_id: &str,
        step: u32,
    ) -> Result<WorkspaceProgression> {
        let progression = self.upsert(workspace_id, |p| p.advance_to(step))?;
        if progression.onboarding_step > step {
            tracing::debug!(
                workspace = workspace_id,
                requested = step,
                current = progression.onboarding_step,
                "advance below current step ignored"
            );
        }
        Ok(progression)
    }

    async fn reset_onboarding(
        &self,
        workspace_id: &str,
        step: u32,
    ) -> Result<WorkspaceProgression> {
        let _guard = self.write_guard();
        let mut progression = self
            .load(workspace_id)?
            .ok_or_else(|| FoundryError::workspace_not_found(workspace_id))?;
        let from = progression.onboarding_step;
        progression.reset_to(step);
        self.store(&progression)?;
        tracing::info!(workspace = workspace_id, from, to = step, "onboarding reset");
        Ok(progression)
    }

    async fn set_stage(&self, workspace_id: &str, stage: Stage) -> Result<WorkspaceProgression> {
        self.upsert(workspace_id, |p| {
            let changed = p.stage != stage;
            p.set_stage(stage);
            changed
        })
    }
}

/// Workspace ids become part of storage keys.
fn validate_workspace_id(workspace_id: &str) -> Result<()> {
    let valid = !workspace_id.is_empty()
        && workspace_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'));
    if valid {
        Ok(())
    } else {
        Err(FoundryError::invalid_state(format!(
            "invalid workspace id '{}'",
            workspace_id
        )))
    }
}
