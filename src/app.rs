//! Application wiring: storage → save coordinator → workspace actor →
//! workspace persister.
//!
//! Every collaborator is passed in at construction; nothing is looked up
//! globally.

use crate::config::Config;
use crate::document::DocumentId;
use crate::editor::SurfaceFactory;
use crate::error::SaveError;
use crate::save::SaveCoordinator;
use crate::session::persister::WorkspacePersister;
use crate::session::restore::RestoreReport;
use crate::session::storage::load_state_from;
use crate::storage::Storage;
use crate::workspace::{Workspace, WorkspaceHandle, actor};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// A running note workspace
pub struct App {
    config: Config,
    storage: Arc<dyn Storage>,
    coordinator: SaveCoordinator,
    workspace: WorkspaceHandle,
    actor: JoinHandle<()>,
    state_path: PathBuf,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("state_path", &self.state_path)
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

impl App {
    /// Build every component and start the workspace actor.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: Config, storage: Arc<dyn Storage>, surfaces: SurfaceFactory) -> Self {
        let state_path = config.state_file_path();
        let coordinator = SaveCoordinator::new(
            Arc::clone(&storage),
            config.save.clone(),
            config.checkpoint_dir(),
        );
        let workspace = Workspace::new(coordinator.clone(), surfaces, config.workspace.max_panes);
        let persister = WorkspacePersister::new(Arc::clone(&storage), state_path.clone());
        let (handle, task) = actor::spawn(workspace, Some(persister));

        log::info!(
            "par-note {} started (state file {:?})",
            crate::VERSION,
            state_path
        );
        Self {
            config,
            storage,
            coordinator,
            workspace: handle,
            actor: task,
            state_path,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn coordinator(&self) -> &SaveCoordinator {
        &self.coordinator
    }

    pub fn workspace(&self) -> &WorkspaceHandle {
        &self.workspace
    }

    /// Restore the previous session's topology.
    ///
    /// `Ok(None)` when restore is disabled or there is nothing to restore. A
    /// corrupt state file is logged and ignored; the workspace starts empty.
    pub async fn restore(&self) -> Result<Option<RestoreReport>> {
        if !self.config.workspace.restore_on_startup {
            crate::debug_info!("SESSION", "Workspace restore disabled");
            return Ok(None);
        }

        let storage = Arc::clone(&self.storage);
        let path = self.state_path.clone();
        let loaded = tokio::task::spawn_blocking(move || load_state_from(storage.as_ref(), &path))
            .await
            .context("Workspace state load task failed")?;

        let state = match loaded {
            Ok(Some(state)) => state,
            Ok(None) => return Ok(None),
            Err(e) => {
                log::warn!("Ignoring unreadable workspace state: {:#}", e);
                return Ok(None);
            }
        };
        let report = self
            .workspace
            .restore(state)
            .await
            .context("Workspace actor stopped during restore")?;
        Ok(Some(report))
    }

    /// Persist the topology, flush dirty notes within the configured exit
    /// timeout and stop the actor. Returns the notes that failed to save.
    pub async fn shutdown(self) -> Result<Vec<(DocumentId, SaveError)>> {
        let timeout = self.config.save.exit_save_timeout();
        let failures = match self.workspace.shutdown(timeout).await {
            Ok(failures) => failures,
            Err(e) => {
                // Timed out: checkpoints cover whatever was not written
                log::warn!("Exit save incomplete: {}", e);
                Vec::new()
            }
        };
        if let Err(e) = self.actor.await {
            log::error!("Workspace actor panicked: {}", e);
        }
        log::info!("par-note shut down");
        Ok(failures)
    }
}
