//! Single-writer actor owning the [`Workspace`].
//!
//! Every topology mutation is sent as a [`WorkspaceCommand`] over an `mpsc`
//! channel and answered on a `oneshot`. The actor applies commands one at a
//! time, in arrival order, so a move or merge can never observe a
//! half-applied mutation. After each command that changed the topology it
//! hands a snapshot to the [`WorkspacePersister`].
//!
//! The actor itself never waits on note I/O. Opening reads the note on a
//! spawned task and sends the document back to the actor for its tab;
//! closing detaches the tab first and runs the final save on a spawned task;
//! saves run entirely off the actor. Edits and topology commands for other
//! documents keep flowing while a write is slow.

use super::{CloseReport, Workspace, WorkspaceEvent};
use crate::document::DocumentId;
use crate::error::{SaveError, WorkspaceError};
use crate::pane::PaneId;
use crate::save::SaveOutcome;
use crate::session::WorkspaceState;
use crate::session::capture::capture_workspace;
use crate::session::persister::WorkspacePersister;
use crate::session::restore::{RestoreReport, restore_workspace};
use crate::tab::TabId;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;

/// Queue depth for pending commands
const COMMAND_CAPACITY: usize = 64;

type Reply<T> = oneshot::Sender<T>;

/// Requests handled by the workspace actor
#[derive(Debug)]
pub enum WorkspaceCommand {
    Open {
        path: PathBuf,
        pane: Option<PaneId>,
        reply: Reply<Result<TabId, WorkspaceError>>,
    },
    CloseTab {
        tab: TabId,
        reply: Reply<Result<CloseReport, WorkspaceError>>,
    },
    Split {
        reply: Reply<Option<PaneId>>,
    },
    /// Close a pane; `None` closes the active one
    ClosePane {
        pane: Option<PaneId>,
        reply: Reply<Result<bool, WorkspaceError>>,
    },
    MoveTab {
        tab: TabId,
        source: PaneId,
        dest: PaneId,
        index: usize,
        reply: Reply<Result<bool, WorkspaceError>>,
    },
    SelectTab {
        tab: TabId,
        reply: Reply<Result<(), WorkspaceError>>,
    },
    NextTab {
        reply: Reply<()>,
    },
    PrevTab {
        reply: Reply<()>,
    },
    SwitchToPane {
        index: usize,
        reply: Reply<bool>,
    },
    ApplyEdit {
        tab: TabId,
        content: String,
        reply: Reply<Result<(), WorkspaceError>>,
    },
    SaveNow {
        tab: TabId,
        reply: Reply<Result<SaveOutcome, WorkspaceError>>,
    },
    SaveAll {
        reply: Reply<Vec<(DocumentId, SaveError)>>,
    },
    Restore {
        state: WorkspaceState,
        reply: Reply<RestoreReport>,
    },
    Snapshot {
        reply: Reply<WorkspaceState>,
    },
    Subscribe {
        reply: Reply<broadcast::Receiver<WorkspaceEvent>>,
    },
    /// Finish persisting the topology, then flush every dirty note. Both
    /// share the `timeout` budget. The actor stops after replying.
    Shutdown {
        timeout: Duration,
        reply: Reply<Result<Vec<(DocumentId, SaveError)>, SaveError>>,
    },
}

/// Cloneable handle for sending commands to the workspace actor
#[derive(Debug, Clone)]
pub struct WorkspaceHandle {
    tx: mpsc::Sender<WorkspaceCommand>,
}

/// A document the coordinator finished opening, waiting for its tab
struct Opened {
    tab: TabId,
    pane: Option<PaneId>,
    reply: Reply<Result<TabId, WorkspaceError>>,
}

/// Start the actor on the current runtime
pub fn spawn(
    workspace: Workspace,
    persister: Option<WorkspacePersister>,
) -> (WorkspaceHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
    let (opened_tx, opened_rx) = mpsc::unbounded_channel();
    let actor = Actor {
        workspace,
        persister,
        opened: opened_tx,
        io: JoinSet::new(),
    };
    let task = tokio::spawn(actor.run(rx, opened_rx));
    (WorkspaceHandle { tx }, task)
}

/// Owns the workspace. Topology changes run here, one at a time; note I/O
/// (opening, saving, closing documents) runs on spawned tasks so a slow write
/// never holds up edits or other documents.
struct Actor {
    workspace: Workspace,
    persister: Option<WorkspacePersister>,
    opened: mpsc::UnboundedSender<Opened>,
    /// Spawned note I/O; each task answers its caller itself
    io: JoinSet<()>,
}

impl Actor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<WorkspaceCommand>,
        mut opened: mpsc::UnboundedReceiver<Opened>,
    ) {
        crate::debug_info!("WORKSPACE", "Workspace actor started");
        loop {
            let flow = tokio::select! {
                biased;
                Some(done) = opened.recv() => {
                    let result = self.workspace.attach_document(done.tab, done.pane);
                    let _ = done.reply.send(result);
                    ControlFlow::Continue(())
                }
                command = commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => ControlFlow::Break(()),
                },
            };
            if flow.is_break() {
                break;
            }
            if self.workspace.take_topology_changed()
                && let Some(persister) = &self.persister
            {
                persister.save(capture_workspace(&self.workspace));
            }
            while let Some(joined) = self.io.try_join_next() {
                if let Err(e) = joined {
                    log::error!("Workspace I/O task failed: {}", e);
                }
            }
        }
        crate::debug_info!("WORKSPACE", "Workspace actor stopped");
    }

    /// Apply one command. A dropped reply receiver is not an error: the
    /// caller gave up waiting, the mutation still happened.
    async fn handle(&mut self, command: WorkspaceCommand) -> ControlFlow<()> {
        let workspace = &mut self.workspace;
        match command {
            WorkspaceCommand::Open { path, pane, reply } => {
                if let Err(e) = workspace.check_pane(pane) {
                    let _ = reply.send(Err(e));
                    return ControlFlow::Continue(());
                }
                let coordinator = workspace.coordinator().clone();
                let opened = self.opened.clone();
                self.io.spawn(async move {
                    match coordinator.open(&path).await {
                        // The tab itself is created back on the actor
                        Ok(tab) => {
                            let _ = opened.send(Opened { tab, pane, reply });
                        }
                        Err(e) => {
                            let _ = reply.send(Err(e.into()));
                        }
                    }
                });
            }
            WorkspaceCommand::CloseTab { tab, reply } => match workspace.detach_tab(tab) {
                Ok(pane_removed) => {
                    let coordinator = workspace.coordinator().clone();
                    self.io.spawn(async move {
                        let save_error = coordinator.close(tab).await.err();
                        let _ = reply.send(Ok(CloseReport {
                            tab,
                            pane_removed,
                            save_error,
                        }));
                    });
                }
                Err(e) => {
                    let _ = reply.send(Err(e));
                }
            },
            WorkspaceCommand::Split { reply } => {
                let _ = reply.send(workspace.split());
            }
            WorkspaceCommand::ClosePane { pane, reply } => {
                let pane = pane.unwrap_or_else(|| workspace.active_pane_id());
                let _ = reply.send(workspace.close_pane(pane));
            }
            WorkspaceCommand::MoveTab {
                tab,
                source,
                dest,
                index,
                reply,
            } => {
                let _ = reply.send(workspace.move_tab_between_panes(tab, source, dest, index));
            }
            WorkspaceCommand::SelectTab { tab, reply } => {
                let _ = reply.send(workspace.select_tab(tab));
            }
            WorkspaceCommand::NextTab { reply } => {
                workspace.next_tab();
                let _ = reply.send(());
            }
            WorkspaceCommand::PrevTab { reply } => {
                workspace.prev_tab();
                let _ = reply.send(());
            }
            WorkspaceCommand::SwitchToPane { index, reply } => {
                let _ = reply.send(workspace.switch_to_pane(index));
            }
            WorkspaceCommand::ApplyEdit {
                tab,
                content,
                reply,
            } => {
                let _ = reply.send(workspace.apply_edit(tab, &content));
            }
            WorkspaceCommand::SaveNow { tab, reply } => {
                if workspace.find_tab(tab).is_none() {
                    let _ = reply.send(Err(WorkspaceError::TabNotFound(tab)));
                    return ControlFlow::Continue(());
                }
                let coordinator = workspace.coordinator().clone();
                self.io.spawn(async move {
                    let _ = reply.send(coordinator.save_now(tab).await.map_err(Into::into));
                });
            }
            WorkspaceCommand::SaveAll { reply } => {
                let coordinator = workspace.coordinator().clone();
                self.io.spawn(async move {
                    let _ = reply.send(coordinator.save_all().await);
                });
            }
            WorkspaceCommand::Restore { state, reply } => {
                // Startup only: runs before any edit can be queued
                let _ = reply.send(restore_workspace(workspace, &state).await);
            }
            WorkspaceCommand::Snapshot { reply } => {
                let _ = reply.send(capture_workspace(workspace));
            }
            WorkspaceCommand::Subscribe { reply } => {
                let _ = reply.send(workspace.subscribe());
            }
            WorkspaceCommand::Shutdown { timeout, reply } => {
                let _ = reply.send(self.shutdown(timeout).await);
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// Persist the final topology, let running closes and saves finish, then
    /// flush every dirty note. All three share one `timeout` budget.
    async fn shutdown(
        &mut self,
        timeout: Duration,
    ) -> Result<Vec<(DocumentId, SaveError)>, SaveError> {
        let deadline = Instant::now() + timeout;

        if let Some(persister) = &self.persister {
            if self.workspace.take_topology_changed() {
                persister.save(capture_workspace(&self.workspace));
            }
            if tokio::time::timeout_at(deadline, persister.flush())
                .await
                .is_err()
            {
                log::warn!(
                    "Workspace state not written within {:?}; exiting without it",
                    timeout
                );
            }
        }

        let io = &mut self.io;
        let drained = tokio::time::timeout_at(deadline, async {
            while io.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            log::warn!("{} note operation(s) still running at exit", self.io.len());
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        self.workspace.coordinator().shutdown(remaining).await
    }
}

impl WorkspaceHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> WorkspaceCommand,
    ) -> Result<T, WorkspaceError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| WorkspaceError::ActorClosed)?;
        rx.await.map_err(|_| WorkspaceError::ActorClosed)
    }

    pub async fn open(
        &self,
        path: impl Into<PathBuf>,
        pane: Option<PaneId>,
    ) -> Result<TabId, WorkspaceError> {
        let path = path.into();
        self.request(|reply| WorkspaceCommand::Open { path, pane, reply })
            .await?
    }

    pub async fn close_tab(&self, tab: TabId) -> Result<CloseReport, WorkspaceError> {
        self.request(|reply| WorkspaceCommand::CloseTab { tab, reply })
            .await?
    }

    pub async fn split(&self) -> Result<Option<PaneId>, WorkspaceError> {
        self.request(|reply| WorkspaceCommand::Split { reply }).await
    }

    pub async fn close_pane(&self, pane: Option<PaneId>) -> Result<bool, WorkspaceError> {
        self.request(|reply| WorkspaceCommand::ClosePane { pane, reply })
            .await?
    }

    pub async fn move_tab(
        &self,
        tab: TabId,
        source: PaneId,
        dest: PaneId,
        index: usize,
    ) -> Result<bool, WorkspaceError> {
        self.request(|reply| WorkspaceCommand::MoveTab {
            tab,
            source,
            dest,
            index,
            reply,
        })
        .await?
    }

    pub async fn select_tab(&self, tab: TabId) -> Result<(), WorkspaceError> {
        self.request(|reply| WorkspaceCommand::SelectTab { tab, reply })
            .await?
    }

    pub async fn next_tab(&self) -> Result<(), WorkspaceError> {
        self.request(|reply| WorkspaceCommand::NextTab { reply }).await
    }

    pub async fn prev_tab(&self) -> Result<(), WorkspaceError> {
        self.request(|reply| WorkspaceCommand::PrevTab { reply }).await
    }

    pub async fn switch_to_pane(&self, index: usize) -> Result<bool, WorkspaceError> {
        self.request(|reply| WorkspaceCommand::SwitchToPane { index, reply })
            .await
    }

    pub async fn apply_edit(
        &self,
        tab: TabId,
        content: impl Into<String>,
    ) -> Result<(), WorkspaceError> {
        let content = content.into();
        self.request(|reply| WorkspaceCommand::ApplyEdit {
            tab,
            content,
            reply,
        })
        .await?
    }

    pub async fn save_now(&self, tab: TabId) -> Result<SaveOutcome, WorkspaceError> {
        self.request(|reply| WorkspaceCommand::SaveNow { tab, reply })
            .await?
    }

    pub async fn save_all(&self) -> Result<Vec<(DocumentId, SaveError)>, WorkspaceError> {
        self.request(|reply| WorkspaceCommand::SaveAll { reply }).await
    }

    pub async fn restore(&self, state: WorkspaceState) -> Result<RestoreReport, WorkspaceError> {
        self.request(|reply| WorkspaceCommand::Restore { state, reply })
            .await
    }

    /// Current topology as a persistable snapshot
    pub async fn snapshot(&self) -> Result<WorkspaceState, WorkspaceError> {
        self.request(|reply| WorkspaceCommand::Snapshot { reply }).await
    }

    pub async fn subscribe(&self) -> Result<broadcast::Receiver<WorkspaceEvent>, WorkspaceError> {
        self.request(|reply| WorkspaceCommand::Subscribe { reply }).await
    }

    pub async fn shutdown(
        &self,
        timeout: Duration,
    ) -> Result<Vec<(DocumentId, SaveError)>, WorkspaceError> {
        Ok(self
            .request(|reply| WorkspaceCommand::Shutdown { timeout, reply })
            .await??)
    }
}
