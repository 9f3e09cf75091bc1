//! Pane and tab topology: moves, closes, merges and the workspace actor

mod common;

use common::{TestContext, counting_surfaces};
use par_note::error::WorkspaceError;
use par_note::pane::PaneId;
use par_note::save::SaveOutcome;
use par_note::session::persister::WorkspacePersister;
use par_note::session::storage::load_state_from;
use par_note::tab::TabState;
use par_note::workspace::{Workspace, WorkspaceEvent, actor};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

fn workspace(ctx: &TestContext) -> (Workspace, Arc<AtomicUsize>) {
    let (surfaces, disposed) = counting_surfaces();
    (Workspace::new(ctx.coordinator.clone(), surfaces, 2), disposed)
}

fn drain(events: &mut broadcast::Receiver<WorkspaceEvent>) -> Vec<WorkspaceEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

#[tokio::test]
async fn test_move_keeps_tab_alive_with_unsaved_content() {
    let ctx = TestContext::new();
    let (mut ws, disposed) = workspace(&ctx);
    let a = ctx.write_note("a.md", "alpha");

    let id = ws.open_document(&a, None).await.unwrap();
    ws.apply_edit(id, "alpha edited").unwrap();
    let left = ws.active_pane_id();
    let right = ws.split().unwrap();

    assert!(ws.move_tab_between_panes(id, left, right, 0).unwrap());

    assert_eq!(ws.find_tab(id), Some(right));
    assert_eq!(ws.active_pane_id(), right);
    assert_eq!(ws.pane(right).unwrap().active_tab_id(), Some(id));
    let tab = ws.tab(id).unwrap();
    assert_eq!(tab.pane_id(), right);
    assert_eq!(tab.surface().serialized_content(), "alpha edited");
    assert_eq!(ws.tab_state(id), Some(TabState::Dirty));
    assert_eq!(disposed.load(Ordering::SeqCst), 0, "moves never dispose");
    assert!(ws.pane(left).unwrap().is_empty(), "source pane is kept");
}

#[tokio::test]
async fn test_move_of_tab_not_in_source_fails() {
    let ctx = TestContext::new();
    let (mut ws, _) = workspace(&ctx);
    let a = ctx.write_note("a.md", "alpha");
    let id = ws.open_document(&a, None).await.unwrap();
    let left = ws.active_pane_id();
    let right = ws.split().unwrap();

    let err = ws.move_tab_between_panes(id, right, left, 0).unwrap_err();
    assert!(matches!(err, WorkspaceError::TabNotInPane { tab, pane } if tab == id && pane == right));
    assert_eq!(ws.find_tab(id), Some(left));
}

#[tokio::test]
async fn test_close_tab_disposes_once_and_merges_empty_pane() {
    let ctx = TestContext::new();
    let (mut ws, disposed) = workspace(&ctx);
    let a = ctx.write_note("a.md", "alpha");
    let b = ctx.write_note("b.md", "beta");

    let first = ws.open_document(&a, None).await.unwrap();
    let left = ws.active_pane_id();
    let right = ws.split().unwrap();
    let second = ws.open_document(&b, None).await.unwrap();
    assert_eq!(ws.find_tab(second), Some(right));

    let report = ws.close_tab(second).await.unwrap();

    assert!(report.pane_removed);
    assert!(report.save_error.is_none());
    assert_eq!(ws.pane_count(), 1);
    assert_eq!(ws.active_pane_id(), left);
    assert_eq!(ws.find_tab(first), Some(left));
    assert!(ws.find_tab(second).is_none());
    assert!(!ctx.coordinator.is_open(second));
    assert_eq!(disposed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_closing_last_tab_keeps_the_only_pane() {
    let ctx = TestContext::new();
    let (mut ws, _) = workspace(&ctx);
    let a = ctx.write_note("a.md", "alpha");
    let id = ws.open_document(&a, None).await.unwrap();

    let report = ws.close_tab(id).await.unwrap();

    assert!(!report.pane_removed);
    assert_eq!(ws.pane_count(), 1);
    assert!(ws.active_pane().is_empty());
    assert_eq!(ws.active_tab_id(), None);
}

#[tokio::test]
async fn test_close_dirty_tab_saves_it() {
    let ctx = TestContext::new();
    let (mut ws, _) = workspace(&ctx);
    let a = ctx.write_note("a.md", "alpha");
    let id = ws.open_document(&a, None).await.unwrap();
    ws.apply_edit(id, "alpha v2").unwrap();

    ws.close_tab(id).await.unwrap();

    assert_eq!(common::read_note(&a), "alpha v2");
}

#[tokio::test]
async fn test_close_tab_with_failing_save_reports_and_keeps_checkpoint() {
    let ctx = TestContext::new();
    let (mut ws, disposed) = workspace(&ctx);
    let a = ctx.write_note("a.md", "before");
    let id = ws.open_document(&a, None).await.unwrap();
    ws.apply_edit(id, "unsaved").unwrap();
    ctx.storage.fail_writes_to(&a, true);

    let report = ws.close_tab(id).await.unwrap();

    assert!(report.save_error.is_some());
    assert!(ws.find_tab(id).is_none(), "the tab closes anyway");
    assert_eq!(disposed.load(Ordering::SeqCst), 1);
    assert_eq!(common::read_note(&a), "before");
    assert!(ctx.checkpoint_path(id).exists());
}

#[tokio::test]
async fn test_close_pane_moves_tabs_without_dispose() {
    let ctx = TestContext::new();
    let (mut ws, disposed) = workspace(&ctx);
    let a = ctx.write_note("a.md", "alpha");
    let b = ctx.write_note("b.md", "beta");
    let c = ctx.write_note("c.md", "gamma");

    let first = ws.open_document(&a, None).await.unwrap();
    let left = ws.active_pane_id();
    let right = ws.split().unwrap();
    let second = ws.open_document(&b, None).await.unwrap();
    let third = ws.open_document(&c, None).await.unwrap();

    assert!(ws.close_pane(right).unwrap());

    assert_eq!(ws.pane_count(), 1);
    assert_eq!(ws.active_pane_id(), left);
    let order: Vec<_> = ws.active_pane().tabs().iter().map(|t| t.id).collect();
    assert_eq!(order, vec![first, second, third]);
    assert!(ws.active_pane().tabs().iter().all(|t| t.pane_id() == left));
    assert_eq!(disposed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_opening_open_note_selects_existing_tab() {
    let ctx = TestContext::new();
    let (mut ws, _) = workspace(&ctx);
    let a = ctx.write_note("a.md", "alpha");
    let b = ctx.write_note("b.md", "beta");

    let first = ws.open_document(&a, None).await.unwrap();
    ws.open_document(&b, None).await.unwrap();
    let left = ws.active_pane_id();
    ws.split().unwrap();

    let again = ws.open_document(&a, None).await.unwrap();

    assert_eq!(again, first);
    assert_eq!(ws.pane(left).unwrap().tab_count(), 2);
    assert_eq!(ws.active_pane_id(), left);
    assert_eq!(ws.active_tab_id(), Some(first));
}

#[tokio::test]
async fn test_failed_open_adds_no_tab() {
    let ctx = TestContext::new();
    let (mut ws, disposed) = workspace(&ctx);
    let binary = ctx.note("binary.md");
    std::fs::write(&binary, [0xff, 0xfe, 0x00]).unwrap();

    let result = ws.open_document(&binary, None).await;

    assert!(result.is_err());
    assert!(ws.active_pane().is_empty());
    assert_eq!(disposed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_next_and_prev_tab_wrap() {
    let ctx = TestContext::new();
    let (mut ws, _) = workspace(&ctx);
    let a = ws
        .open_document(&ctx.write_note("a.md", "a"), None)
        .await
        .unwrap();
    let b = ws
        .open_document(&ctx.write_note("b.md", "b"), None)
        .await
        .unwrap();
    let c = ws
        .open_document(&ctx.write_note("c.md", "c"), None)
        .await
        .unwrap();
    assert_eq!(ws.active_tab_id(), Some(c));

    ws.next_tab();
    assert_eq!(ws.active_tab_id(), Some(a));
    ws.prev_tab();
    assert_eq!(ws.active_tab_id(), Some(c));
    ws.prev_tab();
    assert_eq!(ws.active_tab_id(), Some(b));
}

#[tokio::test]
async fn test_topology_events() {
    let ctx = TestContext::new();
    let (mut ws, _) = workspace(&ctx);
    let mut events = ws.subscribe();
    let a = ctx.write_note("a.md", "alpha");

    let id = ws.open_document(&a, None).await.unwrap();
    let left = ws.active_pane_id();
    assert_eq!(
        drain(&mut events),
        vec![
            WorkspaceEvent::TabOpened { tab: id, pane: left },
            WorkspaceEvent::TabSelectionChanged {
                pane: left,
                tab: Some(id)
            },
        ]
    );

    let right = ws.split().unwrap();
    assert_eq!(
        drain(&mut events),
        vec![
            WorkspaceEvent::PaneAdded(right),
            WorkspaceEvent::ActivePaneChanged(right),
        ]
    );

    ws.switch_to_pane(0);
    ws.close_pane(left).unwrap();
    let events = drain(&mut events);
    assert!(events.contains(&WorkspaceEvent::TabMoved {
        tab: id,
        from: left,
        to: right
    }));
    assert!(events.contains(&WorkspaceEvent::PaneRemoved(left)));
    assert_eq!(ws.active_pane_id(), right);
}

#[tokio::test]
async fn test_concurrent_moves_of_same_tab_apply_once() {
    let ctx = TestContext::new();
    let (ws, disposed) = workspace(&ctx);
    let (handle, task) = actor::spawn(ws, None);
    let a = ctx.write_note("a.md", "alpha");

    let id = handle.open(a, None).await.unwrap();
    let left = PaneId(1);
    let right = handle.split().await.unwrap().unwrap();

    let (first, second) = tokio::join!(
        handle.move_tab(id, left, right, 0),
        handle.move_tab(id, left, right, 0)
    );
    let results = [first, second];
    assert_eq!(results.iter().filter(|r| matches!(r, Ok(true))).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(WorkspaceError::TabNotInPane { .. })))
            .count(),
        1
    );
    assert_eq!(disposed.load(Ordering::SeqCst), 0);

    handle.shutdown(Duration::from_secs(2)).await.unwrap();
    task.await.unwrap();
    assert!(matches!(
        handle.snapshot().await,
        Err(WorkspaceError::ActorClosed)
    ));
}

#[tokio::test]
async fn test_actor_persists_topology_and_flushes_on_shutdown() {
    let ctx = TestContext::new();
    let (ws, _) = workspace(&ctx);
    let state_path = ctx.dir.path().join("workspace.yaml");
    let persister = WorkspacePersister::new(ctx.storage.clone(), state_path.clone());
    let (handle, task) = actor::spawn(ws, Some(persister));

    let a = ctx.write_note("a.md", "alpha");
    let b = ctx.write_note("b.md", "beta");
    let first = handle.open(a.clone(), None).await.unwrap();
    handle.split().await.unwrap();
    let second = handle.open(b.clone(), None).await.unwrap();
    handle.apply_edit(second, "beta v2").await.unwrap();

    let failures = handle.shutdown(Duration::from_secs(2)).await.unwrap();
    task.await.unwrap();

    assert!(failures.is_empty());
    assert_eq!(common::read_note(&b), "beta v2", "exit flush wrote the note");

    let state = load_state_from(ctx.storage.as_ref(), &state_path)
        .unwrap()
        .expect("state file written");
    assert_eq!(state.pane_count, 2);
    assert_eq!(state.active_pane_index, 1);
    assert_eq!(state.panes[0].tabs.len(), 1);
    assert!(state.panes[0].tabs[0].path.ends_with("a.md"));
    assert_eq!(state.panes[0].active_tab_id, Some(first));
    assert_eq!(state.panes[1].tabs[0].title, "b");
    assert_eq!(state.panes[1].active_tab_id, Some(second));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_edits_keep_flowing_while_another_note_saves_slowly() {
    let ctx = TestContext::new();
    let (ws, _) = workspace(&ctx);
    let (handle, task) = actor::spawn(ws, None);
    let a = handle
        .open(ctx.write_note("a.md", "alpha"), None)
        .await
        .unwrap();
    let b = handle
        .open(ctx.write_note("b.md", "beta"), None)
        .await
        .unwrap();
    handle.apply_edit(a, "alpha v2").await.unwrap();
    ctx.storage.set_write_delay(Duration::from_millis(1000));

    let saver = handle.clone();
    let save = tokio::spawn(async move { saver.save_now(a).await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = Instant::now();
    handle.apply_edit(b, "beta v2").await.unwrap();
    handle.split().await.unwrap();
    let waited = started.elapsed();
    assert!(waited < Duration::from_millis(500), "edit waited {waited:?}");

    assert_eq!(save.await.unwrap().unwrap(), SaveOutcome::Written);
    ctx.storage.set_write_delay(Duration::ZERO);
    handle.shutdown(Duration::from_secs(5)).await.unwrap();
    task.await.unwrap();
    assert_eq!(common::read_note(&ctx.note("b.md")), "beta v2");
}

#[tokio::test]
async fn test_close_tab_through_actor_saves_and_detaches() {
    let ctx = TestContext::new();
    let (ws, disposed) = workspace(&ctx);
    let (handle, task) = actor::spawn(ws, None);
    let a = ctx.write_note("a.md", "alpha");
    let id = handle.open(a.clone(), None).await.unwrap();
    handle.apply_edit(id, "alpha v2").await.unwrap();

    let report = handle.close_tab(id).await.unwrap();

    assert!(report.save_error.is_none());
    assert_eq!(common::read_note(&a), "alpha v2");
    assert_eq!(handle.snapshot().await.unwrap().tab_count(), 0);
    assert!(!ctx.coordinator.is_open(id));
    assert_eq!(disposed.load(Ordering::SeqCst), 1);

    // Reopening right after the close reads the saved note
    let again = handle.open(a, None).await.unwrap();
    assert_eq!(ctx.coordinator.get_content(again).as_deref(), Some("alpha v2"));

    handle.shutdown(Duration::from_secs(2)).await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn test_open_into_unknown_pane_fails_through_actor() {
    let ctx = TestContext::new();
    let (ws, _) = workspace(&ctx);
    let (handle, task) = actor::spawn(ws, None);

    let result = handle
        .open(ctx.write_note("a.md", "alpha"), Some(PaneId(42)))
        .await;

    assert!(matches!(result, Err(WorkspaceError::PaneNotFound(PaneId(42)))));
    assert!(ctx.coordinator.open_documents().is_empty());
    handle.shutdown(Duration::from_secs(2)).await.unwrap();
    task.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_is_bounded_when_state_write_hangs() {
    let ctx = TestContext::new();
    let (ws, _) = workspace(&ctx);
    let state_path = ctx.dir.path().join("workspace.yaml");
    let persister = WorkspacePersister::new(ctx.storage.clone(), state_path);
    let (handle, task) = actor::spawn(ws, Some(persister));
    ctx.storage.set_write_delay(Duration::from_secs(2));
    // Starts a state file write that outlives the exit budget
    handle.split().await.unwrap();

    let started = Instant::now();
    let failures = handle.shutdown(Duration::from_millis(200)).await.unwrap();
    task.await.unwrap();

    assert!(failures.is_empty());
    let waited = started.elapsed();
    assert!(waited < Duration::from_secs(1), "shutdown took {waited:?}");
}
