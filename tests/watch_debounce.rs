// tests/watch_debounce.rs
//
// Session-level debounce behaviour, driven through a caller-supplied
// notification stream so no real filesystem watcher is involved.
mod common;
use crate::common::{
    TestWorkspace, eventually, init_tracing, let_window_elapse, server_for, with_timeout,
};

use std::error::Error;

use kiln::types::ExitStatus;
use kiln::watch::{EventKind, FileEvent};
use tokio::sync::mpsc;

type TestResult = Result<(), Box<dyn Error>>;

const CHAIN: &[(&str, &[&str])] = &[("a", &[]), ("b", &["a"])];

fn modified(path: std::path::PathBuf, size: u64) -> FileEvent {
    FileEvent {
        path,
        kind: EventKind::Modified,
        size_hint: Some(size),
    }
}

#[tokio::test]
async fn rapid_writes_in_one_window_cause_exactly_one_iteration() -> TestResult {
    with_timeout(async {
        init_tracing();
        let ws = TestWorkspace::new();
        let (server, compiler) = server_for(&ws, CHAIN);

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = server.watch_with_source("b", rx)?;

        // Initial build runs once before the session goes idle.
        assert!(eventually(|| compiler.invocation_count("b") == 1).await);
        assert_eq!(handle.iterations(), 0);

        let changed = ws.source_file("a", "Main.scala");
        for _ in 0..5 {
            tx.send(modified(changed.clone(), 42))?;
        }

        assert!(eventually(|| handle.iterations() == 1).await);
        let_window_elapse().await;
        assert_eq!(handle.iterations(), 1, "one burst, one iteration");

        handle.cancel();
        assert_eq!(handle.join().await?, ExitStatus::Cancelled);
        Ok(())
    })
    .await
}

#[tokio::test]
async fn zero_size_write_followed_by_real_write_is_one_iteration() -> TestResult {
    with_timeout(async {
        init_tracing();
        let ws = TestWorkspace::new();
        let (server, compiler) = server_for(&ws, CHAIN);

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = server.watch_with_source("b", rx)?;
        assert!(eventually(|| compiler.invocation_count("b") == 1).await);

        let changed = ws.source_file("a", "Main.scala");
        tx.send(modified(changed.clone(), 0))?;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        tx.send(modified(changed, 42))?;

        assert!(eventually(|| handle.iterations() == 1).await);
        let_window_elapse().await;
        assert_eq!(handle.iterations(), 1, "one logical edit, one iteration");

        handle.cancel();
        handle.join().await?;
        Ok(())
    })
    .await
}

#[tokio::test]
async fn zero_size_write_alone_never_triggers() -> TestResult {
    with_timeout(async {
        init_tracing();
        let ws = TestWorkspace::new();
        let (server, compiler) = server_for(&ws, CHAIN);

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = server.watch_with_source("b", rx)?;
        assert!(eventually(|| compiler.invocation_count("b") == 1).await);

        tx.send(modified(ws.source_file("a", "Main.scala"), 0))?;

        // Wait well past both the grace period and the debounce window.
        let_window_elapse().await;
        let_window_elapse().await;
        assert_eq!(handle.iterations(), 0);

        handle.cancel();
        handle.join().await?;
        Ok(())
    })
    .await
}

#[tokio::test]
async fn out_of_scope_events_are_ignored() -> TestResult {
    with_timeout(async {
        init_tracing();
        let ws = TestWorkspace::new();
        let (server, compiler) = server_for(&ws, CHAIN);

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = server.watch_with_source("b", rx)?;
        assert!(eventually(|| compiler.invocation_count("b") == 1).await);

        tx.send(modified(std::path::PathBuf::from("/somewhere/else.scala"), 42))?;

        let_window_elapse().await;
        assert_eq!(handle.iterations(), 0);

        handle.cancel();
        handle.join().await?;
        Ok(())
    })
    .await
}

#[tokio::test]
async fn cancel_mid_idle_stops_all_future_iterations() -> TestResult {
    with_timeout(async {
        init_tracing();
        let ws = TestWorkspace::new();
        let (server, compiler) = server_for(&ws, CHAIN);

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = server.watch_with_source("b", rx)?;
        assert!(eventually(|| compiler.invocation_count("b") == 1).await);

        handle.cancel();

        // Modifications after cancellation are inert.
        let _ = tx.send(modified(ws.source_file("a", "Main.scala"), 42));
        let_window_elapse().await;

        assert_eq!(handle.iterations(), 0);
        assert_eq!(handle.join().await?, ExitStatus::Cancelled);
        Ok(())
    })
    .await
}

#[tokio::test]
async fn closed_notification_stream_terminates_the_session_with_an_error() -> TestResult {
    with_timeout(async {
        init_tracing();
        let ws = TestWorkspace::new();
        let (server, compiler) = server_for(&ws, CHAIN);

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = server.watch_with_source("b", rx)?;
        assert!(eventually(|| compiler.invocation_count("b") == 1).await);

        drop(tx);
        assert!(handle.join().await.is_err());
        Ok(())
    })
    .await
}
