#![allow(dead_code)]

pub use kiln_test_utils::{FakeCompiler, TestWorkspace, init_tracing, with_timeout};

use std::sync::Arc;
use std::time::Duration;

use kiln::BuildServer;
use kiln::graph::BuildGraph;
use kiln::types::{HashSettings, WatchSettings};

/// Short debounce durations so watch tests stay fast.
pub fn test_watch_settings() -> WatchSettings {
    WatchSettings {
        debounce_window: Duration::from_millis(50),
        zero_size_grace: Duration::from_millis(80),
    }
}

/// A server over real on-disk projects with a recording fake compiler.
///
/// `specs` is `(name, deps)` per project; projects are created under the
/// workspace with a seeded source file each.
pub fn server_for(
    workspace: &TestWorkspace,
    specs: &[(&str, &[&str])],
) -> (BuildServer, Arc<FakeCompiler>) {
    let projects = specs
        .iter()
        .map(|(name, deps)| workspace.project(name, deps))
        .collect();
    let graph = BuildGraph::new(projects).expect("test fixture graph must be valid");
    let compiler = Arc::new(FakeCompiler::new());
    let server = BuildServer::with_settings(
        graph,
        Arc::clone(&compiler) as Arc<dyn kiln::compiler::Compiler>,
        test_watch_settings(),
        HashSettings { parallelism: 2 },
    );
    (server, compiler)
}

/// Poll `condition` every 10 ms until it holds or ~2 s elapse.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Sleep long enough for one debounce window (plus slack) to elapse.
pub async fn let_window_elapse() {
    tokio::time::sleep(Duration::from_millis(200)).await;
}
