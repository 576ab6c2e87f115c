// tests/state_ordering.rs
mod common;
use crate::common::{TestWorkspace, init_tracing, server_for, with_timeout};

use std::error::Error;

use kiln::types::ExitStatus;

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn no_state_before_the_first_build() -> TestResult {
    with_timeout(async {
        init_tracing();
        let ws = TestWorkspace::new();
        let (server, _compiler) = server_for(&ws, &[("a", &[])]);

        assert!(server.latest_saved_state().is_none());
        assert!(server.last_successful_result_for("a").is_none());
        Ok(())
    })
    .await
}

#[tokio::test]
async fn generations_never_go_backward() -> TestResult {
    with_timeout(async {
        init_tracing();
        let ws = TestWorkspace::new();
        let (server, _compiler) = server_for(&ws, &[("a", &[]), ("b", &["a"])]);

        let mut last_generation = 0;
        for round in 0..3 {
            ws.write_source("a", "Main.scala", &format!("object a // round {round}\n"));
            let state = server.compile("b").await?;
            assert_eq!(state.status(), ExitStatus::Ok);

            let latest = server.latest_saved_state().expect("state published");
            assert!(
                latest.generation() >= last_generation,
                "latest state may never be older than one previously observed"
            );
            last_generation = latest.generation();
        }
        Ok(())
    })
    .await
}

#[tokio::test]
async fn older_snapshots_stay_valid_after_newer_publishes() -> TestResult {
    with_timeout(async {
        init_tracing();
        let ws = TestWorkspace::new();
        let (server, _compiler) = server_for(&ws, &[("a", &[]), ("b", &["a"])]);

        let first = server.compile("b").await?;
        let first_result = first.result_for("b").unwrap().clone();

        ws.write_source("a", "Main.scala", "object a { val v2 = () }\n");
        let second = server.compile("b").await?;

        // The old snapshot still reads consistently.
        let still_there = first.result_for("b").unwrap();
        assert!(first_result.same_result(still_there));

        // And it differs by value from the new one.
        let newer = second.result_for("b").unwrap();
        assert!(!first_result.same_result(newer));
        assert!(second.generation() > first.generation());
        Ok(())
    })
    .await
}

#[tokio::test]
async fn failed_runs_publish_a_state_without_advancing_success_results() -> TestResult {
    with_timeout(async {
        init_tracing();
        let ws = TestWorkspace::new();
        let (server, compiler) = server_for(&ws, &[("a", &[]), ("b", &["a"])]);

        let ok = server.compile("b").await?;
        assert_eq!(ok.status(), ExitStatus::Ok);
        let successful = server.last_successful_result_for("b").unwrap();

        compiler.fail("b");
        ws.write_source("b", "Main.scala", "object b { broken }\n");
        let failed = server.compile("b").await?;
        assert_eq!(failed.status(), ExitStatus::CompilationError);

        // The failed attempt is observable, the successful result retained.
        assert_eq!(
            server.latest_saved_state().unwrap().status(),
            ExitStatus::CompilationError
        );
        let retained = server.last_successful_result_for("b").unwrap();
        assert!(successful.same_result(&retained));
        Ok(())
    })
    .await
}
