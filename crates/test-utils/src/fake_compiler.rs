use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use kiln::cache::CompileStatus;
use kiln::compiler::{CompileOutput, Compiler};
use kiln::graph::Project;
use tokio_util::sync::CancellationToken;

/// A fake compiler that:
/// - records every invocation (project name, in call order)
/// - reports a scripted status per project (default: success)
/// - on success, writes a fresh marker classfile into the project's out
///   directory (if it exists), so dependents observe changed upstream output
///   exactly like they would with a real compiler
/// - optionally sleeps before answering, honouring the cancellation token,
///   so tests can exercise single-flight and cancellation paths.
#[derive(Debug, Default)]
pub struct FakeCompiler {
    invocations: Mutex<Vec<String>>,
    outcomes: Mutex<HashMap<String, CompileStatus>>,
    delay: Mutex<Option<Duration>>,
}

impl FakeCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a status for the given project.
    pub fn set_status(&self, project: &str, status: CompileStatus) {
        self.outcomes
            .lock()
            .unwrap()
            .insert(project.to_string(), status);
    }

    /// Script a failure for the given project.
    pub fn fail(&self, project: &str) {
        self.set_status(project, CompileStatus::Failure);
    }

    /// Make every compilation take at least `delay`.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// All recorded invocations, in call order.
    pub fn invocations(&self) -> Vec<String> {
        self.invocations.lock().unwrap().clone()
    }

    /// How many times `project` was compiled.
    pub fn invocation_count(&self, project: &str) -> usize {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .filter(|name| name.as_str() == project)
            .count()
    }
}

impl Compiler for FakeCompiler {
    fn compile<'a>(
        &'a self,
        project: &'a Project,
        _classpath: &'a [PathBuf],
        token: &'a CancellationToken,
    ) -> Pin<Box<dyn Future<Output = CompileOutput> + Send + 'a>> {
        Box::pin(async move {
            self.invocations.lock().unwrap().push(project.name.clone());

            let delay = *self.delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::select! {
                    _ = token.cancelled() => return CompileOutput::cancelled(),
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            let status = self
                .outcomes
                .lock()
                .unwrap()
                .get(&project.name)
                .copied()
                .unwrap_or(CompileStatus::Success);

            match status {
                CompileStatus::Success => {
                    // Mimic a real compiler: output bytes differ per compile,
                    // so dependents see a changed classpath entry.
                    if project.out_dir.is_dir() {
                        let count = self.invocations.lock().unwrap().len();
                        let marker = project.out_dir.join("Main.class");
                        let _ = std::fs::write(
                            &marker,
                            format!("{}-build-{count}", project.name),
                        );
                    }
                    CompileOutput::success(vec![project.out_dir.clone()])
                }
                CompileStatus::Failure => {
                    CompileOutput::failure(vec![format!("{}: scripted failure", project.name)])
                }
                CompileStatus::Cancelled => CompileOutput::cancelled(),
            }
        })
    }
}
