//! Scripted scenarios and step-by-step sessions
//!
//! A [`Scenario`] is a list of steps. Each step pairs the line shown in the
//! script pane with an action run against a [`Sandbox`] and its
//! [`Bindings`]. A [`Session`] runs a scenario to completion, capturing a
//! [`Snapshot`] before the first step and after every step, and then lets the
//! viewer move through that history in both directions.
//!
//! A step that fails halts the run. Its snapshot is still recorded (with the
//! error attached and echoed to the terminal) so the failure can be inspected.

pub mod library;

use crate::config::SandboxConfig;
use crate::sandbox::bindings::Bindings;
use crate::sandbox::engine::Sandbox;
use crate::sandbox::errors::SandboxError;
use crate::snapshot::{Snapshot, SnapshotManager};
use std::fmt;
use tracing::{debug, info};

/// Action run for one scenario step
pub type StepAction = Box<dyn Fn(&mut Sandbox, &mut Bindings) -> Result<(), SandboxError>>;

/// One line of a scenario script
pub struct Step {
    pub source: String,
    action: StepAction,
}

impl Step {
    pub fn run(&self, sandbox: &mut Sandbox, bindings: &mut Bindings) -> Result<(), SandboxError> {
        (self.action)(sandbox, bindings)
    }
}

/// A named, scripted walk through the sandbox
pub struct Scenario {
    pub name: String,
    pub title: String,
    pub summary: String,
    steps: Vec<Step>,
}

impl Scenario {
    pub fn new(name: impl Into<String>, title: impl Into<String>) -> Self {
        Scenario {
            name: name.into(),
            title: title.into(),
            summary: String::new(),
            steps: Vec::new(),
        }
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn step<F>(mut self, source: impl Into<String>, action: F) -> Self
    where
        F: Fn(&mut Sandbox, &mut Bindings) -> Result<(), SandboxError> + 'static,
    {
        self.steps.push(Step {
            source: source.into(),
            action: Box::new(action),
        });
        self
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("steps", &self.steps.len())
            .finish()
    }
}

/// A scenario run with its snapshot history
pub struct Session {
    scenario: Scenario,
    sandbox: Sandbox,
    bindings: Bindings,
    snapshot_manager: SnapshotManager,
    history_position: usize,
    error: Option<SandboxError>,
    finished: bool,
}

impl Session {
    pub fn new(scenario: Scenario, config: &SandboxConfig) -> Self {
        Session {
            scenario,
            sandbox: Sandbox::new(config),
            bindings: Bindings::new(),
            snapshot_manager: SnapshotManager::new(config.snapshot_memory_limit),
            history_position: 0,
            error: None,
            finished: false,
        }
    }

    /// Run every step, stopping at the first failure
    ///
    /// Whatever stops the run (a failing step or a full snapshot history) is
    /// kept and reported by [`Session::error`].
    pub fn run(&mut self) -> Result<(), SandboxError> {
        info!(scenario = %self.scenario.name, steps = self.scenario.len(), "running scenario");
        let result = self.run_steps();
        if let Err(err) = &result {
            self.error = Some(err.clone());
        }
        self.finished = true;
        result
    }

    fn run_steps(&mut self) -> Result<(), SandboxError> {
        self.take_snapshot(None, None)?;

        for index in 0..self.scenario.steps.len() {
            self.sandbox.set_step(index);
            let result = self.scenario.steps[index].run(&mut self.sandbox, &mut self.bindings);
            self.sandbox.sync_teardown();

            match result {
                Ok(()) => self.take_snapshot(Some(index), None)?,
                Err(err) => {
                    debug!(step = index, error = %err, "step failed");
                    self.sandbox.report_error(&err);
                    self.take_snapshot(Some(index), Some(err.clone()))?;
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    fn take_snapshot(
        &mut self,
        step: Option<usize>,
        error: Option<SandboxError>,
    ) -> Result<(), SandboxError> {
        let snapshot = Snapshot {
            heap: self.sandbox.heap().clone(),
            bindings: self.bindings.clone(),
            terminal: self.sandbox.terminal().clone(),
            step,
            error,
            leaked: self.sandbox.heap().leaked_nodes(),
        };
        self.snapshot_manager.push(snapshot)?;
        self.history_position = self.snapshot_manager.len() - 1;
        Ok(())
    }

    // ========== History navigation ==========

    /// Move to the previous snapshot
    pub fn step_backward(&mut self) -> Result<(), SandboxError> {
        if self.history_position == 0 {
            return Err(SandboxError::HistoryOperationFailed {
                message: "Already at the beginning of the scenario".to_string(),
            });
        }
        self.history_position -= 1;
        Ok(())
    }

    /// Move to the next snapshot
    pub fn step_forward(&mut self) -> Result<(), SandboxError> {
        if self.history_position + 1 >= self.snapshot_manager.len() {
            return Err(SandboxError::HistoryOperationFailed {
                message: "No more snapshots available (scenario finished)".to_string(),
            });
        }
        self.history_position += 1;
        Ok(())
    }

    /// Rewind to the snapshot taken before the first step
    pub fn rewind_to_start(&mut self) -> Result<(), SandboxError> {
        if self.snapshot_manager.is_empty() {
            return Err(SandboxError::HistoryOperationFailed {
                message: "No snapshots available".to_string(),
            });
        }
        self.history_position = 0;
        Ok(())
    }

    /// Jump to the last snapshot
    pub fn jump_to_end(&mut self) -> Result<(), SandboxError> {
        if self.snapshot_manager.is_empty() {
            return Err(SandboxError::HistoryOperationFailed {
                message: "No snapshots available".to_string(),
            });
        }
        self.history_position = self.snapshot_manager.len() - 1;
        Ok(())
    }

    // ========== Getter methods for UI ==========

    /// Get the snapshot at the current history position
    pub fn current(&self) -> Option<&Snapshot> {
        self.snapshot_manager.get(self.history_position)
    }

    /// Get the step the current snapshot was taken after
    pub fn current_step(&self) -> Option<usize> {
        self.current().and_then(|snapshot| snapshot.step)
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    /// Get the sandbox in its final state
    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    /// Get the error that halted the run, if any
    pub fn error(&self) -> Option<&SandboxError> {
        self.error.as_ref()
    }

    /// Get the current history position
    pub fn history_position(&self) -> usize {
        self.history_position
    }

    /// Get the total number of snapshots
    pub fn total_snapshots(&self) -> usize {
        self.snapshot_manager.len()
    }

    /// Check if the run has finished
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Get the final terminal output, one string per line
    pub fn transcript(&self) -> Vec<String> {
        self.sandbox.terminal().get_output()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::value::Value;

    fn counter() -> Scenario {
        Scenario::new("counter", "Counter")
            .step("let a = shared(1);", |sb, vars| {
                let a = sb.heap_mut().create_shared("a", Value::Int(1))?;
                vars.bind("a", a);
                Ok(())
            })
            .step("print(*a);", |sb, vars| {
                let a = vars.shared("a")?;
                let value = sb.heap().get(&a)?.clone();
                sb.print(format!("a = {}", value));
                Ok(())
            })
            .step("release(a);", |sb, vars| {
                let a = vars.shared("a")?;
                sb.heap_mut().release_shared(a)
            })
    }

    #[test]
    fn test_session_records_every_step() {
        let mut session = Session::new(counter(), &SandboxConfig::default());
        assert!(session.run().is_ok());
        assert!(session.is_finished());
        assert_eq!(session.total_snapshots(), 4);
        assert_eq!(session.history_position(), 3);
        assert_eq!(session.transcript(), vec!["a = 1", "~a"]);

        session.rewind_to_start().unwrap();
        assert_eq!(session.current_step(), None);
        assert!(session.step_backward().is_err());

        session.step_forward().unwrap();
        let snapshot = session.current().unwrap();
        assert_eq!(snapshot.step, Some(0));
        assert_eq!(snapshot.heap.live_count(), 1);
        assert!(snapshot.terminal.is_empty());

        session.jump_to_end().unwrap();
        assert_eq!(session.current().unwrap().heap.live_count(), 0);
        assert!(session.step_forward().is_err());
    }

    #[test]
    fn test_failing_step_halts_and_is_recorded() {
        let scenario = counter().step("release(a);", |sb, vars| {
            let a = vars.shared("a")?;
            sb.heap_mut().release_shared(a)
        });
        let mut session = Session::new(scenario, &SandboxConfig::default());

        let result = session.run();
        assert!(
            matches!(result, Err(SandboxError::DoubleRelease { .. })),
            "second release should fail: {:?}",
            result
        );
        let last = session.current().unwrap();
        assert_eq!(last.step, Some(3));
        assert_eq!(last.error, result.err());
        assert!(session.transcript()[2].starts_with("error: Double release"));
    }
}
