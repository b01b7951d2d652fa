//! Translates approved movement decisions into world move requests.

use skirmish_core::{
    ExecutorConfig, Millis, MovementDecision, PathOptions, Position,
};

use crate::oracle::MoveOracle;

/// Result of one execution attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    pub success: bool,
    /// Failure reason, for logs and the next tick's context.
    pub reason: Option<String>,
}

impl ExecutionOutcome {
    fn ok() -> Self {
        Self {
            success: true,
            reason: None,
        }
    }

    fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            reason: Some(reason.into()),
        }
    }
}

/// Executes approved decisions with its own rate limit.
///
/// The execution cooldown is independent of the arbiter's decision
/// cooldown: the arbiter limits how often the pipeline changes its mind,
/// this limits how often the actor is actually asked to walk. Failures
/// are reported, never retried here; the next tick re-derives everything.
pub struct MovementExecutor {
    config: ExecutorConfig,
    last_execution_at: Option<Millis>,
}

impl MovementExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            config,
            last_execution_at: None,
        }
    }

    /// Attempts to execute an approved decision.
    pub fn execute(
        &mut self,
        decision: &MovementDecision,
        current: Position,
        now: Millis,
        mover: &dyn MoveOracle,
    ) -> ExecutionOutcome {
        let Some(intent) = decision.intent.as_ref().filter(|_| decision.should_move) else {
            return ExecutionOutcome::failed("no approved intent");
        };

        if let Some(last) = self.last_execution_at
            && now - last < self.config.execution_cooldown_ms
        {
            tracing::debug!(
                "executor: {} suppressed by execution cooldown ({}ms since last)",
                intent.kind,
                now - last
            );
            return ExecutionOutcome::failed("execution cooldown");
        }

        // No-op guard: already standing on the requested tile.
        if intent.position == current {
            return ExecutionOutcome::failed("already at target position");
        }

        // Emergency movement may path through soft obstacles.
        let options = PathOptions {
            ignore_soft_obstacles: intent.kind.is_emergency(),
            precision: self.config.move_tolerance,
        };

        self.last_execution_at = Some(now);
        if mover.attempt_move(intent.position, self.config.move_tolerance, options) {
            tracing::debug!("executor: {} -> {}", intent.kind, intent.position);
            ExecutionOutcome::ok()
        } else {
            tracing::debug!("executor: world rejected {} -> {}", intent.kind, intent.position);
            ExecutionOutcome::failed("move rejected by world")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skirmish_core::{IntentKind, MovementIntent};
    use std::sync::Mutex;

    struct RecordingMover {
        accept: bool,
        calls: Mutex<Vec<(Position, PathOptions)>>,
    }

    impl RecordingMover {
        fn new(accept: bool) -> Self {
            Self {
                accept,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl MoveOracle for RecordingMover {
        fn attempt_move(&self, target: Position, _tolerance: i32, options: PathOptions) -> bool {
            self.calls.lock().unwrap().push((target, options));
            self.accept
        }
    }

    fn decision(kind: IntentKind, x: i32) -> MovementDecision {
        MovementDecision {
            should_move: true,
            intent: Some(MovementIntent {
                kind,
                position: Position::new(x, 0, 0),
                confidence: 0.8,
                source: "test".into(),
                created_at: 0,
                payload: None,
            }),
            confidence: 0.8,
            blocked: None,
        }
    }

    const HERE: Position = Position::new(0, 0, 0);

    #[test]
    fn executes_and_reports_success() {
        let mut executor = MovementExecutor::new(ExecutorConfig::default());
        let mover = RecordingMover::new(true);
        let outcome = executor.execute(&decision(IntentKind::Chase, 3), HERE, 1_000, &mover);
        assert!(outcome.success);
        assert_eq!(mover.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn cooldown_suppresses_back_to_back_moves() {
        let mut executor = MovementExecutor::new(ExecutorConfig::default());
        let mover = RecordingMover::new(true);
        assert!(executor.execute(&decision(IntentKind::Chase, 3), HERE, 1_000, &mover).success);

        let again = executor.execute(&decision(IntentKind::Chase, 4), HERE, 1_300, &mover);
        assert!(!again.success);
        assert_eq!(again.reason.as_deref(), Some("execution cooldown"));

        let later = executor.execute(&decision(IntentKind::Chase, 4), HERE, 1_700, &mover);
        assert!(later.success);
    }

    #[test]
    fn noop_when_already_at_target() {
        let mut executor = MovementExecutor::new(ExecutorConfig::default());
        let mover = RecordingMover::new(true);
        let outcome = executor.execute(&decision(IntentKind::Chase, 0), HERE, 1_000, &mover);
        assert!(!outcome.success);
        assert!(mover.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn emergency_kinds_use_permissive_pathing() {
        let mut executor = MovementExecutor::new(ExecutorConfig::default());
        let mover = RecordingMover::new(true);
        executor.execute(&decision(IntentKind::EmergencyEscape, 3), HERE, 1_000, &mover);

        let calls = mover.calls.lock().unwrap();
        assert!(calls[0].1.ignore_soft_obstacles);
    }

    #[test]
    fn world_rejection_is_reported_not_retried() {
        let mut executor = MovementExecutor::new(ExecutorConfig::default());
        let mover = RecordingMover::new(false);
        let outcome = executor.execute(&decision(IntentKind::Chase, 3), HERE, 1_000, &mover);
        assert!(!outcome.success);
        assert_eq!(outcome.reason.as_deref(), Some("move rejected by world"));
        assert_eq!(mover.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn blocked_decision_is_not_executed() {
        let mut executor = MovementExecutor::new(ExecutorConfig::default());
        let mover = RecordingMover::new(true);
        let blocked = MovementDecision {
            should_move: false,
            intent: None,
            confidence: 0.2,
            blocked: None,
        };
        let outcome = executor.execute(&blocked, HERE, 1_000, &mover);
        assert!(!outcome.success);
        assert!(mover.calls.lock().unwrap().is_empty());
    }
}
