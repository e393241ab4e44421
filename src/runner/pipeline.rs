//! One extract → resolve → run → validate cycle.
//!
//! The pipeline owns everything an attempt needs except the oracle, so a
//! response that is already in hand can be checked without one.

use std::sync::Arc;
use std::time::Instant;

use log::{debug, info};
use tokio::sync::mpsc::UnboundedSender;

use super::signal::{NoOpSignalChecker, SignalChecker};
use crate::deps::{DependencyResolver, PackageInstaller};
use crate::domain::{Attempt, ExecutionOutcome, LoopEvent, LoopResult, LoopState, LoopStatus, Verdict};
use crate::error::Result;
use crate::extract::CodeBlockExtractor;
use crate::sandbox::CodeRunner;
use crate::validation::OutputValidator;

/// Reason recorded when a run completed but printed nothing
pub const NO_OUTPUT_REASON: &str = "no output produced";

/// Where a single attempt ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStep {
    /// No fenced code block in the response
    NoCode,
    /// Ran, printed output, and the validator accepted it
    Passed,
    /// Crashed, or completed with unusable output
    Failed,
    /// A stop signal arrived between transitions
    Cancelled,
}

/// Runs attempts against an injected runner and installer.
pub struct AttemptPipeline<R, I>
where
    R: CodeRunner,
    I: PackageInstaller,
{
    extractor: CodeBlockExtractor,
    resolver: DependencyResolver<I>,
    runner: Arc<R>,
    validator: OutputValidator,
    events: Option<UnboundedSender<LoopEvent>>,
    signal: Arc<dyn SignalChecker>,
}

impl<R, I> AttemptPipeline<R, I>
where
    R: CodeRunner,
    I: PackageInstaller,
{
    /// Create a pipeline with the default Python extractor and validator.
    pub fn new(runner: Arc<R>, installer: Arc<I>) -> Self {
        Self {
            extractor: CodeBlockExtractor::python(),
            resolver: DependencyResolver::new(installer),
            runner,
            validator: OutputValidator::default(),
            events: None,
            signal: Arc::new(NoOpSignalChecker),
        }
    }

    pub fn with_extractor(mut self, extractor: CodeBlockExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_validator(mut self, validator: OutputValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Send progress events to `tx`; a dropped receiver is ignored.
    pub fn with_events(mut self, tx: UnboundedSender<LoopEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn with_signal(mut self, signal: Arc<dyn SignalChecker>) -> Self {
        self.signal = signal;
        self
    }

    pub fn extractor(&self) -> &CodeBlockExtractor {
        &self.extractor
    }

    /// Check one response with no oracle and no fixing.
    pub async fn check(&self, source_text: &str) -> Result<LoopResult> {
        let (attempt, step) = self.run_attempt(0, source_text).await?;
        let status = match step {
            AttemptStep::NoCode => LoopStatus::NoCodeFound,
            AttemptStep::Passed => success_status(&attempt),
            AttemptStep::Failed => LoopStatus::ExhaustedRetries { last_attempt: 0 },
            AttemptStep::Cancelled => LoopStatus::Cancelled,
        };
        let result = LoopResult::new(status, vec![attempt]);
        self.finish(&result);
        Ok(result)
    }

    /// Run a single attempt over `source_text`.
    ///
    /// The returned attempt is complete and will not change again.
    pub async fn run_attempt(&self, index: u32, source_text: &str) -> Result<(Attempt, AttemptStep)> {
        let started = Instant::now();
        let mut attempt = Attempt::new(index, source_text);
        self.emit(LoopEvent::AttemptStarted { index });

        let step = self.drive(&mut attempt).await?;

        attempt.duration_ms = started.elapsed().as_millis() as u64;
        debug!("Attempt {} finished as {:?} in {}ms", index + 1, step, attempt.duration_ms);
        self.emit(LoopEvent::AttemptFinished {
            attempt: Box::new(attempt.clone()),
        });
        Ok((attempt, step))
    }

    async fn drive(&self, attempt: &mut Attempt) -> Result<AttemptStep> {
        let index = attempt.index;

        self.enter(index, LoopState::Extracting);
        let Some(code) = self.extractor.extract(&attempt.source_text) else {
            info!("Attempt {}: no {} code block in response", index + 1, self.extractor.language());
            return Ok(AttemptStep::NoCode);
        };
        attempt.extracted_code = Some(code.clone());

        if self.stop_requested().await? {
            return Ok(AttemptStep::Cancelled);
        }
        self.enter(index, LoopState::Resolving);
        attempt.dependency_log = self.resolver.resolve(&code).await;
        for record in &attempt.dependency_log {
            self.emit(LoopEvent::DependencyResolved {
                index,
                record: record.clone(),
            });
        }

        if self.stop_requested().await? {
            return Ok(AttemptStep::Cancelled);
        }
        self.enter(index, LoopState::Running);
        let report = self.runner.run(&code).await;
        let outcome = ExecutionOutcome::from_run(report.success, report.captured);
        let crashed = outcome.is_crash();
        attempt.execution_outcome = Some(outcome);

        if crashed {
            info!("Attempt {}: {}", index + 1, attempt.failure_reason().unwrap_or_default());
            return Ok(AttemptStep::Failed);
        }

        if self.stop_requested().await? {
            return Ok(AttemptStep::Cancelled);
        }
        self.enter(index, LoopState::Validating);
        let verdict = match &attempt.execution_outcome {
            Some(ExecutionOutcome::RanWithOutput(captured)) => self.validator.validate(captured),
            _ => Verdict::Invalid(NO_OUTPUT_REASON.to_string()),
        };
        let valid = verdict.is_valid();
        attempt.validation_verdict = Some(verdict);

        if valid {
            info!("Attempt {}: output accepted", index + 1);
            Ok(AttemptStep::Passed)
        } else {
            info!("Attempt {}: {}", index + 1, attempt.failure_reason().unwrap_or_default());
            Ok(AttemptStep::Failed)
        }
    }

    pub(crate) fn emit(&self, event: LoopEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    pub(crate) fn enter(&self, index: u32, state: LoopState) {
        debug!("Attempt {} -> {}", index + 1, state);
        self.emit(LoopEvent::StateEntered { index, state });
    }

    pub(crate) async fn stop_requested(&self) -> Result<bool> {
        let stop = self.signal.should_stop().await?;
        if stop {
            info!("Stop requested, cancelling healing loop");
        }
        Ok(stop)
    }

    pub(crate) fn finish(&self, result: &LoopResult) {
        self.emit(LoopEvent::Finished {
            status: result.status.clone(),
            attempts: result.attempt_count(),
        });
    }
}

/// Success status built from a passed attempt's code and output.
pub(crate) fn success_status(attempt: &Attempt) -> LoopStatus {
    LoopStatus::Success {
        code: attempt.extracted_code.clone().unwrap_or_default(),
        output: attempt
            .execution_outcome
            .as_ref()
            .and_then(ExecutionOutcome::output)
            .unwrap_or_default()
            .to_string(),
    }
}
