//! The self-healing loop.
//!
//! Asks the oracle for code, pushes each response through the attempt
//! pipeline, and on failure asks again with a fixer prompt built from the
//! failed attempt. Every iteration starts from a fresh request: the oracle
//! never sees a conversation history, only the prompt built for that call.

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tokio::sync::mpsc::UnboundedSender;

use super::pipeline::{AttemptPipeline, AttemptStep, success_status};
use super::signal::SignalChecker;
use crate::deps::PackageInstaller;
use crate::domain::{Attempt, LoopEvent, LoopResult, LoopState, LoopStatus};
use crate::error::{MendError, Result};
use crate::llm::{CompletionRequest, LlmClient};
use crate::prompt::FixRequestBuilder;
use crate::sandbox::CodeRunner;

pub const DEFAULT_MAX_RETRIES: u32 = 4;
pub const DEFAULT_ORACLE_TIMEOUT_MS: u64 = 120_000;

pub const DEFAULT_SYSTEM_ROLE: &str = "You are a senior Python developer. Solve the task with a complete, \
self-contained Python script that prints its result to standard output. Declare any third-party packages \
on a comment line such as `# requires: pandas, requests`. Reply with the code in a single ```python fenced block.";

pub const DEFAULT_FIXER_ROLE: &str = "You are a debugging expert. You receive Python code that failed, \
together with the error or the unusable output it produced. Return a corrected, complete script in a \
single ```python fenced block and nothing else.";

/// Configuration for the HealingLoop.
#[derive(Debug, Clone)]
pub struct HealingLoopConfig {
    /// Fix attempts allowed after the first one
    pub max_retries: u32,
    /// Include a summary of every earlier failure in fixer prompts
    pub accumulate_history: bool,
    /// Budget for a single oracle call
    pub oracle_timeout_ms: u64,
    /// System role for the initial generation call
    pub system_role: String,
    /// System role for fix calls
    pub fixer_role: String,
    /// Max tokens requested per oracle call; None uses the client default
    pub max_tokens: Option<u32>,
}

impl Default for HealingLoopConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            accumulate_history: false,
            oracle_timeout_ms: DEFAULT_ORACLE_TIMEOUT_MS,
            system_role: DEFAULT_SYSTEM_ROLE.to_string(),
            fixer_role: DEFAULT_FIXER_ROLE.to_string(),
            max_tokens: None,
        }
    }
}

impl HealingLoopConfig {
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn accumulate_history(mut self, enabled: bool) -> Self {
        self.accumulate_history = enabled;
        self
    }

    pub fn oracle_timeout_ms(mut self, ms: u64) -> Self {
        self.oracle_timeout_ms = ms;
        self
    }
}

/// Drives extract → resolve → run → validate → fix until success or exhaustion.
///
/// Collaborators are injected: the oracle as an `LlmClient`, execution as a
/// `CodeRunner`, and provisioning as a `PackageInstaller`.
pub struct HealingLoop<L, R, I>
where
    L: LlmClient,
    R: CodeRunner,
    I: PackageInstaller,
{
    llm: Arc<L>,
    pipeline: AttemptPipeline<R, I>,
    fix_builder: FixRequestBuilder,
    config: HealingLoopConfig,
}

impl<L, R, I> HealingLoop<L, R, I>
where
    L: LlmClient,
    R: CodeRunner,
    I: PackageInstaller,
{
    pub fn new(llm: Arc<L>, pipeline: AttemptPipeline<R, I>) -> Self {
        Self::with_config(llm, pipeline, HealingLoopConfig::default())
    }

    pub fn with_config(llm: Arc<L>, pipeline: AttemptPipeline<R, I>, config: HealingLoopConfig) -> Self {
        let fix_builder = FixRequestBuilder::new().with_language(pipeline.extractor().language());
        Self {
            llm,
            pipeline,
            fix_builder,
            config,
        }
    }

    pub fn with_fix_builder(mut self, fix_builder: FixRequestBuilder) -> Self {
        self.fix_builder = fix_builder;
        self
    }

    pub fn with_events(mut self, tx: UnboundedSender<LoopEvent>) -> Self {
        self.pipeline = self.pipeline.with_events(tx);
        self
    }

    pub fn with_signal(mut self, signal: Arc<dyn SignalChecker>) -> Self {
        self.pipeline = self.pipeline.with_signal(signal);
        self
    }

    pub fn config(&self) -> &HealingLoopConfig {
        &self.config
    }

    /// Run the loop for `task` until a terminal status.
    ///
    /// Generated-code failures are data in the returned `LoopResult`; only
    /// oracle failures and timeouts come back as `Err`.
    pub async fn run(&self, task: &str) -> Result<LoopResult> {
        info!(
            "Starting healing loop (max_retries={}, model={})",
            self.config.max_retries,
            self.llm.model()
        );

        if self.pipeline.stop_requested().await? {
            return Ok(self.finish(LoopStatus::Cancelled, Vec::new()));
        }

        let mut attempts: Vec<Attempt> = Vec::new();
        let mut source_text = self.ask(&self.config.system_role, task).await?;
        let mut index: u32 = 0;

        loop {
            let (attempt, step) = self.pipeline.run_attempt(index, &source_text).await?;
            attempts.push(attempt);

            match step {
                AttemptStep::Passed => {
                    let status = success_status(&attempts[attempts.len() - 1]);
                    info!("Healing loop succeeded after {} attempt(s)", attempts.len());
                    return Ok(self.finish(status, attempts));
                }
                AttemptStep::Cancelled => return Ok(self.finish(LoopStatus::Cancelled, attempts)),
                AttemptStep::NoCode if index == 0 => {
                    return Ok(self.finish(LoopStatus::NoCodeFound, attempts));
                }
                AttemptStep::NoCode => {
                    // A fix response without code ends the loop; report the last real diagnostic
                    let last_attempt = last_diagnostic(&attempts).unwrap_or(index);
                    warn!("Fix response {} contained no code, giving up", index + 1);
                    return Ok(self.finish(LoopStatus::ExhaustedRetries { last_attempt }, attempts));
                }
                AttemptStep::Failed => {}
            }

            if index >= self.config.max_retries {
                warn!("Retries exhausted after {} attempt(s)", attempts.len());
                return Ok(self.finish(LoopStatus::ExhaustedRetries { last_attempt: index }, attempts));
            }

            if self.pipeline.stop_requested().await? {
                return Ok(self.finish(LoopStatus::Cancelled, attempts));
            }

            self.pipeline.enter(index, LoopState::Fixing);
            let prompt = if self.config.accumulate_history {
                self.fix_builder.build_with_history(&attempts)
            } else {
                self.fix_builder.build(&attempts[attempts.len() - 1])
            };
            source_text = self.ask(&self.config.fixer_role, &prompt).await?;
            index += 1;
        }
    }

    /// One oracle call under the configured timeout.
    async fn ask(&self, system_role: &str, prompt: &str) -> Result<String> {
        let mut request = CompletionRequest::new(system_role).with_user_message(prompt);
        if let Some(max_tokens) = self.config.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }

        let budget = Duration::from_millis(self.config.oracle_timeout_ms);
        let response = tokio::time::timeout(budget, self.llm.complete(request))
            .await
            .map_err(|_| MendError::OracleTimeout(self.config.oracle_timeout_ms))??;

        if response.stop_reason.is_truncated() {
            warn!("Oracle response hit the token limit; its code block may be incomplete");
        }
        Ok(response.content)
    }

    fn finish(&self, status: LoopStatus, attempts: Vec<Attempt>) -> LoopResult {
        let result = LoopResult::new(status, attempts);
        self.pipeline.finish(&result);
        result
    }
}

fn last_diagnostic(attempts: &[Attempt]) -> Option<u32> {
    attempts.iter().rev().find(|a| a.has_diagnostic()).map(|a| a.index)
}
