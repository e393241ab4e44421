use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use codemend::config::{GlobalConfig, load_config};
use codemend::domain::{LoopEvent, LoopResult};
use codemend::llm::{AnthropicClient, LlmClient};
use codemend::runner::{AttemptPipeline, CancelFlag, HealingLoop};
use codemend::sandbox::PythonSandbox;
use codemend::validation::OutputValidator;

mod cli;

use cli::report::{TraceWriter, render_event, render_result, render_usage};
use cli::{Cli, Commands};

fn setup_logging() -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("codemend")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("codemend.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

/// Returns true when the command reached its successful outcome.
async fn run_application(cli: &Cli, config: &GlobalConfig) -> Result<bool> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Run {
            task,
            task_file,
            json,
            trace,
        } => {
            let task = read_task(task.as_deref(), task_file.as_deref())?;
            handle_run_command(&task, *json, trace.as_deref(), cli.is_verbose(), config).await
        }
        Commands::Check { file, json } => handle_check_command(file, *json, cli.is_verbose(), config).await,
        Commands::Validate { file } => handle_validate_command(file.as_deref(), config),
    }
}

fn read_task(task: Option<&str>, task_file: Option<&Path>) -> Result<String> {
    let task = match (task, task_file) {
        (Some(task), _) => task.to_string(),
        (None, Some(path)) => {
            fs::read_to_string(path).context(format!("Failed to read task file {}", path.display()))?
        }
        (None, None) => eyre::bail!("a task or --task-file is required"),
    };
    if task.trim().is_empty() {
        eyre::bail!("task is empty");
    }
    Ok(task)
}

/// Print progress and write the trace while the loop runs.
fn spawn_event_consumer(
    mut rx: tokio::sync::mpsc::UnboundedReceiver<LoopEvent>,
    quiet: bool,
    verbose: bool,
    mut trace: Option<TraceWriter>,
) -> tokio::task::JoinHandle<Result<()>> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let (Some(writer), LoopEvent::AttemptFinished { attempt }) = (trace.as_mut(), &event) {
                writer.append(attempt)?;
            }
            if !quiet {
                if let Some(line) = render_event(&event, verbose) {
                    println!("{}", line);
                }
            }
        }
        Ok(())
    })
}

/// Cancel the loop at the next transition on Ctrl-C.
fn spawn_interrupt_handler(flag: CancelFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "Interrupted, stopping after the current step...".yellow());
            flag.cancel();
        }
    });
}

fn print_result(result: &LoopResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result).context("Failed to serialize result")?);
    } else {
        println!();
        print!("{}", render_result(result));
    }
    Ok(())
}

async fn handle_run_command(
    task: &str,
    json: bool,
    trace: Option<&Path>,
    verbose: bool,
    config: &GlobalConfig,
) -> Result<bool> {
    info!("Running healing loop for task ({} chars)", task.len());

    let llm = Arc::new(AnthropicClient::new(config.anthropic_config()).context("Failed to create LLM client")?);
    if !llm.is_ready() {
        eyre::bail!("LLM client is not ready; check {}", config.llm.api_key_env);
    }

    let trace = trace.map(TraceWriter::open).transpose()?;
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let consumer = spawn_event_consumer(rx, json, verbose, trace);

    let cancel = CancelFlag::new();
    spawn_interrupt_handler(cancel.clone());

    let pipeline = AttemptPipeline::new(
        Arc::new(PythonSandbox::new(config.sandbox_config())),
        Arc::new(config.installer()),
    )
    .with_extractor(config.extractor())
    .with_validator(OutputValidator::new(config.validator_config()));

    let healing = HealingLoop::with_config(llm.clone(), pipeline, config.healing_config())
        .with_events(tx)
        .with_signal(Arc::new(cancel));

    if !json {
        println!("{} {}", "Model:".dimmed(), llm.model());
    }

    let outcome = healing.run(task).await;
    // Dropping the loop closes the event channel so the consumer can finish
    drop(healing);
    consumer.await.context("Event consumer panicked")??;

    let result = outcome.context("Healing loop failed")?;
    print_result(&result, json)?;
    if !json {
        println!("{}", render_usage(&llm.total_usage(), llm.model()));
    }
    Ok(result.is_success())
}

async fn handle_check_command(file: &Path, json: bool, verbose: bool, config: &GlobalConfig) -> Result<bool> {
    info!("Checking response file {}", file.display());
    let text = fs::read_to_string(file).context(format!("Failed to read {}", file.display()))?;

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let consumer = spawn_event_consumer(rx, json, verbose, None);

    let pipeline = AttemptPipeline::new(
        Arc::new(PythonSandbox::new(config.sandbox_config())),
        Arc::new(config.installer()),
    )
    .with_extractor(config.extractor())
    .with_validator(OutputValidator::new(config.validator_config()))
    .with_events(tx);

    let outcome = pipeline.check(&text).await;
    drop(pipeline);
    consumer.await.context("Event consumer panicked")??;

    let result = outcome.context("Check failed")?;
    print_result(&result, json)?;
    Ok(result.is_success())
}

fn handle_validate_command(file: Option<&Path>, config: &GlobalConfig) -> Result<bool> {
    let text = match file {
        Some(path) => fs::read_to_string(path).context(format!("Failed to read {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read stdin")?;
            buffer
        }
    };

    let verdict = OutputValidator::new(config.validator_config()).validate(&text);
    match verdict.reason() {
        None => println!("{}", "valid".green()),
        Some(reason) => println!("{} {}", "invalid:".red(), reason),
    }
    Ok(verdict.is_valid())
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();

    let config = load_config(cli.config.as_ref(), &cli.overrides()).context("Failed to load configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    let succeeded = run_application(&cli, &config).await.context("Application failed")?;
    if !succeeded {
        std::process::exit(1);
    }

    Ok(())
}
