// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 agentflow contributors

//! Run command - execute a plan

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::{load_plan, report, Context, OutputFormat};
use crate::checkpoint::{CheckpointRecorder, CheckpointSink, RunId, RunMode};
use crate::engine::{ExecutionEngine, ExecutionOptions, ExecutionResult, PlanResult, ProviderUnitRunner};
use crate::plan::{DependencyGraph, PlanDefinition, PlanValidator};
use crate::provider::{Provider, ShellProvider};
use crate::utils::{create_progress_bar, format_duration, ProgressSink};

/// Flags for the run command
#[derive(Debug, Clone)]
pub struct RunArgs {
    pub plan: PathBuf,
    pub max_concurrent: Option<usize>,
    pub continue_on_failure: bool,
    pub no_checkpoint: bool,
    pub dry_run: bool,
    pub format: OutputFormat,
}

/// Everything needed to drive one attempt of a run
pub(crate) struct Attempt<'a> {
    pub plan: &'a PlanDefinition,
    pub graph: &'a DependencyGraph,
    pub provider: Arc<dyn Provider>,
    pub mode: RunMode,
    pub recorder: Option<Arc<CheckpointRecorder>>,
    pub prior_results: Vec<ExecutionResult>,
    pub format: OutputFormat,
}

/// Run a plan
pub async fn run(ctx: &Context, args: RunArgs) -> Result<()> {
    if !args.plan.exists() {
        return Err(miette::miette!(
            "Plan file not found: {}\n\n\
             Create an agentflow.yaml or pass the plan path explicitly.",
            args.plan.display()
        ));
    }

    let (plan, graph) = load_plan(&args.plan)?;

    let validation = PlanValidator::validate(&plan);
    if !validation.is_valid() {
        eprintln!("{}", "Plan validation failed:".red().bold());
        for error in &validation.errors {
            eprintln!("  {} {}", "✗".red(), error);
        }
        return Err(miette::miette!("Plan configuration is invalid"));
    }

    if validation.has_warnings() && ctx.verbose {
        eprintln!("{}", "Plan warnings:".yellow().bold());
        for warning in &validation.warnings {
            eprintln!("  {} {}", "⚠".yellow(), warning);
        }
        eprintln!();
    }

    // CLI flags win over the plan, the plan over agentflow.toml
    let mode = RunMode {
        parallel: graph.nodes().iter().any(|n| n.is_parallel()),
        continue_on_failure: args.continue_on_failure
            || plan.execution.continue_on_failure
            || ctx.config.execution.continue_on_failure,
        max_concurrent: args
            .max_concurrent
            .or(plan.execution.max_concurrent)
            .or(ctx.config.execution.max_concurrent),
        resumed: false,
    };

    if mode.max_concurrent == Some(0) {
        return Err(miette::miette!("--max-concurrent must be at least 1"));
    }

    if args.dry_run {
        print_plan(&plan, &graph, &mode);
        println!("{}", "Dry run: nothing was executed.".dimmed());
        return Ok(());
    }

    let provider = available_provider(ctx).await?;

    let recorder = if ctx.config.checkpoint.enabled && !args.no_checkpoint {
        let store = Arc::new(ctx.store());
        let run_id = RunId::generate();
        let recorder = CheckpointRecorder::begin(store, run_id, &plan, mode.clone())
            .await
            .map_err(report)?;
        Some(Arc::new(recorder))
    } else {
        None
    };

    execute(
        ctx,
        Attempt {
            plan: &plan,
            graph: &graph,
            provider,
            mode,
            recorder,
            prior_results: Vec::new(),
            format: args.format,
        },
    )
    .await
}

/// The configured provider, or an error if its command cannot be found
pub(crate) async fn available_provider(ctx: &Context) -> Result<Arc<dyn Provider>> {
    let provider = ShellProvider::from_config(&ctx.config.provider);
    if !provider.check_available().await.map_err(report)? {
        return Err(miette::miette!(
            "Provider command '{}' is not available (shell: {})",
            ctx.config.provider.command,
            ctx.config.provider.shell
        ));
    }
    Ok(Arc::new(provider))
}

/// Execute an attempt and report the result
pub(crate) async fn execute(ctx: &Context, attempt: Attempt<'_>) -> Result<()> {
    let text = attempt.format == OutputFormat::Text;
    if text {
        print_plan(attempt.plan, attempt.graph, &attempt.mode);
        if let Some(recorder) = &attempt.recorder {
            println!("{} {}", "Run id:".bold(), recorder.run_id());
            println!();
        }
    }

    let checkpoint_sink = attempt
        .recorder
        .clone()
        .map(|recorder| recorder as Arc<dyn CheckpointSink>);

    let remaining = attempt.graph.len().saturating_sub(
        attempt
            .prior_results
            .iter()
            .filter(|r| r.success && !r.skipped)
            .count(),
    );
    let progress = Arc::new(if text {
        ProgressSink::new(create_progress_bar(remaining as u64, "Running"), checkpoint_sink)
    } else {
        ProgressSink::hidden(checkpoint_sink)
    });

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling run");
            on_interrupt.cancel();
        }
    });

    let runner = ProviderUnitRunner::new(attempt.provider, attempt.plan.task.clone());
    let engine = ExecutionEngine::new(Arc::new(runner));
    let outcome = engine
        .execute(
            attempt.graph,
            ExecutionOptions {
                continue_on_failure: attempt.mode.continue_on_failure,
                max_concurrent: attempt.mode.max_concurrent,
                checkpoint_sink: Some(progress.clone()),
                cancel,
                prior_results: attempt.prior_results,
            },
        )
        .await;

    interrupt.abort();
    progress.finish();
    let result = outcome.map_err(report)?;

    let run_id = attempt.recorder.as_ref().map(|r| r.run_id().to_string());
    match attempt.format {
        OutputFormat::Json => print_json(&result, run_id.as_deref())?,
        OutputFormat::Text => print_summary(&result, ctx.verbose),
    }

    if result.success {
        return Ok(());
    }

    if let Some(id) = &run_id {
        eprintln!();
        eprintln!("Resume with: {}", format!("agentflow resume {}", id).cyan());
    }

    if result.cancelled {
        Err(miette::miette!("Run cancelled"))
    } else {
        Err(miette::miette!("Run failed"))
    }
}

fn print_plan(plan: &PlanDefinition, graph: &DependencyGraph, mode: &RunMode) {
    println!();
    println!("{}: {}", "Plan".bold(), plan.label());
    if !plan.task.is_empty() {
        println!("{}: {}", "Task".bold(), plan.task);
    }
    println!("{}", "═".repeat(50));

    let bound = mode
        .max_concurrent
        .map(|n| n.to_string())
        .unwrap_or_else(|| "unbounded".to_string());
    println!(
        "Execution plan ({} unit{}, max concurrent {}{}):",
        graph.len(),
        if graph.len() == 1 { "" } else { "s" },
        bound,
        if mode.continue_on_failure { ", continue on failure" } else { "" }
    );
    println!();

    for line in graph.to_text().lines() {
        println!("  {}", line);
    }
    println!();
}

fn print_summary(result: &PlanResult, verbose: bool) {
    println!();

    if verbose && !result.timeline.entries().is_empty() {
        println!("{}:", "Timeline".bold());
        for line in result.timeline.to_text().lines() {
            println!("  {}", line.dimmed());
        }
        println!();
    }

    if !result.final_output.is_empty() {
        println!("{}", result.final_output);
        println!();
    }

    let summary = format!(
        "{} units in {} ({} tokens)",
        result.results.len(),
        format_duration(result.total_duration_ms),
        result.total_tokens
    );

    if result.success {
        println!("{}", format!("Plan completed: {}", summary).green());
    } else if result.cancelled {
        println!("{}", format!("Plan cancelled after {}", summary).yellow());
    } else {
        println!("{}", format!("Plan failed: {}", summary).red());
        for failed in result.failed() {
            eprintln!(
                "  {} {}: {}",
                "✗".red(),
                failed.name.bold(),
                failed.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
}

fn print_json(result: &PlanResult, run_id: Option<&str>) -> Result<()> {
    let mut value = serde_json::to_value(result).map_err(|e| miette::miette!("{}", e))?;
    if let (Some(id), Some(object)) = (run_id, value.as_object_mut()) {
        object.insert("runId".into(), serde_json::Value::String(id.to_string()));
    }

    let json = serde_json::to_string_pretty(&value).map_err(|e| miette::miette!("{}", e))?;
    println!("{}", json);
    Ok(())
}
