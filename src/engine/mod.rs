// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 agentflow contributors

//! Execution engine
//!
//! Runs a dependency graph level by level. Within a level the parallel-eligible
//! units run concurrently under a counting semaphore, then the remaining units
//! run one at a time in declaration order.

mod result;
mod runner;
mod timeline;

pub use result::{ExecutionResult, PlanResult};
pub use runner::{DependencyOutput, ProviderUnitRunner, UnitOutput, UnitRunner};
pub use timeline::{Timeline, TimelineEntry};

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::checkpoint::CheckpointSink;
use crate::errors::AgentflowError;
use crate::plan::{Condition, DependencyGraph, Node};

/// Engine options
#[derive(Clone, Default)]
pub struct ExecutionOptions {
    /// Keep running independent branches after a failure
    pub continue_on_failure: bool,
    /// Bound on concurrently running units within a level (unbounded when `None`)
    pub max_concurrent: Option<usize>,
    /// Called with every result before the next unit on that path is admitted
    pub checkpoint_sink: Option<Arc<dyn CheckpointSink>>,
    /// External cancellation
    pub cancel: CancellationToken,
    /// Results from an earlier attempt. Units that actually ran and succeeded
    /// are kept; condition skips are evaluated again.
    pub prior_results: Vec<ExecutionResult>,
}

/// Plan execution engine
pub struct ExecutionEngine {
    runner: Arc<dyn UnitRunner>,
}

enum Admission {
    /// Decided without running: failed dependency or false condition
    Record(ExecutionResult),
    /// Ready, with the usable outputs of its direct dependencies
    Run(Vec<DependencyOutput>),
}

/// A unit that came back from its runner
struct Finished {
    node: Node,
    start_ms: u64,
    end_ms: u64,
    outcome: Result<UnitOutput, AgentflowError>,
}

impl Finished {
    fn into_result(self) -> (TimelineEntry, ExecutionResult) {
        let duration_ms = self.end_ms.saturating_sub(self.start_ms);
        let entry = TimelineEntry {
            name: self.node.name().to_string(),
            start_ms: self.start_ms,
            end_ms: self.end_ms,
            level: self.node.level,
        };

        let result = match self.outcome {
            Ok(output) => ExecutionResult {
                name: self.node.name().to_string(),
                index: self.node.index,
                output: output.content,
                duration_ms,
                tokens_used: output.tokens_used,
                success: true,
                error: None,
                model: output.model,
                skipped: false,
            },
            Err(e) => ExecutionResult::failed(&self.node, e.to_string(), duration_ms),
        };

        (entry, result)
    }
}

/// Bookkeeping for one run; owned by the driver, never shared with unit tasks
struct RunState {
    started: Instant,
    continue_on_failure: bool,
    results: Vec<ExecutionResult>,
    by_name: HashMap<String, usize>,
    timeline: Timeline,
    first_failed: Option<usize>,
    cancelled: bool,
}

impl RunState {
    fn new(continue_on_failure: bool) -> Self {
        Self {
            started: Instant::now(),
            continue_on_failure,
            results: Vec::new(),
            by_name: HashMap::new(),
            timeline: Timeline::new(),
            first_failed: None,
            cancelled: false,
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn result(&self, name: &str) -> Option<&ExecutionResult> {
        self.by_name.get(name).map(|&i| &self.results[i])
    }

    /// No further units may be admitted
    fn halted(&mut self, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() {
            self.cancelled = true;
        }
        self.cancelled || (!self.continue_on_failure && self.first_failed.is_some())
    }

    fn condition_holds(&self, condition: &Condition) -> bool {
        match condition {
            // Vacuously true before anything has run
            Condition::PreviousSuccess => self
                .results
                .iter()
                .filter(|r| !r.skipped)
                .all(|r| r.success),
            Condition::NodeSuccess(name) => self.result(name).is_some_and(|r| r.success),
        }
    }

    fn admit(&self, node: &Node) -> Admission {
        for dep in node.dependencies() {
            match self.result(dep) {
                Some(r) if r.success => {}
                Some(_) => {
                    return Admission::Record(ExecutionResult::failed(
                        node,
                        format!("dependency '{}' failed", dep),
                        0,
                    ))
                }
                None => {
                    return Admission::Record(ExecutionResult::failed(
                        node,
                        format!("dependency '{}' has no result", dep),
                        0,
                    ))
                }
            }
        }

        if let Some(condition) = &node.condition {
            if !self.condition_holds(condition) {
                tracing::debug!(node = node.name(), %condition, "condition false, skipping");
                return Admission::Record(ExecutionResult::skipped(node));
            }
        }

        let dependencies = node
            .dependencies()
            .iter()
            .filter_map(|dep| {
                let output = self.result(dep)?.usable_output()?;
                Some(DependencyOutput {
                    name: dep.clone(),
                    output: output.to_string(),
                })
            })
            .collect();

        Admission::Run(dependencies)
    }

    fn record(&mut self, result: ExecutionResult) {
        if !result.success && self.first_failed.is_none() {
            self.first_failed = Some(result.index);
        }
        self.by_name.insert(result.name.clone(), self.results.len());
        self.results.push(result);
    }

    fn finish(self) -> PlanResult {
        let final_output = result::assemble_final_output(&self.results);
        let success = !self.cancelled && self.results.iter().all(|r| r.success);

        PlanResult {
            total_duration_ms: self.elapsed_ms(),
            total_tokens: self.results.iter().map(|r| r.tokens_used).sum(),
            success,
            first_failed_index: self.first_failed,
            final_output,
            cancelled: self.cancelled,
            timeline: self.timeline,
            results: self.results,
        }
    }
}

impl ExecutionEngine {
    /// Create an engine around a unit runner
    pub fn new(runner: Arc<dyn UnitRunner>) -> Self {
        Self { runner }
    }

    /// Execute a built graph.
    ///
    /// Unit failures are recorded in the result; an `Err` means the run itself
    /// could not continue (a checkpoint write failed or a unit task panicked).
    pub async fn execute(
        &self,
        graph: &DependencyGraph,
        options: ExecutionOptions,
    ) -> Result<PlanResult, AgentflowError> {
        let mut state = RunState::new(options.continue_on_failure);

        for prior in &options.prior_results {
            match graph.node(&prior.name) {
                Some(node) if prior.success && !prior.skipped && node.index == prior.index => {
                    if state.result(&prior.name).is_none() {
                        state.record(prior.clone());
                    }
                }
                Some(_) => {}
                None => tracing::warn!(node = %prior.name, "ignoring prior result for unknown unit"),
            }
        }

        tracing::info!(
            units = graph.len(),
            levels = graph.max_level() + 1,
            resumed = state.results.len(),
            max_concurrent = ?options.max_concurrent,
            "executing plan"
        );

        for (level, nodes) in graph.levels().into_iter().enumerate() {
            if state.halted(&options.cancel) {
                break;
            }

            let (parallel, sequential): (Vec<&Node>, Vec<&Node>) = nodes
                .into_iter()
                .filter(|node| state.result(node.name()).is_none())
                .partition(|node| node.is_parallel());

            tracing::debug!(level, parallel = parallel.len(), sequential = sequential.len(), "starting level");

            self.run_parallel(&parallel, &mut state, &options).await?;

            for node in sequential {
                if state.halted(&options.cancel) {
                    break;
                }
                self.run_sequential(node, &mut state, &options).await?;
            }
        }

        // Record a cancellation that arrived after the last admission check
        state.halted(&options.cancel);

        let result = state.finish();
        if result.cancelled {
            tracing::warn!(completed = result.results.len(), "run cancelled");
        } else if result.success {
            tracing::info!(duration_ms = result.total_duration_ms, tokens = result.total_tokens, "plan completed");
        } else {
            tracing::warn!(first_failed = ?result.first_failed_index, "plan finished with failures");
        }

        Ok(result)
    }

    /// Record a result and hand it to the checkpoint sink
    async fn commit(
        &self,
        state: &mut RunState,
        result: ExecutionResult,
        options: &ExecutionOptions,
    ) -> Result<(), AgentflowError> {
        if result.success {
            tracing::debug!(node = %result.name, duration_ms = result.duration_ms, skipped = result.skipped, "unit succeeded");
        } else {
            tracing::warn!(node = %result.name, error = result.error.as_deref().unwrap_or_default(), "unit failed");
        }

        if let Some(sink) = &options.checkpoint_sink {
            sink.record(&result).await?;
        }
        state.record(result);
        Ok(())
    }

    async fn run_parallel(
        &self,
        nodes: &[&Node],
        state: &mut RunState,
        options: &ExecutionOptions,
    ) -> Result<(), AgentflowError> {
        if nodes.is_empty() {
            return Ok(());
        }

        let limit = options.max_concurrent.unwrap_or(nodes.len()).max(1);
        let semaphore = Arc::new(Semaphore::new(limit));
        let mut queue: VecDeque<&Node> = nodes.iter().copied().collect();
        let mut in_flight: JoinSet<(Finished, OwnedSemaphorePermit)> = JoinSet::new();

        loop {
            // Admit in declaration order while slots are free
            while !state.halted(&options.cancel) {
                let Some(&node) = queue.front() else {
                    break;
                };

                match state.admit(node) {
                    Admission::Record(result) => {
                        queue.pop_front();
                        self.commit(state, result, options).await?;
                    }
                    Admission::Run(dependencies) => {
                        let Ok(permit) = semaphore.clone().try_acquire_owned() else {
                            break;
                        };
                        queue.pop_front();

                        tracing::debug!(node = node.name(), level = node.level, "starting unit");
                        let runner = self.runner.clone();
                        let node = node.clone();
                        let cancel = options.cancel.clone();
                        let started = state.started;

                        in_flight.spawn(async move {
                            let start_ms = started.elapsed().as_millis() as u64;
                            let outcome = runner.run_unit(&node, &dependencies, cancel).await;
                            let end_ms = started.elapsed().as_millis() as u64;
                            (
                                Finished {
                                    node,
                                    start_ms,
                                    end_ms,
                                    outcome,
                                },
                                permit,
                            )
                        });
                    }
                }
            }

            let Some(joined) = in_flight.join_next().await else {
                break;
            };
            let (finished, permit) = joined.map_err(|e| AgentflowError::UnitTaskFailed {
                message: e.to_string(),
            })?;

            if state.halted(&options.cancel) && state.cancelled {
                tracing::debug!(node = finished.node.name(), "discarding result after cancellation");
                continue;
            }

            let (entry, result) = finished.into_result();
            state.timeline.record(entry);
            self.commit(state, result, options).await?;

            // The slot frees only once the result is recorded and checkpointed
            drop(permit);
        }

        Ok(())
    }

    async fn run_sequential(
        &self,
        node: &Node,
        state: &mut RunState,
        options: &ExecutionOptions,
    ) -> Result<(), AgentflowError> {
        let dependencies = match state.admit(node) {
            Admission::Record(result) => return self.commit(state, result, options).await,
            Admission::Run(dependencies) => dependencies,
        };

        tracing::debug!(node = node.name(), level = node.level, "starting unit");
        let start_ms = state.elapsed_ms();
        let outcome = self
            .runner
            .run_unit(node, &dependencies, options.cancel.clone())
            .await;
        let end_ms = state.elapsed_ms();

        if state.halted(&options.cancel) && state.cancelled {
            tracing::debug!(node = node.name(), "discarding result after cancellation");
            return Ok(());
        }

        let (entry, result) = Finished {
            node: node.clone(),
            start_ms,
            end_ms,
            outcome,
        }
        .into_result();
        state.timeline.record(entry);
        self.commit(state, result, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{UnitSpec, SKIPPED_SENTINEL};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Runner that sleeps, optionally fails, and records what it saw
    #[derive(Default)]
    struct ScriptedRunner {
        delay: Duration,
        failing: HashSet<String>,
        calls: Mutex<Vec<String>>,
        seen: Mutex<HashMap<String, Vec<DependencyOutput>>>,
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    impl ScriptedRunner {
        fn with_delay(ms: u64) -> Self {
            Self {
                delay: Duration::from_millis(ms),
                ..Default::default()
            }
        }

        fn failing(mut self, names: &[&str]) -> Self {
            self.failing = names.iter().map(|s| s.to_string()).collect();
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn seen(&self, name: &str) -> Vec<DependencyOutput> {
            self.seen.lock().unwrap().get(name).cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl UnitRunner for ScriptedRunner {
        async fn run_unit(
            &self,
            node: &Node,
            dependencies: &[DependencyOutput],
            cancel: CancellationToken,
        ) -> Result<UnitOutput, AgentflowError> {
            self.calls.lock().unwrap().push(node.name().to_string());
            self.seen
                .lock()
                .unwrap()
                .insert(node.name().to_string(), dependencies.to_vec());

            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let cancelled = tokio::select! {
                _ = tokio::time::sleep(self.delay) => false,
                _ = cancel.cancelled() => true,
            };
            self.running.fetch_sub(1, Ordering::SeqCst);

            if cancelled {
                return Err(AgentflowError::Cancelled);
            }
            if self.failing.contains(node.name()) {
                return Err(AgentflowError::ProviderFailed {
                    provider: "scripted".into(),
                    message: format!("{} exploded", node.name()),
                });
            }

            Ok(UnitOutput {
                content: format!("{} output", node.name()),
                tokens_used: 10,
                model: None,
            })
        }
    }

    /// Sink that remembers the order it was called in
    #[derive(Default)]
    struct RecordingSink {
        names: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CheckpointSink for RecordingSink {
        async fn record(&self, result: &ExecutionResult) -> Result<(), AgentflowError> {
            self.names.lock().unwrap().push(result.name.clone());
            Ok(())
        }
    }

    struct BrokenSink;

    #[async_trait]
    impl CheckpointSink for BrokenSink {
        async fn record(&self, _result: &ExecutionResult) -> Result<(), AgentflowError> {
            Err(AgentflowError::CheckpointIo {
                message: "disk full".into(),
            })
        }
    }

    fn diamond() -> DependencyGraph {
        DependencyGraph::build(&[
            UnitSpec::new("a", "root"),
            UnitSpec::new("b", "left").after(["a"]).parallel(),
            UnitSpec::new("c", "right").after(["a"]).parallel(),
            UnitSpec::new("d", "join").after(["b", "c"]),
        ])
        .unwrap()
    }

    /// Level 0: `a`, `x`; level 1: `b` after `a`, `y` after `x`
    fn two_branches() -> DependencyGraph {
        DependencyGraph::build(&[
            UnitSpec::new("a", "a"),
            UnitSpec::new("x", "x"),
            UnitSpec::new("b", "b").after(["a"]),
            UnitSpec::new("y", "y").after(["x"]),
        ])
        .unwrap()
    }

    async fn run(
        runner: Arc<ScriptedRunner>,
        graph: &DependencyGraph,
        options: ExecutionOptions,
    ) -> PlanResult {
        ExecutionEngine::new(runner).execute(graph, options).await.unwrap()
    }

    #[tokio::test]
    async fn test_diamond_scenario() {
        let graph = diamond();
        let levels: Vec<(&str, usize)> = graph.nodes().iter().map(|n| (n.name(), n.level)).collect();
        assert_eq!(levels, vec![("a", 0), ("b", 1), ("c", 1), ("d", 2)]);

        let runner = Arc::new(ScriptedRunner::with_delay(40));
        let result = run(
            runner.clone(),
            &graph,
            ExecutionOptions {
                max_concurrent: Some(2),
                ..Default::default()
            },
        )
        .await;

        assert!(result.success);
        let order = result.completion_order();
        assert_eq!(order.first(), Some(&"a"));
        assert_eq!(order.last(), Some(&"d"));
        assert_eq!(result.total_tokens, 40);

        // b and c ran side by side, d only after both
        assert_eq!(result.timeline.max_overlap(), 2);
        let d_start = result.timeline.entry("d").unwrap().start_ms;
        assert!(d_start >= result.timeline.entry("b").unwrap().end_ms);
        assert!(d_start >= result.timeline.entry("c").unwrap().end_ms);

        let seen: Vec<String> = runner.seen("d").into_iter().map(|d| d.name).collect();
        assert_eq!(seen, vec!["b".to_string(), "c".to_string()]);
        assert!(result.final_output.starts_with("## a\n\na output"));
    }

    #[tokio::test]
    async fn test_concurrency_bound_is_never_exceeded() {
        let units: Vec<UnitSpec> = (0..6)
            .map(|i| UnitSpec::new(format!("n{}", i), "p").parallel())
            .collect();
        let graph = DependencyGraph::build(&units).unwrap();

        let runner = Arc::new(ScriptedRunner::with_delay(20));
        let result = run(
            runner.clone(),
            &graph,
            ExecutionOptions {
                max_concurrent: Some(2),
                ..Default::default()
            },
        )
        .await;

        assert!(result.success);
        assert_eq!(result.results.len(), 6);
        assert!(runner.peak.load(Ordering::SeqCst) <= 2);
        assert!(result.timeline.max_overlap() <= 2);
    }

    #[tokio::test]
    async fn test_unbounded_runs_whole_level_together() {
        let units: Vec<UnitSpec> = (0..4)
            .map(|i| UnitSpec::new(format!("n{}", i), "p").parallel())
            .collect();
        let graph = DependencyGraph::build(&units).unwrap();

        let runner = Arc::new(ScriptedRunner::with_delay(50));
        run(runner.clone(), &graph, ExecutionOptions::default()).await;

        assert_eq!(runner.peak.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_failure_aborts_remaining_levels() {
        let runner = Arc::new(ScriptedRunner::with_delay(1).failing(&["a"]));
        let result = run(runner.clone(), &two_branches(), ExecutionOptions::default()).await;

        assert!(!result.success);
        assert_eq!(result.first_failed_index, Some(0));
        assert_eq!(runner.calls(), vec!["a".to_string()]);
        assert_eq!(result.results.len(), 1);
        assert_eq!(result.results[0].error.as_deref(), Some("a exploded"));
    }

    #[tokio::test]
    async fn test_continue_on_failure_records_blocked_dependents() {
        let runner = Arc::new(ScriptedRunner::with_delay(1).failing(&["a"]));
        let result = run(
            runner.clone(),
            &two_branches(),
            ExecutionOptions {
                continue_on_failure: true,
                ..Default::default()
            },
        )
        .await;

        assert!(!result.success);
        assert_eq!(result.results.len(), 4);
        assert_eq!(result.first_failed_index, Some(0));

        let blocked = result.result("b").unwrap();
        assert!(!blocked.success);
        assert_eq!(blocked.error.as_deref(), Some("dependency 'a' failed"));
        assert!(!runner.calls().contains(&"b".to_string()));

        assert!(result.result("y").unwrap().success);
        assert_eq!(result.final_output, "## x\n\nx output\n\n## y\n\ny output");
    }

    #[tokio::test]
    async fn test_condition_skip_counts_as_success_for_gating() {
        let graph = DependencyGraph::build(&[
            UnitSpec::new("a", "a"),
            UnitSpec::new("b", "b").when("a.success"),
            UnitSpec::new("c", "c").after(["b"]),
        ])
        .unwrap();

        let runner = Arc::new(ScriptedRunner::with_delay(1).failing(&["a"]));
        let result = run(
            runner.clone(),
            &graph,
            ExecutionOptions {
                continue_on_failure: true,
                ..Default::default()
            },
        )
        .await;

        let skipped = result.result("b").unwrap();
        assert!(skipped.success && skipped.skipped);
        assert_eq!(skipped.output, SKIPPED_SENTINEL);
        assert_eq!(skipped.duration_ms, 0);
        assert!(!runner.calls().contains(&"b".to_string()));

        // c still runs, and never sees the sentinel
        assert!(result.result("c").unwrap().success);
        assert!(runner.seen("c").is_empty());
        assert!(result.timeline.entry("b").is_none());
    }

    #[tokio::test]
    async fn test_previous_success_is_vacuously_true() {
        let graph = DependencyGraph::build(&[UnitSpec::new("first", "p").when("previous.success")]).unwrap();

        let runner = Arc::new(ScriptedRunner::with_delay(1));
        let result = run(runner.clone(), &graph, ExecutionOptions::default()).await;

        assert_eq!(runner.calls(), vec!["first".to_string()]);
        assert!(!result.results[0].skipped);
    }

    #[tokio::test]
    async fn test_named_condition_without_result_is_false() {
        let graph = DependencyGraph::build(&[
            UnitSpec::new("early", "p").when("late.success"),
            UnitSpec::new("late", "p"),
        ])
        .unwrap();

        let runner = Arc::new(ScriptedRunner::with_delay(1));
        let result = run(runner.clone(), &graph, ExecutionOptions::default()).await;

        assert!(result.result("early").unwrap().skipped);
        assert_eq!(runner.calls(), vec!["late".to_string()]);
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_dependency_outputs_are_direct_only() {
        let graph = DependencyGraph::build(&[
            UnitSpec::new("a", "p"),
            UnitSpec::new("b", "p").after(["a"]),
            UnitSpec::new("c", "p").after(["b"]),
        ])
        .unwrap();

        let runner = Arc::new(ScriptedRunner::with_delay(1));
        run(runner.clone(), &graph, ExecutionOptions::default()).await;

        assert_eq!(
            runner.seen("c"),
            vec![DependencyOutput {
                name: "b".into(),
                output: "b output".into(),
            }]
        );
    }

    #[tokio::test]
    async fn test_sequential_units_follow_declaration_order() {
        let graph = DependencyGraph::build(&[
            UnitSpec::new("s", "p"),
            UnitSpec::new("z", "p"),
            UnitSpec::new("p1", "p").parallel(),
            UnitSpec::new("m", "p"),
            UnitSpec::new("p2", "p").parallel(),
        ])
        .unwrap();

        let runner = Arc::new(ScriptedRunner::with_delay(20));
        let result = run(runner.clone(), &graph, ExecutionOptions::default()).await;

        let order = result.completion_order();
        assert_eq!(&order[2..], &["s", "z", "m"]);

        // The sequential subset waits for the parallel one
        let parallel_end = ["p1", "p2"]
            .iter()
            .map(|n| result.timeline.entry(n).unwrap().end_ms)
            .max()
            .unwrap();
        assert!(result.timeline.entry("s").unwrap().start_ms >= parallel_end);
    }

    #[tokio::test]
    async fn test_cancellation_stops_admission_and_discards_in_flight() {
        let graph = DependencyGraph::build(&[
            UnitSpec::new("one", "p"),
            UnitSpec::new("two", "p"),
            UnitSpec::new("three", "p"),
        ])
        .unwrap();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let sink = Arc::new(RecordingSink::default());
        let runner = Arc::new(ScriptedRunner::with_delay(5_000));
        let result = run(
            runner.clone(),
            &graph,
            ExecutionOptions {
                cancel,
                checkpoint_sink: Some(sink.clone()),
                ..Default::default()
            },
        )
        .await;

        assert!(result.cancelled);
        assert!(!result.success);
        assert_eq!(runner.calls(), vec!["one".to_string()]);
        assert!(result.results.is_empty());
        assert!(sink.names.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sink_sees_every_result_in_order() {
        let sink = Arc::new(RecordingSink::default());
        let runner = Arc::new(ScriptedRunner::with_delay(1).failing(&["a"]));

        let result = run(
            runner,
            &two_branches(),
            ExecutionOptions {
                continue_on_failure: true,
                checkpoint_sink: Some(sink.clone()),
                ..Default::default()
            },
        )
        .await;

        let recorded = sink.names.lock().unwrap().clone();
        assert_eq!(recorded, result.completion_order());
        assert_eq!(recorded.len(), 4);
    }

    #[tokio::test]
    async fn test_sink_failure_is_fatal() {
        let engine = ExecutionEngine::new(Arc::new(ScriptedRunner::with_delay(1)));
        let err = engine
            .execute(
                &diamond(),
                ExecutionOptions {
                    checkpoint_sink: Some(Arc::new(BrokenSink)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AgentflowError::CheckpointIo { .. }));
    }

    #[tokio::test]
    async fn test_resume_skips_successful_prior_results() {
        let graph = DependencyGraph::build(&[
            UnitSpec::new("a", "p"),
            UnitSpec::new("b", "p").after(["a"]),
            UnitSpec::new("c", "p").after(["b"]),
        ])
        .unwrap();

        let prior = vec![
            ExecutionResult {
                name: "a".into(),
                index: 0,
                output: "cached a".into(),
                duration_ms: 3,
                tokens_used: 5,
                success: true,
                error: None,
                model: None,
                skipped: false,
            },
            ExecutionResult::failed(graph.node("b").unwrap(), "timeout", 9),
        ];

        let runner = Arc::new(ScriptedRunner::with_delay(1));
        let result = run(
            runner.clone(),
            &graph,
            ExecutionOptions {
                prior_results: prior,
                ..Default::default()
            },
        )
        .await;

        assert!(result.success);
        assert_eq!(runner.calls(), vec!["b".to_string(), "c".to_string()]);
        assert_eq!(result.completion_order(), vec!["a", "b", "c"]);
        assert_eq!(runner.seen("b")[0].output, "cached a");
        assert!(result.final_output.starts_with("## a\n\ncached a"));
    }

    #[tokio::test]
    async fn test_resume_reevaluates_condition_skips() {
        let graph = DependencyGraph::build(&[
            UnitSpec::new("a", "p"),
            UnitSpec::new("b", "p").when("a.success"),
        ])
        .unwrap();

        let prior = vec![
            ExecutionResult::failed(graph.node("a").unwrap(), "timeout", 4),
            ExecutionResult::skipped(graph.node("b").unwrap()),
        ];

        let runner = Arc::new(ScriptedRunner::with_delay(1));
        let result = run(
            runner.clone(),
            &graph,
            ExecutionOptions {
                prior_results: prior,
                ..Default::default()
            },
        )
        .await;

        assert!(result.success);
        assert_eq!(runner.calls(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(result.completion_order(), vec!["a", "b"]);

        let b = result.result("b").unwrap();
        assert!(b.success && !b.skipped);
        assert!(result.final_output.contains("## b"));
    }

    #[tokio::test]
    async fn test_cycle_rejected_before_anything_runs() {
        let runner = Arc::new(ScriptedRunner::with_delay(1));
        let built = DependencyGraph::build(&[
            UnitSpec::new("a", "p").after(["c"]),
            UnitSpec::new("b", "p").after(["a"]),
            UnitSpec::new("c", "p").after(["b"]),
        ]);

        assert!(matches!(built, Err(AgentflowError::CyclicDependency { .. })));
        assert!(runner.calls().is_empty());
    }
}
