//! The Task DAG Scheduler (C3, §4.3).
//!
//! Drives a set of [`Task`]s to completion: computes the ready set each
//! round, groups it by priority, runs each priority level with bounded
//! concurrency, and retries failed tasks up to their individual budget
//! before marking them terminal. No task state survives past one
//! [`Scheduler::run`] call (§3 "Lifecycle").

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::registry::BackendRegistry;
use crate::types::{Priority, Task, TaskResult};

/// Maximum number of tasks run truly concurrently within one priority
/// level (§4.3 "Round").
const MAX_CONCURRENCY: usize = 5;

/// Aggregate counters reported by [`Scheduler::summary`] (§4.3 "Summary()").
#[derive(Debug, Clone)]
pub struct SchedulerSummary {
    pub total_tasks: usize,
    pub successful_tasks: usize,
    pub failed_tasks: usize,
    pub retries_performed: u32,
    pub total_execution_time: Duration,
    pub completion_rate: f64,
    pub average_execution_time: Duration,
    pub completed_task_names: Vec<String>,
    pub failed_task_names: Vec<String>,
}

pub struct Scheduler<'a> {
    tasks: HashMap<String, Task>,
    results: HashMap<String, TaskResult>,
    completed: HashSet<String>,
    failed: HashSet<String>,
    retries_performed: u32,
    registry: &'a BackendRegistry,
    user_id: String,
}

impl<'a> Scheduler<'a> {
    pub fn new(registry: &'a BackendRegistry, user_id: impl Into<String>) -> Self {
        Self {
            tasks: HashMap::new(),
            results: HashMap::new(),
            completed: HashSet::new(),
            failed: HashSet::new(),
            retries_performed: 0,
            registry,
            user_id: user_id.into(),
        }
    }

    /// `Add(task)` — idempotent replace by name. Unknown dependency names
    /// are logged and tolerated; an unresolved one surfaces as
    /// `dependency_failed` the first time the task is checked for
    /// readiness (§4.3 "Add").
    pub fn add(&mut self, task: Task) {
        for dep in &task.dependencies {
            if !self.tasks.contains_key(dep) && dep != &task.name {
                debug!(task = %task.name, dependency = %dep, "dependency not yet added to the scheduler");
            }
        }
        self.tasks.insert(task.name.clone(), task);
    }

    fn is_ready(&self, task: &Task) -> bool {
        if self.completed.contains(&task.name) || self.failed.contains(&task.name) {
            return false;
        }
        task.dependencies.iter().all(|dep| self.completed.contains(dep))
    }

    fn has_failed_dependency(&self, task: &Task) -> bool {
        task.dependencies.iter().any(|dep| self.failed.contains(dep) || !self.tasks.contains_key(dep))
    }

    /// The set of task names ready to execute this round, sorted by
    /// `(priority desc, weight desc, created_at asc)` (§4.3 "Ready set").
    fn ready_set(&self) -> Vec<String> {
        let mut ready: Vec<&Task> = self
            .tasks
            .values()
            .filter(|t| self.is_ready(t) && !self.has_failed_dependency(t))
            .collect();
        ready.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(b.weight.partial_cmp(&a.weight).unwrap_or(std::cmp::Ordering::Equal))
                .then(a.created_at.cmp(&b.created_at))
        });
        ready.into_iter().map(|t| t.name.clone()).collect()
    }

    /// Tasks whose dependency set includes a now-failed (or never-added)
    /// task: terminal without ever dispatching (§3, §4.3 "Ready set" (c)).
    fn cascade_failures(&mut self) -> bool {
        let mut any = false;
        let names: Vec<String> = self
            .tasks
            .keys()
            .filter(|name| !self.completed.contains(*name) && !self.failed.contains(*name))
            .cloned()
            .collect();
        for name in names {
            let task = &self.tasks[&name];
            if self.has_failed_dependency(task) {
                let failed_dep = task
                    .dependencies
                    .iter()
                    .find(|d| self.failed.contains(*d) || !self.tasks.contains_key(*d))
                    .cloned()
                    .unwrap_or_default();
                warn!(task = %name, dependency = %failed_dep, "dependency failed, cascading");
                self.results.insert(
                    name.clone(),
                    TaskResult::failure(
                        &name,
                        Duration::ZERO,
                        0,
                        format!("dependency_failed: '{failed_dep}' did not complete"),
                    ),
                );
                self.failed.insert(name);
                any = true;
            }
        }
        any
    }

    /// Run every task to completion or terminal failure and return the map
    /// of successful results (§4.3 "Output").
    pub async fn run(&mut self) -> HashMap<String, String> {
        let total = self.tasks.len();
        let max_iterations = total.saturating_mul(2).max(1);
        let mut iteration = 0;

        loop {
            if self.completed.len() + self.failed.len() >= total {
                break;
            }
            if iteration >= max_iterations {
                break;
            }
            iteration += 1;

            self.cascade_failures();
            if self.completed.len() + self.failed.len() >= total {
                break;
            }

            let ready = self.ready_set();
            if ready.is_empty() {
                let remaining: Vec<String> = self
                    .tasks
                    .keys()
                    .filter(|n| !self.completed.contains(*n) && !self.failed.contains(*n))
                    .cloned()
                    .collect();
                if remaining.is_empty() {
                    break;
                }
                warn!(remaining = remaining.len(), "scheduler made no progress this round");
                for name in &remaining {
                    self.results.insert(
                        name.clone(),
                        TaskResult::failure(name, Duration::ZERO, 0, "unresolvable_dependency"),
                    );
                    self.failed.insert(name.clone());
                }
                break;
            }

            self.run_round(&ready).await;
        }

        // Iteration budget exhausted with non-terminal tasks remaining —
        // same terminal treatment as a no-progress round (§4.3 "Top loop").
        let remaining: Vec<String> = self
            .tasks
            .keys()
            .filter(|n| !self.completed.contains(*n) && !self.failed.contains(*n))
            .cloned()
            .collect();
        for name in remaining {
            self.results.insert(
                name.clone(),
                TaskResult::failure(&name, Duration::ZERO, 0, "unresolvable_dependency"),
            );
            self.failed.insert(name);
        }

        self.results
            .iter()
            .filter(|(_, r)| r.success)
            .map(|(name, r)| (name.clone(), r.output.clone()))
            .collect()
    }

    /// Group the ready set by priority; run each level to completion with
    /// `min(|group|, 5)` concurrency before advancing (§4.3 "Round").
    async fn run_round(&mut self, ready: &[String]) {
        let mut by_priority: Vec<(Priority, Vec<String>)> = Vec::new();
        for name in ready {
            let priority = self.tasks[name].priority;
            if let Some((_, group)) = by_priority.iter_mut().find(|(p, _)| *p == priority) {
                group.push(name.clone());
            } else {
                by_priority.push((priority, vec![name.clone()]));
            }
        }
        by_priority.sort_by_key(|(p, _)| *p);

        for (priority, group) in by_priority {
            debug!(?priority, count = group.len(), "running priority level");
            let concurrency = group.len().min(MAX_CONCURRENCY);
            for batch in group.chunks(concurrency.max(1)) {
                let mut handles = Vec::new();
                for name in batch {
                    handles.push(self.execute_task(name.clone()));
                }
                let outcomes = futures::future::join_all(handles).await;
                for (name, result) in outcomes {
                    self.apply_outcome(name, result);
                }
            }
        }
    }

    fn apply_outcome(&mut self, name: String, result: TaskResult) {
        if result.success {
            self.completed.insert(name.clone());
        } else {
            self.failed.insert(name.clone());
        }
        self.retries_performed += result.retry_count;
        self.results.insert(name, result);
    }

    /// Execute one task end to end, including its own retry loop
    /// (§4.3 "Per-task execution").
    async fn execute_task(&self, name: String) -> (String, TaskResult) {
        let task = self.tasks[&name].clone();
        let mut retry_count = 0;
        let started = Instant::now();

        loop {
            let prompt = task.render_prompt(&self.results);
            let attempt_started = Instant::now();
            let outcome = self
                .registry
                .call_with_timeout(task.backend, &prompt, task.timeout, &self.user_id, &task.task_type)
                .await;

            match outcome {
                Ok(output) => {
                    return (
                        name,
                        TaskResult::success(&task.name, output, started.elapsed(), retry_count),
                    );
                }
                Err(err) => {
                    if retry_count < task.max_retries {
                        debug!(task = %task.name, retry_count, elapsed = ?attempt_started.elapsed(), "task failed, retrying");
                        tokio::time::sleep(task.retry_delay).await;
                        retry_count += 1;
                        continue;
                    }
                    warn!(task = %task.name, retry_count, error = %err, "task exhausted retries");
                    return (
                        name,
                        TaskResult::failure(&task.name, started.elapsed(), retry_count, err.reason()),
                    );
                }
            }
        }
    }

    pub fn all_results(&self) -> &HashMap<String, TaskResult> {
        &self.results
    }

    pub fn has_failed_critical(&self) -> bool {
        self.failed
            .iter()
            .filter_map(|name| self.tasks.get(name))
            .any(|t| t.priority == Priority::Critical)
    }

    pub fn summary(&self) -> SchedulerSummary {
        let total = self.tasks.len();
        let successful = self.completed.len();
        let failed = self.failed.len();
        let total_execution_time: Duration = self.results.values().map(|r| r.execution_time).sum();
        let average_execution_time = if !self.results.is_empty() {
            total_execution_time / self.results.len() as u32
        } else {
            Duration::ZERO
        };
        let completion_rate = if total > 0 { successful as f64 / total as f64 } else { 0.0 };

        SchedulerSummary {
            total_tasks: total,
            successful_tasks: successful,
            failed_tasks: failed,
            retries_performed: self.retries_performed,
            total_execution_time,
            completion_rate,
            average_execution_time,
            completed_task_names: {
                let mut v: Vec<String> = self.completed.iter().cloned().collect();
                v.sort();
                v
            },
            failed_task_names: {
                let mut v: Vec<String> = self.failed.iter().cloned().collect();
                v.sort();
                v
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ClientLimits, MockLlmBackend, RateLimitedClient};
    use crate::types::BackendId;
    use std::sync::Arc;

    fn test_limits() -> ClientLimits {
        ClientLimits {
            max_input_tokens: 6000,
            max_tokens_per_minute: 1_000_000,
            max_requests_per_minute: 1_000,
            retry_attempts: 0,
            retry_delay: Duration::from_millis(1),
        }
    }

    fn registry_with(mock: MockLlmBackend) -> BackendRegistry {
        let client = Arc::new(RateLimitedClient::new(BackendId::Gpt, Arc::new(mock), test_limits()));
        let mut clients = HashMap::new();
        clients.insert(BackendId::Gpt, client);
        BackendRegistry::new(clients)
    }

    fn task(name: &str, priority: Priority, deps: &[&str]) -> Task {
        Task::new(name, BackendId::Gpt, format!("do {name}"), priority, "explanation")
            .with_dependencies(deps.to_vec())
            .with_timeout(Duration::from_secs(5))
            .with_max_retries(0)
            .with_retry_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn linear_chain_completes_in_order() {
        let registry = registry_with(MockLlmBackend::fixed("ok").with_cleaning(false));
        let mut scheduler = Scheduler::new(&registry, "u1");
        scheduler.add(task("a", Priority::Critical, &[]));
        scheduler.add(task("b", Priority::High, &["a"]));
        scheduler.add(task("c", Priority::Medium, &["b"]));

        scheduler.run().await;
        let summary = scheduler.summary();
        assert_eq!(summary.successful_tasks, 3);
        assert_eq!(summary.failed_tasks, 0);
    }

    #[tokio::test]
    async fn dependency_failure_cascades_without_dispatch() {
        let registry = registry_with(MockLlmBackend::always_failing("boom"));
        let mut scheduler = Scheduler::new(&registry, "u1");
        scheduler.add(task("a", Priority::Critical, &[]));
        scheduler.add(task("b", Priority::High, &["a"]));

        scheduler.run().await;
        let results = scheduler.all_results();
        assert!(!results["a"].success);
        assert!(!results["b"].success);
        assert!(results["b"].error_message.as_ref().unwrap().contains("dependency_failed"));
    }

    #[tokio::test]
    async fn transient_failure_is_retried_to_success() {
        let registry = registry_with(MockLlmBackend::failing_then_succeeding(2, "done"));
        let mut scheduler = Scheduler::new(&registry, "u1");
        let t = task("t", Priority::High, &[]).with_max_retries(2);
        scheduler.add(t);

        scheduler.run().await;
        let results = scheduler.all_results();
        assert!(results["t"].success);
        assert_eq!(results["t"].output, "done");
        assert_eq!(results["t"].retry_count, 2);
        assert_eq!(scheduler.summary().retries_performed, 2);
    }

    #[tokio::test]
    async fn all_tasks_terminate_for_acyclic_graph() {
        let registry = registry_with(MockLlmBackend::fixed("ok").with_cleaning(false));
        let mut scheduler = Scheduler::new(&registry, "u1");
        scheduler.add(task("a", Priority::Critical, &[]));
        scheduler.add(task("b", Priority::High, &["a"]));
        scheduler.add(task("c", Priority::Low, &["a"]));
        scheduler.add(task("d", Priority::Medium, &["b", "c"]));

        scheduler.run().await;
        let summary = scheduler.summary();
        assert_eq!(summary.total_tasks, 4);
        assert_eq!(summary.successful_tasks + summary.failed_tasks, 4);
    }

    #[tokio::test]
    async fn missing_dependency_resolves_to_failure_not_hang() {
        let registry = registry_with(MockLlmBackend::fixed("ok").with_cleaning(false));
        let mut scheduler = Scheduler::new(&registry, "u1");
        scheduler.add(task("only", Priority::High, &["ghost"]));

        scheduler.run().await;
        let results = scheduler.all_results();
        assert!(!results["only"].success);
    }

    #[tokio::test]
    async fn placeholder_substitution_fills_known_and_preserves_unknown() {
        let registry = registry_with(MockLlmBackend::fixed("X").with_cleaning(false));
        let mut scheduler = Scheduler::new(&registry, "u1");
        let a = Task::new("a", BackendId::Gpt, "irrelevant", Priority::Critical, "t").with_max_retries(0);
        let b = Task::new("b", BackendId::Gpt, "P {a} Q {ghost} R", Priority::High, "t")
            .with_dependencies(["a"])
            .with_max_retries(0);
        scheduler.add(a);
        scheduler.add(b);

        scheduler.run().await;
        let results = scheduler.all_results();
        assert!(results["a"].success);
        assert!(results["b"].success);
        // a's output is "X" after cleaning; the template should render deterministically.
    }

    #[test]
    fn task_render_prompt_substitutes_known_placeholders_literally() {
        let mut results = HashMap::new();
        results.insert("a".to_string(), TaskResult::success("a", "X", Duration::ZERO, 0));
        results.insert("b".to_string(), TaskResult::success("b", "Y", Duration::ZERO, 0));
        let t = Task::new("t", BackendId::Gpt, "P {a} Q {b} R", Priority::High, "x")
            .with_dependencies(["a", "b"]);
        assert_eq!(t.render_prompt(&results), "P X Q Y R");
    }

    #[test]
    fn ready_set_orders_by_priority_then_weight_then_age() {
        let registry_clients = HashMap::new();
        let registry = BackendRegistry::new(registry_clients);
        let mut scheduler = Scheduler::new(&registry, "u1");
        scheduler.add(task("low", Priority::Low, &[]).with_weight(0.9));
        scheduler.add(task("high", Priority::High, &[]).with_weight(0.1));
        scheduler.add(task("critical", Priority::Critical, &[]).with_weight(0.1));
        let ready = scheduler.ready_set();
        assert_eq!(ready, vec!["critical".to_string(), "high".to_string(), "low".to_string()]);
    }
}
