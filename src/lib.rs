//! # Reasoning Core
//!
//! The core of a multi-agent reasoning orchestrator: a task DAG scheduler,
//! rate-limited backend clients, and a deterministic quality/contradiction
//! engine. A single user prompt is decomposed into a small set of
//! interdependent subtasks, each dispatched to one of several external LLM
//! backends, recovered from partial failure, scored for quality, checked
//! for cross-agent contradictions, and synthesized into one final report.
//!
//! The HTTP façade, the persistence layer, the session cache, and the wire
//! protocols of each vendor are out of scope — this crate specifies only
//! the boundary a conforming façade would call through
//! ([`memory::MemoryStore`], [`audit::AuditSink`], [`backend::LlmBackend`]).
//!
//! ## Core subsystems
//!
//! - **[`scheduler`]** (C3) — priority- and dependency-aware task executor
//!   with per-task timeouts, retry/backoff, and placeholder substitution.
//! - **[`backend`]** (C1) — per-backend token-bucket rate limiting, prompt
//!   truncation, and bounded-retry dispatch sitting between the scheduler
//!   and the vendor.
//! - **[`registry`]** (C2) — maps logical backend names to clients and
//!   wraps every call in a cancellation-bounded, audited span.
//! - **[`quality`]** (C4) — deterministic per-response scoring plus an
//!   LLM-based task-alignment probe.
//! - **[`contradiction`]** (C5) — pairwise cross-output contradiction
//!   detection and resolution.
//! - **[`orchestrator`]** (C6) — builds the canonical task plan, drives the
//!   subsystems above, and assembles the stable report shape.
//!
//! ## Ambient stack
//!
//! - **[`config`]** — environment-driven configuration with `.env` support
//!   and eager validation.
//! - **[`error`]** — the single crate-wide error taxonomy.
//! - **[`audit`]** — the best-effort per-action audit sink boundary.
//! - **[`memory`]** — the best-effort memory-store boundary.
//! - **[`hallucination`]** — the deterministic citation/hallucination check.
//! - **[`output_parser`]** — tolerant parsing of the small structured
//!   answers (numbers, JSON) LLM probes embed in free-form prose.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use reasoning_core::config::Config;
//! use reasoning_core::orchestrator::Orchestrator;
//! use reasoning_core::registry::BackendRegistry;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::load().expect("valid configuration");
//!     let registry = Arc::new(BackendRegistry::new(Default::default()));
//!     let orchestrator = Orchestrator::new(registry, config);
//!
//!     let report = orchestrator.reason("user-1", "Explain binary search", "explanation").await;
//!     println!("{}", serde_json::to_string_pretty(&report).unwrap());
//! }
//! ```

pub mod audit;
pub mod backend;
pub mod config;
pub mod contradiction;
pub mod error;
pub mod hallucination;
pub mod memory;
pub mod orchestrator;
pub mod output_parser;
pub mod quality;
pub mod registry;
pub mod report;
pub mod scheduler;
pub mod types;

pub use audit::{AuditSink, AuditStart, AuditEnd, AuditStatus, NoopAuditSink};
pub use backend::{LlmBackend, MockLlmBackend, RateLimitedClient, TokenBucket};
pub use config::Config;
pub use contradiction::ContradictionEngine;
pub use error::{CoreError, Result};
pub use memory::{MemoryStore, NoopMemoryStore, Recollection};
pub use orchestrator::Orchestrator;
pub use quality::QualityScorer;
pub use registry::BackendRegistry;
pub use report::Report;
pub use scheduler::Scheduler;
pub use types::{
    AccuracyIndicators, BackendId, ContentFlag, Contradiction, ContradictionKind,
    ContradictionReport, Priority, QualityMetrics, Severity, Task, TaskResult,
};
