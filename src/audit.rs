//! Per-action audit sink (the `AuditSink` external collaborator, §6).
//!
//! Mirrors the teacher's event-handler pattern (optional, non-intrusive,
//! closure-friendly) but carries the business-level lifecycle of a backend
//! call rather than payload/streaming telemetry: a "started" record before
//! dispatch, and a "completed"/"error"/"timeout" update after. Audit writes
//! are best-effort — a sink failure is logged and discarded, never
//! propagated into the caller's result (§4.2, §5).

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

/// The lifecycle status recorded on an audit action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStatus {
    Started,
    Completed,
    Error,
    Timeout,
}

/// A single audited backend call, as started.
#[derive(Debug, Clone)]
pub struct AuditStart {
    pub action_id: Uuid,
    pub user_id: String,
    pub conversation_id: Uuid,
    pub backend: &'static str,
    pub task_type: String,
    pub prompt: String,
}

/// The outcome of a previously started audited call.
#[derive(Debug, Clone)]
pub struct AuditEnd {
    pub action_id: Uuid,
    pub status: AuditStatus,
    pub response: Option<String>,
    pub error: Option<String>,
    pub duration: Duration,
}

/// Receives audit lifecycle events. Implementations are expected to be
/// best-effort: returning an error here is swallowed by the caller, never
/// surfaced to the reasoning result.
pub trait AuditSink: Send + Sync {
    /// Record that a backend call has started. Returns the same `action_id`
    /// the caller passed in `start`, so implementations that fan out to
    /// external storage can correlate without inventing their own key.
    fn log(&self, start: &AuditStart);

    /// Record the outcome of a previously logged call.
    fn update(&self, end: &AuditEnd);
}

/// An [`AuditSink`] that discards every event. The default when no sink is
/// configured — auditing is a collaborator, not a requirement (§1).
#[derive(Debug, Default)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn log(&self, _start: &AuditStart) {}
    fn update(&self, _end: &AuditEnd) {}
}

/// An [`AuditSink`] backed by a pair of closures, for tests and lightweight
/// integrations that don't need a full implementation.
pub struct FnAuditSink<L, U>
where
    L: Fn(&AuditStart) + Send + Sync,
    U: Fn(&AuditEnd) + Send + Sync,
{
    pub on_log: L,
    pub on_update: U,
}

impl<L, U> AuditSink for FnAuditSink<L, U>
where
    L: Fn(&AuditStart) + Send + Sync,
    U: Fn(&AuditEnd) + Send + Sync,
{
    fn log(&self, start: &AuditStart) {
        (self.on_log)(start)
    }
    fn update(&self, end: &AuditEnd) {
        (self.on_update)(end)
    }
}

/// Emit a best-effort `log` call, never panicking the caller even if the
/// sink itself is misbehaving in a way `catch_unwind` can observe.
pub(crate) fn emit_start(sink: &Arc<dyn AuditSink>, start: &AuditStart) {
    let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| sink.log(start)));
}

/// Emit a best-effort `update` call.
pub(crate) fn emit_end(sink: &Arc<dyn AuditSink>, end: &AuditEnd) {
    let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| sink.update(end)));
}
