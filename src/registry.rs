//! The Backend Registry and timed call wrapper (C2, §4.2).
//!
//! Holds one [`RateLimitedClient`] per configured [`BackendId`] and exposes
//! the single operation the scheduler calls: `call_with_timeout`. Every
//! call is wrapped in a best-effort audit span — the audit sink never
//! influences the returned `Result` (§4.2, §5 "Shared-resource policy").

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::audit::{emit_end, emit_start, AuditEnd, AuditSink, AuditStart, AuditStatus, NoopAuditSink};
use crate::backend::RateLimitedClient;
use crate::error::{CoreError, Result};
use crate::types::BackendId;

/// Maps logical backend names to their rate-limited clients (§4.2).
pub struct BackendRegistry {
    clients: HashMap<BackendId, Arc<RateLimitedClient>>,
    audit: Arc<dyn AuditSink>,
    conversation_id: Uuid,
}

impl BackendRegistry {
    pub fn new(clients: HashMap<BackendId, Arc<RateLimitedClient>>) -> Self {
        Self {
            clients,
            audit: Arc::new(NoopAuditSink),
            conversation_id: Uuid::new_v4(),
        }
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = sink;
        self
    }

    pub fn client(&self, backend: BackendId) -> Option<&Arc<RateLimitedClient>> {
        self.clients.get(&backend)
    }

    /// `CallWithTimeout(backend, prompt, timeout, userID, taskType) ->
    /// (output, error)` (§4.2). Cancels the in-flight call when `timeout`
    /// elapses (§5 "Cancellation and timeouts"); every other failure is
    /// surfaced as whatever [`RateLimitedClient::invoke`] returned.
    pub async fn call_with_timeout(
        &self,
        backend: BackendId,
        prompt: &str,
        timeout: Duration,
        user_id: &str,
        task_type: &str,
    ) -> Result<String> {
        let client = self
            .clients
            .get(&backend)
            .ok_or_else(|| CoreError::Validation(format!("unknown backend '{backend}'")))?;

        let action_id = Uuid::new_v4();
        emit_start(
            &self.audit,
            &AuditStart {
                action_id,
                user_id: user_id.to_string(),
                conversation_id: self.conversation_id,
                backend: backend.as_str(),
                task_type: task_type.to_string(),
                prompt: prompt.to_string(),
            },
        );

        let started = Instant::now();
        let outcome = tokio::time::timeout(timeout, client.invoke(prompt, 2048)).await;

        let (result, status, error_text) = match outcome {
            Ok(Ok(text)) => (Ok(text.clone()), AuditStatus::Completed, None),
            Ok(Err(err)) => {
                let text = err.reason();
                (Err(err), AuditStatus::Error, Some(text))
            }
            Err(_) => {
                let err = CoreError::Timeout {
                    task: task_type.to_string(),
                    elapsed: started.elapsed(),
                };
                let text = err.reason();
                (Err(err), AuditStatus::Timeout, Some(text))
            }
        };

        emit_end(
            &self.audit,
            &AuditEnd {
                action_id,
                status,
                response: result.as_ref().ok().cloned(),
                error: error_text,
                duration: started.elapsed(),
            },
        );

        result
    }
}
