use crate::error::Result;
use crate::models::{AccessContext, ActionDescriptor, ActionFailure};
use crate::state_machine::AbortReason;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Applies an ordered action sequence to one entity.
///
/// The executor calls this once per element with the task's full action list.
/// A returned [`ActionFailure`] is recorded against the element and never stops
/// the rest of the batch.
#[async_trait]
pub trait ActionEngine: Send + Sync {
    async fn apply(
        &self,
        ctx: &AccessContext,
        entity_id: &str,
        actions: &[ActionDescriptor],
    ) -> std::result::Result<(), ActionFailure>;
}

/// Checked at the top of every iteration; `false` halts the task for good.
#[async_trait]
pub trait PrincipalAuthorizer: Send + Sync {
    async fn is_authorized(&self, ctx: &AccessContext, initiator_id: &str) -> Result<bool>;
}

/// Authorizer for deployments where authorization is enforced upstream.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllAuthorizer;

#[async_trait]
impl PrincipalAuthorizer for AllowAllAuthorizer {
    async fn is_authorized(&self, _ctx: &AccessContext, _initiator_id: &str) -> Result<bool> {
        Ok(true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionSummary {
    pub processed_count: u64,
    pub expected_count: u64,
    pub error_count: u64,
}

/// Result of one executor iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IterationOutcome {
    /// A batch was committed and more elements may remain
    Continue { processed_count: u64 },
    Completed(CompletionSummary),
    Aborted(AbortReason),
}

impl IterationOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Continue { .. })
    }
}

/// Terminal result of driving a task to the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionOutcome {
    Completed(CompletionSummary),
    Aborted(AbortReason),
}
