use super::{AgentPort, AgentRequest, AgentResponse};
use crate::errors::AgentError;
use async_trait::async_trait;

/// Agent used with `--offline`: every call fails upstream, so each phase runs
/// its degraded fallback. Useful for exercising the gates without a model.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineAgent;

#[async_trait]
impl AgentPort for OfflineAgent {
    async fn invoke(&self, request: AgentRequest) -> Result<AgentResponse, AgentError> {
        Err(AgentError::UpstreamFailure {
            phase: request.phase,
            message: "offline mode: no agent configured".to_string(),
        })
    }
}
