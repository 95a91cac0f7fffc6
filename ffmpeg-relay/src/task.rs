use tokio_util::sync::CancellationToken;

use crate::{config::RelayConfig, session::RelayReport};

/// Runs a relay session on a blocking thread so it can be driven and
/// cancelled from async code.
pub struct RelayTask {
    cancel: CancellationToken,
}

impl RelayTask {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn run(&self, config: RelayConfig) -> anyhow::Result<RelayReport> {
        let cancel = self.cancel.clone();
        let handle = tokio::task::spawn_blocking(move || crate::relay(config, &cancel));
        let report = handle
            .await
            .map_err(|e| anyhow::anyhow!("relay thread failed: {}", e))??;
        Ok(report)
    }
}

impl Default for RelayTask {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Direction;
    use crate::error::{Endpoint, RelayError};

    #[tokio::test]
    async fn test_missing_input_is_open_error() {
        crate::init().unwrap();
        let config = RelayConfig::builder()
            .source("/nonexistent/input.flv")
            .destination("/tmp/lite-relay-never-written.flv")
            .direction(Direction::Receive)
            .build();

        let task = RelayTask::new();
        let err = task.run(config).await.unwrap_err();
        match err.downcast_ref::<RelayError>() {
            Some(RelayError::Open { endpoint, .. }) => assert_eq!(*endpoint, Endpoint::Input),
            other => panic!("expected input open error, got {:?}", other),
        }
        assert!(!std::path::Path::new("/tmp/lite-relay-never-written.flv").exists());
    }

    #[tokio::test]
    async fn test_stop_cancels_token() {
        let task = RelayTask::new();
        let token = task.cancel_token();
        assert!(!task.is_stopped());
        task.stop();
        assert!(token.is_cancelled());
    }
}
