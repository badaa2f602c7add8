//! Strictly sequential batch execution with fixed pacing.

use tokio::time::sleep;
use tracing::{debug, info};

use crate::config::{ProtocolConfig, ProtocolProfile};
use crate::error::TTSResult;
use crate::session::open_session;
use crate::types::{BatchJob, SynthesisResult};

/// Runs batches of synthesis requests one session at a time.
///
/// The coordinator awaits each session's terminal outcome before opening the
/// next, pauses for the inter-request delay while work remains, and aborts
/// on the first failure without opening further sessions. There is no
/// keep-going mode: a batch either returns every result in request order or
/// the first error.
#[derive(Debug, Clone)]
pub struct BatchCoordinator {
    profile: ProtocolProfile,
    config: ProtocolConfig,
}

impl BatchCoordinator {
    pub fn new(profile: ProtocolProfile, config: ProtocolConfig) -> Self {
        Self { profile, config }
    }

    /// Executes every request in submission order, failing fast.
    pub async fn run(&self, job: BatchJob) -> TTSResult<Vec<SynthesisResult>> {
        let delay = job
            .inter_request_delay
            .unwrap_or_else(|| self.config.inter_request_delay());
        let total = job.requests.len();
        info!(total, ?delay, profile = %self.profile, "running synthesis batch");

        let mut results = Vec::with_capacity(total);
        for (index, request) in job.requests.into_iter().enumerate() {
            debug!(index, total, "opening batch session");
            let handle = open_session(self.profile, self.config.clone(), request)?;
            let result = handle.result().await?;
            results.push(result);
            // No pause after the last request.
            if index + 1 < total {
                sleep(delay).await;
            }
        }
        info!(total, "synthesis batch finished");
        Ok(results)
    }
}

/// Runs one batch without keeping a coordinator around.
pub async fn run_batch(
    profile: ProtocolProfile,
    config: ProtocolConfig,
    job: BatchJob,
) -> TTSResult<Vec<SynthesisResult>> {
    BatchCoordinator::new(profile, config).run(job).await
}
