use crate::{
    config::GenerationConfig,
    error::{EngineError, Result},
    model::{Artifact, GenerationKind, GenerationRequest, GenerationStatus},
    provider::{GenerationProvider, OperationStatus},
};
use std::future::Future;
use std::sync::Arc;
use tokio::time::{sleep, Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Race a provider call against cancellation. A cancel that lands while the
/// call is in flight settles as `Cancelled` even when the call completes in
/// the same scheduler pass, so its result is never acted on.
async fn guarded<F, T>(cancel: &CancellationToken, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let value = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(EngineError::Cancelled),
        value = call => value?,
    };
    if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }
    Ok(value)
}

/// Resolves a generation request to a single artifact or a terminal failure,
/// hiding the polling mechanics of long-running provider operations.
///
/// The coordinator suspends the caller without blocking other work, never
/// retries a failed operation, and mutates no shared state; callers apply
/// the artifact themselves.
pub struct GenerationCoordinator<P> {
    provider: Arc<P>,
    config: GenerationConfig,
}

impl<P: GenerationProvider> GenerationCoordinator<P> {
    pub fn new(provider: Arc<P>, config: GenerationConfig) -> Self {
        Self { provider, config }
    }

    /// Run one generation to completion. Cancelling the token stops polling
    /// immediately and settles the call as `Cancelled` — never as success or
    /// failure.
    pub async fn run(
        &self,
        request: &GenerationRequest,
        cancel: CancellationToken,
    ) -> Result<Artifact> {
        request.validate()?;

        match request.kind {
            GenerationKind::Image | GenerationKind::StyleTransfer => {
                self.run_image(request, cancel).await
            }
            GenerationKind::Video => self.run_video(request, cancel).await,
        }
    }

    async fn run_image(
        &self,
        request: &GenerationRequest,
        cancel: CancellationToken,
    ) -> Result<Artifact> {
        guarded(
            &cancel,
            self.provider.generate_image(
                &request.prompt,
                request.source_image.as_deref(),
                request.aspect_ratio.as_str(),
            ),
        )
        .await
    }

    async fn run_video(
        &self,
        request: &GenerationRequest,
        cancel: CancellationToken,
    ) -> Result<Artifact> {
        let interval = Duration::from_secs(self.config.poll_interval_seconds);
        let started = Instant::now();

        let operation = self
            .provider
            .start_video(&request.prompt, request.source_image.as_deref())
            .await?;
        tracing::info!(
            operation = %operation.handle.0,
            status = ?GenerationStatus::Submitted,
            "Video generation submitted"
        );

        let mut status = operation.status;
        loop {
            match status {
                OperationStatus::Done { video_uri: Some(uri) } => {
                    let artifact = guarded(&cancel, self.provider.fetch_artifact(&uri)).await?;
                    tracing::info!(
                        operation = %operation.handle.0,
                        status = ?GenerationStatus::Succeeded,
                        bytes = artifact.data.len(),
                        "Video generation complete"
                    );
                    return Ok(artifact);
                }
                OperationStatus::Done { video_uri: None } => {
                    tracing::warn!(
                        operation = %operation.handle.0,
                        status = ?GenerationStatus::Failed,
                        "Operation finished without a result reference"
                    );
                    return Err(EngineError::GenerationFailed(
                        "Operation completed without a result reference".to_string(),
                    ));
                }
                OperationStatus::Pending => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(EngineError::Cancelled),
                        _ = sleep(interval) => {}
                    }

                    if let Some(max_wait_seconds) = self.config.max_wait_seconds {
                        if started.elapsed() > Duration::from_secs(max_wait_seconds) {
                            return Err(EngineError::GenerationTimeout { max_wait_seconds });
                        }
                    }

                    tracing::debug!(
                        operation = %operation.handle.0,
                        status = ?GenerationStatus::Polling,
                        elapsed_secs = started.elapsed().as_secs(),
                        "Polling video operation"
                    );
                    status = guarded(&cancel, self.provider.poll_video(&operation.handle)).await?;
                }
            }
        }
    }
}
