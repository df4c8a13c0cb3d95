use std::future::Future;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::ClientError;

/// Outcome of one dispatched chunk request.
type ChunkOutcome = (u64, Result<(), ClientError>);

/// Issues chunk requests with at most `window` of them unacknowledged at
/// once.
///
/// When the window is full, [`submit`](Self::submit) waits for *any one*
/// outstanding request to finish before spawning the next — completion
/// order, not submission order. The first failure cancels the shared
/// token, aborts everything still in flight, and is returned to the
/// caller; nothing further is submitted for a doomed transfer.
pub struct BoundedDispatcher {
    window: usize,
    inflight: JoinSet<ChunkOutcome>,
    cancel: CancellationToken,
}

impl BoundedDispatcher {
    /// Creates a dispatcher with the given window (clamped to at least 1).
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            inflight: JoinSet::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Token cancelled on the first observed failure.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Requests currently unacknowledged.
    pub fn in_flight(&self) -> usize {
        self.inflight.len()
    }

    /// Spawns the request for chunk `index`, first waiting for a free slot.
    ///
    /// Returns the first chunk failure as soon as it is observed, whether
    /// it came from a slot wait here or from an earlier submit.
    pub async fn submit<F>(&mut self, index: u64, request: F) -> Result<(), ClientError>
    where
        F: Future<Output = Result<(), ClientError>> + Send + 'static,
    {
        while self.inflight.len() >= self.window {
            self.wait_one().await?;
        }
        if self.cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }

        let cancel = self.cancel.clone();
        self.inflight.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => (index, Err(ClientError::Cancelled)),
                result = request => (index, result),
            }
        });
        Ok(())
    }

    /// Waits for every outstanding request, surfacing the first failure.
    pub async fn drain(&mut self) -> Result<(), ClientError> {
        while !self.inflight.is_empty() {
            self.wait_one().await?;
        }
        Ok(())
    }

    async fn wait_one(&mut self) -> Result<(), ClientError> {
        match self.inflight.join_next().await {
            None => Ok(()),
            Some(Ok((_, Ok(())))) => Ok(()),
            Some(Ok((index, Err(e)))) => {
                tracing::warn!(chunk_index = index, error = %e, "chunk failed, cancelling transfer");
                self.cancel.cancel();
                self.inflight.abort_all();
                Err(e)
            }
            Some(Err(join_err)) => {
                self.cancel.cancel();
                self.inflight.abort_all();
                Err(ClientError::TaskJoin(join_err.to_string()))
            }
        }
    }
}
