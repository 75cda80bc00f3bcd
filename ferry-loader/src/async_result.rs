use crossbeam_channel::{Receiver, TryRecvError};
use ferry_base::{LoadError, LoadResult};

/// Handle to the result of a job submitted to the [`AsyncExecutor`](crate::AsyncExecutor).
///
/// The worker thread sends exactly one result through the channel. Polling with `is_done()` never
/// blocks and may be called as often as needed; the result is held until `get()` takes it.
pub struct AsyncResult<T> {
    rx: Receiver<LoadResult<T>>,
    result: Option<LoadResult<T>>,
}

impl<T> AsyncResult<T> {
    pub(crate) fn new(rx: Receiver<LoadResult<T>>) -> Self {
        AsyncResult { rx, result: None }
    }

    /// A result that is already resolved, used when a job could not be queued at all
    pub(crate) fn ready(result: LoadResult<T>) -> Self {
        let (_, rx) = crossbeam_channel::bounded(1);
        AsyncResult {
            rx,
            result: Some(result),
        }
    }

    /// Non-blocking check for whether the job has finished, successfully or not
    pub fn is_done(&mut self) -> bool {
        if self.result.is_none() {
            match self.rx.try_recv() {
                Ok(result) => self.result = Some(result),
                Err(TryRecvError::Empty) => {}
                // The job was dropped without sending anything, the pool is gone
                Err(TryRecvError::Disconnected) => {
                    self.result = Some(Err(LoadError::WorkerDisconnected))
                }
            }
        }

        self.result.is_some()
    }

    /// Blocks until the job finishes and returns its result. Errors raised (or panics) inside the
    /// job are returned here.
    pub fn get(mut self) -> LoadResult<T> {
        if let Some(result) = self.result.take() {
            return result;
        }

        match self.rx.recv() {
            Ok(result) => result,
            Err(_) => Err(LoadError::WorkerDisconnected),
        }
    }
}

impl<T> std::fmt::Debug for AsyncResult<T> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("AsyncResult")
            .field("received", &self.result.is_some())
            .finish()
    }
}
