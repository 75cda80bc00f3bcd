use crate::AsyncResult;
use crossbeam_channel::{Receiver, Sender};
use ferry_base::{LoadError, LoadResult};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

// A unit of work queued for the pool. The job sends its own result back through the channel owned
// by the matching AsyncResult
struct AsyncExecutorRequest {
    debug_name: String,
    job: Box<dyn FnOnce() + Send>,
}

// Thread that tries to take jobs out of the request channel and ends when the finish channel is signalled
struct AsyncExecutorWorkerThread {
    finish_tx: Sender<()>,
    join_handle: JoinHandle<()>,
}

impl AsyncExecutorWorkerThread {
    fn new(
        thread_name: String,
        request_rx: Receiver<AsyncExecutorRequest>,
        active_request_count: Arc<AtomicUsize>,
    ) -> LoadResult<Self> {
        let (finish_tx, finish_rx) = crossbeam_channel::bounded(1);
        let join_handle = std::thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                profiling::register_thread!(&thread_name);
                loop {
                    crossbeam_channel::select! {
                        recv(request_rx) -> msg => {
                            let request = match msg {
                                Ok(request) => request,
                                // Every sender is gone, nothing more can arrive
                                Err(_) => return,
                            };

                            profiling::scope!("AsyncExecutorRequest");
                            log::trace!("{} running job {}", thread_name, request.debug_name);
                            (request.job)();
                            active_request_count.fetch_sub(1, Ordering::Release);
                        },
                        recv(finish_rx) -> _msg => {
                            return;
                        }
                    }
                }
            })?;

        Ok(AsyncExecutorWorkerThread {
            finish_tx,
            join_handle,
        })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// A fixed-size pool of worker threads for the off-thread phases of asset loading.
///
/// Jobs submitted independently may run in any order and in parallel. Dropping the pool signals
/// every worker and joins them; jobs still waiting in the queue are dropped, which resolves their
/// `AsyncResult` with `WorkerDisconnected`.
pub struct AsyncExecutor {
    worker_threads: Vec<AsyncExecutorWorkerThread>,
    request_tx: Sender<AsyncExecutorRequest>,
    active_request_count: Arc<AtomicUsize>,
}

impl AsyncExecutor {
    pub fn new(
        thread_count: usize,
        thread_name: &str,
    ) -> LoadResult<Self> {
        let thread_count = thread_count.max(1);
        let (request_tx, request_rx) = crossbeam_channel::unbounded::<AsyncExecutorRequest>();
        let active_request_count = Arc::new(AtomicUsize::new(0));

        let mut worker_threads = Vec::with_capacity(thread_count);
        for thread_index in 0..thread_count {
            let worker = AsyncExecutorWorkerThread::new(
                format!("{} {}", thread_name, thread_index),
                request_rx.clone(),
                active_request_count.clone(),
            )?;
            worker_threads.push(worker);
        }

        log::info!(
            "Started asset loader pool with {} threads",
            worker_threads.len()
        );

        Ok(AsyncExecutor {
            worker_threads,
            request_tx,
            active_request_count,
        })
    }

    pub fn thread_count(&self) -> usize {
        self.worker_threads.len()
    }

    pub fn is_idle(&self) -> bool {
        self.active_request_count() == 0
    }

    /// Number of jobs queued or running
    pub fn active_request_count(&self) -> usize {
        self.active_request_count.load(Ordering::Relaxed)
    }

    /// Queues `job` on the pool. Errors returned by the job, and panics inside it, are captured and
    /// handed back through the returned `AsyncResult`.
    pub fn submit<T, F>(
        &self,
        debug_name: impl Into<String>,
        job: F,
    ) -> AsyncResult<T>
    where
        T: Send + 'static,
        F: FnOnce() -> LoadResult<T> + Send + 'static,
    {
        let (result_tx, result_rx) = crossbeam_channel::bounded(1);
        let request = AsyncExecutorRequest {
            debug_name: debug_name.into(),
            job: Box::new(move || {
                let result = match std::panic::catch_unwind(AssertUnwindSafe(job)) {
                    Ok(result) => result,
                    Err(panic) => Err(LoadError::WorkerPanicked(panic_message(&*panic))),
                };

                // The receiver is gone if whoever submitted the job stopped caring about it
                let _ = result_tx.send(result);
            }),
        };

        self.active_request_count.fetch_add(1, Ordering::Release);
        if self.request_tx.send(request).is_err() {
            self.active_request_count.fetch_sub(1, Ordering::Release);
            return AsyncResult::ready(Err(LoadError::WorkerDisconnected));
        }

        AsyncResult::new(result_rx)
    }
}

impl Drop for AsyncExecutor {
    fn drop(&mut self) {
        for worker_thread in &self.worker_threads {
            let _ = worker_thread.finish_tx.send(());
        }

        for worker_thread in self.worker_threads.drain(..) {
            if worker_thread.join_handle.join().is_err() {
                log::error!("Asset loader thread panicked while shutting down");
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    fn wait_until_done<T>(result: &mut AsyncResult<T>) {
        while !result.is_done() {
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn job_result_is_returned() {
        let executor = AsyncExecutor::new(2, "test").unwrap();
        let mut result = executor.submit("add", || Ok(40 + 2));
        wait_until_done(&mut result);
        assert_eq!(result.get().unwrap(), 42);
    }

    #[test]
    fn get_blocks_until_done() {
        let executor = AsyncExecutor::new(1, "test").unwrap();
        let result = executor.submit("slow", || {
            std::thread::sleep(Duration::from_millis(20));
            Ok("done")
        });
        assert_eq!(result.get().unwrap(), "done");
    }

    #[test]
    fn job_errors_are_captured() {
        let executor = AsyncExecutor::new(1, "test").unwrap();
        let result = executor.submit::<(), _>("fail", || {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "missing").into())
        });
        assert!(matches!(result.get(), Err(LoadError::IoError(_))));
    }

    #[test]
    fn job_panics_are_captured() {
        let executor = AsyncExecutor::new(1, "test").unwrap();
        let result = executor.submit::<(), _>("panic", || panic!("decoder exploded"));
        match result.get() {
            Err(LoadError::WorkerPanicked(message)) => assert_eq!(message, "decoder exploded"),
            other => panic!("unexpected result {:?}", other),
        }

        // The worker survives the panic and keeps taking jobs
        assert_eq!(executor.submit("after", || Ok(1)).get().unwrap(), 1);
    }

    #[test]
    fn jobs_run_off_the_submitting_thread() {
        let executor = AsyncExecutor::new(3, "test").unwrap();
        let thread_ids = Arc::new(Mutex::new(Vec::new()));
        let results: Vec<_> = (0..8)
            .map(|i| {
                let thread_ids = thread_ids.clone();
                executor.submit(format!("job {}", i), move || {
                    thread_ids.lock().unwrap().push(std::thread::current().id());
                    Ok(i)
                })
            })
            .collect();

        let sum: i32 = results.into_iter().map(|x| x.get().unwrap()).sum();
        assert_eq!(sum, (0..8).sum::<i32>());

        let current = std::thread::current().id();
        let thread_ids = thread_ids.lock().unwrap();
        assert_eq!(thread_ids.len(), 8);
        assert!(thread_ids.iter().all(|x| *x != current));
        assert_eq!(executor.thread_count(), 3);
    }

    #[test]
    fn zero_threads_still_runs_jobs() {
        let executor = AsyncExecutor::new(0, "test").unwrap();
        assert_eq!(executor.thread_count(), 1);
        assert_eq!(executor.submit("job", || Ok(5)).get().unwrap(), 5);
    }
}
