use crate::{
    AssetRegistry, AsyncExecutor, AsyncLoadData, AsyncResult, AsynchronousAssetLoader,
    LoaderKind, SynchronousAssetLoader,
};
use ferry_base::{Asset, AssetDescriptor, AssetKey, FileHandle, LoadError, LoadResult};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What a task reports back to the asset manager after an `update()`. The task never touches the
/// manager's queue or registry itself, the manager acts on this value.
#[derive(Debug)]
pub enum TaskStatus {
    // Still working, poll again next tick
    Pending,
    // These must be in the registry before the task can continue
    NeedsDependencies(Vec<AssetDescriptor>),
    // The asset is ready to be taken with `into_asset()`
    Completed,
    // The task was cancelled and has no in-flight work left, it can be dropped
    Cancelled,
}

// Output of the off-thread job an asynchronous loader uses to find its dependencies. When there
// are none, the same job runs load_async right away to avoid another round trip through the pool.
enum DependencyDiscovery {
    Dependencies(Vec<AssetDescriptor>),
    AsyncDone(AsyncLoadData),
}

enum LoadingTaskState {
    Created,
    // Asynchronous loaders only
    DiscoveringDependencies(AsyncResult<DependencyDiscovery>),
    // Waiting for the asset manager to report that every dependency is loaded
    DependenciesPending,
    // Asynchronous loaders only
    LoadingAsyncPhase(AsyncResult<AsyncLoadData>),
    Completed,
    Cancelled,
    Failed(LoadError),
}

impl LoadingTaskState {
    fn name(&self) -> &'static str {
        match self {
            LoadingTaskState::Created => "Created",
            LoadingTaskState::DiscoveringDependencies(_) => "DiscoveringDependencies",
            LoadingTaskState::DependenciesPending => "DependenciesPending",
            LoadingTaskState::LoadingAsyncPhase(_) => "LoadingAsyncPhase",
            LoadingTaskState::Completed => "Completed",
            LoadingTaskState::Cancelled => "Cancelled",
            LoadingTaskState::Failed(_) => "Failed",
        }
    }
}

/// Drives a single descriptor from request to loaded asset.
///
/// Synchronous loaders go `Created -> DependenciesPending -> Completed`, skipping straight to
/// `Completed` when there are no dependencies. Asynchronous loaders go `Created ->
/// DiscoveringDependencies -> DependenciesPending -> LoadingAsyncPhase -> Completed`, where the
/// discovery job may also finish the async phase when there are no dependencies.
///
/// `update()` must only be called from the driving thread. `load()` and `load_sync()` run inside it;
/// everything passed to the executor runs on worker threads.
pub struct LoadingTask {
    descriptor: AssetDescriptor,
    loader: LoaderKind,
    start_time: Instant,
    state: LoadingTaskState,
    dependencies: Option<Vec<AssetDescriptor>>,
    // Set by the asset manager once every dependency is in the registry
    dependencies_loaded: bool,
    // The off-thread phase has finished. Tracked separately from dependencies_loaded because the
    // discovery job can run the async phase before the dependency state is recorded.
    async_done: bool,
    asset: Option<Box<dyn Asset>>,
    // Poll count, only for diagnostics
    ticks: u32,
    cancelled: bool,
}

impl LoadingTask {
    pub fn new(
        descriptor: AssetDescriptor,
        loader: LoaderKind,
    ) -> Self {
        LoadingTask {
            descriptor,
            loader,
            start_time: Instant::now(),
            state: LoadingTaskState::Created,
            dependencies: None,
            dependencies_loaded: false,
            async_done: false,
            asset: None,
            ticks: 0,
            cancelled: false,
        }
    }

    pub fn descriptor(&self) -> &AssetDescriptor {
        &self.descriptor
    }

    pub fn key(&self) -> &AssetKey {
        self.descriptor.key()
    }

    /// Dependencies reported by the loader, once discovered. `Some(empty)` is never stored, a task
    /// without dependencies keeps `None`.
    pub fn dependencies(&self) -> Option<&[AssetDescriptor]> {
        self.dependencies.as_deref()
    }

    pub fn is_dependencies_loaded(&self) -> bool {
        self.dependencies_loaded
    }

    pub fn is_async_done(&self) -> bool {
        self.async_done
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.state, LoadingTaskState::Completed)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn state_name(&self) -> &'static str {
        self.state.name()
    }

    /// Stops the task from starting any new phase. Work already running on the pool finishes and is
    /// then thrown away.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    /// Undoes `cancel()` if the task has not been discarded yet
    pub fn resume(&mut self) {
        self.cancelled = false;
    }

    /// Called by the asset manager when every dependency has been loaded
    pub fn notify_dependencies_loaded(&mut self) {
        self.dependencies_loaded = true;
    }

    /// Takes the loaded asset out of a completed task
    pub fn into_asset(self) -> Option<Box<dyn Asset>> {
        self.asset
    }

    /// Advances the state machine by at most one step. Never blocks.
    pub fn update(
        &mut self,
        executor: &AsyncExecutor,
        assets: &AssetRegistry,
    ) -> LoadResult<TaskStatus> {
        self.ticks += 1;

        let state = std::mem::replace(&mut self.state, LoadingTaskState::Created);
        let result = if self.cancelled {
            Ok(self.update_cancelled(state))
        } else {
            match self.loader.clone() {
                LoaderKind::Synchronous(loader) => self.update_synchronous(&loader, state, assets),
                LoaderKind::Asynchronous(loader) => {
                    self.update_asynchronous(&loader, state, executor, assets)
                }
            }
        };

        match result {
            Ok((state, status)) => {
                log::trace!(
                    "task {} tick {} -> {} {:?}",
                    self.descriptor.file_name(),
                    self.ticks,
                    state.name(),
                    status
                );
                self.state = state;
                Ok(status)
            }
            Err(error) => {
                self.state = LoadingTaskState::Failed(error.clone());
                Err(error)
            }
        }
    }

    fn update_cancelled(
        &mut self,
        state: LoadingTaskState,
    ) -> (LoadingTaskState, TaskStatus) {
        // In-flight jobs are left to finish so nothing is still using the loader when we report
        // back. Their results are dropped.
        match state {
            LoadingTaskState::DiscoveringDependencies(mut future) => {
                if future.is_done() {
                    (LoadingTaskState::Cancelled, TaskStatus::Cancelled)
                } else {
                    (
                        LoadingTaskState::DiscoveringDependencies(future),
                        TaskStatus::Pending,
                    )
                }
            }
            LoadingTaskState::LoadingAsyncPhase(mut future) => {
                if future.is_done() {
                    (LoadingTaskState::Cancelled, TaskStatus::Cancelled)
                } else {
                    (LoadingTaskState::LoadingAsyncPhase(future), TaskStatus::Pending)
                }
            }
            LoadingTaskState::Completed => (LoadingTaskState::Completed, TaskStatus::Completed),
            _ => (LoadingTaskState::Cancelled, TaskStatus::Cancelled),
        }
    }

    fn update_synchronous(
        &mut self,
        loader: &Arc<dyn SynchronousAssetLoader>,
        state: LoadingTaskState,
        assets: &AssetRegistry,
    ) -> LoadResult<(LoadingTaskState, TaskStatus)> {
        match state {
            LoadingTaskState::Created => {
                let file = self.resolve_file()?;
                let dependencies = loader
                    .dependencies(&self.descriptor, &file)
                    .map_err(|e| self.load_failed(e))?;

                if dependencies.is_empty() {
                    // Nothing to wait for, load in this same tick
                    self.dependencies_loaded = true;
                    self.load_synchronous(loader, &file, assets)
                } else {
                    Ok(self.request_dependencies(dependencies))
                }
            }
            LoadingTaskState::DependenciesPending => {
                if !self.dependencies_loaded {
                    return Ok((LoadingTaskState::DependenciesPending, TaskStatus::Pending));
                }

                let file = self.resolve_file()?;
                self.load_synchronous(loader, &file, assets)
            }
            state => self.update_terminal(state),
        }
    }

    fn update_asynchronous(
        &mut self,
        loader: &Arc<dyn AsynchronousAssetLoader>,
        state: LoadingTaskState,
        executor: &AsyncExecutor,
        assets: &AssetRegistry,
    ) -> LoadResult<(LoadingTaskState, TaskStatus)> {
        match state {
            LoadingTaskState::Created => {
                let file = self.resolve_file()?;
                let descriptor = self.descriptor.clone();
                let loader = loader.clone();
                let future = executor.submit(
                    format!("dependencies of {}", descriptor.file_name()),
                    move || {
                        let dependencies = loader.dependencies(&descriptor, &file)?;
                        if dependencies.is_empty() {
                            let data = loader.load_async(&descriptor, &file)?;
                            Ok(DependencyDiscovery::AsyncDone(data))
                        } else {
                            Ok(DependencyDiscovery::Dependencies(dependencies))
                        }
                    },
                );

                Ok((
                    LoadingTaskState::DiscoveringDependencies(future),
                    TaskStatus::Pending,
                ))
            }
            LoadingTaskState::DiscoveringDependencies(mut future) => {
                if !future.is_done() {
                    return Ok((
                        LoadingTaskState::DiscoveringDependencies(future),
                        TaskStatus::Pending,
                    ));
                }

                match future.get().map_err(|e| self.worker_failed(e))? {
                    DependencyDiscovery::Dependencies(dependencies) => {
                        Ok(self.request_dependencies(dependencies))
                    }
                    DependencyDiscovery::AsyncDone(data) => {
                        self.dependencies_loaded = true;
                        self.async_done = true;
                        let file = self.resolve_file()?;
                        self.load_sync_phase(loader, &file, data, assets)
                    }
                }
            }
            LoadingTaskState::DependenciesPending => {
                if !self.dependencies_loaded {
                    return Ok((LoadingTaskState::DependenciesPending, TaskStatus::Pending));
                }

                self.check_dependencies_present(assets);
                let file = self.resolve_file()?;
                let descriptor = self.descriptor.clone();
                let loader = loader.clone();
                let future = executor.submit(
                    format!("load {}", descriptor.file_name()),
                    move || loader.load_async(&descriptor, &file),
                );

                Ok((
                    LoadingTaskState::LoadingAsyncPhase(future),
                    TaskStatus::Pending,
                ))
            }
            LoadingTaskState::LoadingAsyncPhase(mut future) => {
                if !future.is_done() {
                    return Ok((LoadingTaskState::LoadingAsyncPhase(future), TaskStatus::Pending));
                }

                let data = future.get().map_err(|e| self.worker_failed(e))?;
                self.async_done = true;
                let file = self.resolve_file()?;
                self.load_sync_phase(loader, &file, data, assets)
            }
            state => self.update_terminal(state),
        }
    }

    fn update_terminal(
        &mut self,
        state: LoadingTaskState,
    ) -> LoadResult<(LoadingTaskState, TaskStatus)> {
        match state {
            LoadingTaskState::Completed => Ok((LoadingTaskState::Completed, TaskStatus::Completed)),
            LoadingTaskState::Cancelled => Ok((LoadingTaskState::Cancelled, TaskStatus::Cancelled)),
            LoadingTaskState::Failed(error) => Err(error),
            state => Err(LoadError::StringError(format!(
                "Loading task for {} reached state {} with the wrong kind of loader",
                self.descriptor.file_name(),
                state.name()
            ))),
        }
    }

    fn request_dependencies(
        &mut self,
        dependencies: Vec<AssetDescriptor>,
    ) -> (LoadingTaskState, TaskStatus) {
        log::debug!(
            "{} has {} dependencies",
            self.descriptor.file_name(),
            dependencies.len()
        );
        self.dependencies = Some(dependencies.clone());
        (
            LoadingTaskState::DependenciesPending,
            TaskStatus::NeedsDependencies(dependencies),
        )
    }

    fn load_synchronous(
        &mut self,
        loader: &Arc<dyn SynchronousAssetLoader>,
        file: &FileHandle,
        assets: &AssetRegistry,
    ) -> LoadResult<(LoadingTaskState, TaskStatus)> {
        self.check_dependencies_present(assets);
        profiling::scope!("SynchronousAssetLoader::load");
        let asset = loader
            .load(assets, &self.descriptor, file)
            .map_err(|e| self.load_failed(e))?;
        Ok(self.complete(asset))
    }

    fn load_sync_phase(
        &mut self,
        loader: &Arc<dyn AsynchronousAssetLoader>,
        file: &FileHandle,
        data: AsyncLoadData,
        assets: &AssetRegistry,
    ) -> LoadResult<(LoadingTaskState, TaskStatus)> {
        self.check_dependencies_present(assets);
        profiling::scope!("AsynchronousAssetLoader::load_sync");
        let asset = loader
            .load_sync(assets, &self.descriptor, file, data)
            .map_err(|e| self.load_failed(e))?;
        Ok(self.complete(asset))
    }

    fn complete(
        &mut self,
        asset: Box<dyn Asset>,
    ) -> (LoadingTaskState, TaskStatus) {
        log::debug!(
            "Loaded: {:.3}ms {} ({} ticks)",
            self.start_time.elapsed().as_secs_f64() * 1000.0,
            self.descriptor.file_name(),
            self.ticks
        );
        self.asset = Some(asset);
        (LoadingTaskState::Completed, TaskStatus::Completed)
    }

    // The load phase may only run once everything it depends on is retrievable
    fn check_dependencies_present(
        &self,
        assets: &AssetRegistry,
    ) {
        debug_assert!(self.dependencies_loaded);
        debug_assert!(self
            .dependencies
            .iter()
            .flatten()
            .all(|dependency| assets.contains(dependency.key())));
    }

    fn resolve_file(&mut self) -> LoadResult<FileHandle> {
        let loader = &self.loader;
        self.descriptor
            .resolve_file(|file_name| loader.resolve(file_name))
            .map(|file| file.clone())
    }

    fn load_failed(
        &self,
        error: LoadError,
    ) -> LoadError {
        LoadError::LoadFailed {
            file_name: self.descriptor.file_name().to_string(),
            source: Arc::new(error),
        }
    }

    fn worker_failed(
        &self,
        error: LoadError,
    ) -> LoadError {
        LoadError::WorkerExecutionFailed {
            file_name: self.descriptor.file_name().to_string(),
            source: Arc::new(error),
        }
    }
}

impl std::fmt::Debug for LoadingTask {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("LoadingTask")
            .field("file_name", &self.descriptor.file_name())
            .field("state", &self.state.name())
            .field("dependencies_loaded", &self.dependencies_loaded)
            .field("async_done", &self.async_done)
            .field("ticks", &self.ticks)
            .field("cancelled", &self.cancelled)
            .finish()
    }
}
