use crate::asset_registry::AssetRegistryEntry;
use crate::{
    AssetManagerConfig, AssetRegistry, AsyncExecutor, LoaderKind, LoadingTask, TaskStatus,
};
use ferry_base::hashing::{HashMap, HashSet};
use ferry_base::{Asset, AssetDescriptor, AssetKey, AssetTypeId, LoadError, LoadResult};
use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;
use type_uuid::TypeUuid;

// How long the blocking calls sleep between passes while work is on the pool
const WAIT_INTERVAL: Duration = Duration::from_millis(1);

// A load that has been requested but is not in the registry yet
struct QueuedLoad {
    task: LoadingTask,
    // Explicit load() calls plus one per queued load that depends on this one
    ref_count: u32,
    // References this load holds on its dependencies, released if it fails or is cancelled and
    // handed to the registry entry when it completes
    dependencies: Vec<AssetKey>,
    // Number of dependencies not in the registry yet
    blocking_dependency_count: usize,
    // Loads waiting on this one, notified when it completes
    blocked_loads: Vec<AssetKey>,
}

/// Loads assets through registered loaders, deduplicating requests and tracking how many users each
/// asset has.
///
/// Call `load()` to request an asset and `update()` once per frame (or `finish_loading()`) to make
/// progress. Expensive work runs on a worker pool, everything else including all bookkeeping runs on
/// the thread that calls `update()`. Assets are not required to be `Send`, so the manager stays on
/// the thread that created it.
pub struct AssetManager {
    // Loaders by asset type, each with the file name suffix it is restricted to ("" for any)
    loaders: HashMap<AssetTypeId, Vec<(String, LoaderKind)>>,
    executor: AsyncExecutor,
    registry: AssetRegistry,
    // Keys of in-flight loads in the order they were requested
    queue: Vec<AssetKey>,
    in_flight: HashMap<AssetKey, QueuedLoad>,
    // Loads requested since the queue was last empty, for progress()
    requested_count: usize,
}

impl AssetManager {
    pub fn new(config: &AssetManagerConfig) -> LoadResult<Self> {
        let executor =
            AsyncExecutor::new(config.worker_thread_count, &config.worker_thread_name)?;

        Ok(AssetManager {
            loaders: Default::default(),
            executor,
            registry: AssetRegistry::new(),
            queue: Default::default(),
            in_flight: Default::default(),
            requested_count: 0,
        })
    }

    //
    // Loader registration
    //

    /// Registers the loader used for every asset of type `T`
    pub fn set_loader<T: TypeUuid>(
        &mut self,
        loader: LoaderKind,
    ) {
        self.set_loader_with_suffix::<T>("", loader);
    }

    /// Registers a loader for assets of type `T` whose file name ends with `suffix`. When several
    /// loaders match a file name, the one with the longest suffix is used.
    pub fn set_loader_with_suffix<T: TypeUuid>(
        &mut self,
        suffix: &str,
        loader: LoaderKind,
    ) {
        let asset_type = AssetTypeId::of::<T>();
        log::debug!(
            "Set {:?} for type {} with suffix {:?}",
            loader,
            asset_type,
            suffix
        );

        let loaders = self.loaders.entry(asset_type).or_default();
        if let Some(existing) = loaders.iter_mut().find(|(x, _)| x == suffix) {
            existing.1 = loader;
        } else {
            loaders.push((suffix.to_string(), loader));
        }
    }

    fn find_loader(
        &self,
        descriptor: &AssetDescriptor,
    ) -> LoadResult<LoaderKind> {
        let file_name = descriptor.file_name();
        self.loaders
            .get(&descriptor.asset_type())
            .and_then(|loaders| {
                loaders
                    .iter()
                    .filter(|(suffix, _)| file_name.ends_with(suffix.as_str()))
                    .max_by_key(|(suffix, _)| suffix.len())
            })
            .map(|(_, loader)| loader.clone())
            .ok_or_else(|| LoadError::NoLoader {
                file_name: file_name.to_string(),
                type_name: descriptor.type_name(),
            })
    }

    //
    // Loading
    //

    /// Requests an asset. If it is already loaded or loading, only its reference count goes up.
    /// Every successful call must eventually be matched by an `unload()`.
    pub fn load(
        &mut self,
        descriptor: AssetDescriptor,
    ) -> LoadResult<()> {
        let key = descriptor.key().clone();
        if self.registry.add_ref(&key) {
            log::debug!("{} already loaded, adding reference", key.file_name);
            return Ok(());
        }

        if let Some(queued) = self.in_flight.get_mut(&key) {
            log::debug!("{} already queued, adding reference", key.file_name);
            queued.ref_count += 1;
            queued.task.resume();
            return Ok(());
        }

        let loader = self.find_loader(&descriptor)?;
        self.enqueue(descriptor, loader, None);
        Ok(())
    }

    /// Shorthand for loading `file_name` as `T` without parameters
    pub fn load_asset<T: TypeUuid + 'static>(
        &mut self,
        file_name: &str,
    ) -> LoadResult<()> {
        self.load(AssetDescriptor::new::<T>(file_name))
    }

    fn enqueue(
        &mut self,
        descriptor: AssetDescriptor,
        loader: LoaderKind,
        blocked_load: Option<AssetKey>,
    ) {
        let key = descriptor.key().clone();
        log::debug!("Queued {} ({})", key.file_name, descriptor.type_name());

        let queued = QueuedLoad {
            task: LoadingTask::new(descriptor, loader),
            ref_count: 1,
            dependencies: Vec::new(),
            blocking_dependency_count: 0,
            blocked_loads: blocked_load.into_iter().collect(),
        };

        self.queue.push(key.clone());
        let old = self.in_flight.insert(key, queued);
        debug_assert!(old.is_none());
        self.requested_count += 1;
    }

    /// Advances every queued load by one step. Returns true when nothing is left to load.
    ///
    /// The first failure aborts the pass. The failed load, and every queued load that depends on
    /// it, is removed from the queue before the error is returned; the remaining loads continue on
    /// the next call.
    #[profiling::function]
    pub fn update(&mut self) -> LoadResult<bool> {
        // Loads queued during this pass take their first step on the next one
        let keys = self.queue.clone();
        for key in keys {
            let status = match self.in_flight.get_mut(&key) {
                Some(queued) => queued.task.update(&self.executor, &self.registry),
                // Removed earlier in this pass
                None => continue,
            };

            match status {
                Ok(TaskStatus::Pending) => {}
                Ok(TaskStatus::NeedsDependencies(dependencies)) => {
                    if let Err(error) = self.inject_dependencies(&key, dependencies) {
                        return Err(self.fail_load(&key, error));
                    }
                }
                Ok(TaskStatus::Completed) => self.complete_load(&key)?,
                Ok(TaskStatus::Cancelled) => self.discard_load(&key)?,
                Err(error) => return Err(self.fail_load(&key, error)),
            }
        }

        let done = self.queue.is_empty();
        if done {
            self.requested_count = 0;
        }

        Ok(done)
    }

    /// Blocks until every queued load has finished or one has failed
    pub fn finish_loading(&mut self) -> LoadResult<()> {
        log::debug!("Waiting for {} queued loads", self.queue.len());
        while !self.update()? {
            std::thread::sleep(WAIT_INTERVAL);
        }

        Ok(())
    }

    /// Blocks until the given asset is loaded and returns it. Other queued loads keep making
    /// progress in the meantime. The asset must have been requested with `load()`.
    pub fn finish_loading_asset(
        &mut self,
        descriptor: &AssetDescriptor,
    ) -> LoadResult<&(dyn Asset + 'static)> {
        let key = descriptor.key();
        while !self.registry.contains(key) {
            if !self.in_flight.contains_key(key) {
                return Err(LoadError::NotLoaded {
                    file_name: key.file_name.clone(),
                });
            }

            self.update()?;
            std::thread::sleep(WAIT_INTERVAL);
        }

        self.registry.get(key)
    }

    // Records the dependencies a queued load reported. Each one is either referenced in the
    // registry, referenced in the queue (blocking the owner), or queued as a new load.
    fn inject_dependencies(
        &mut self,
        owner: &AssetKey,
        dependencies: Vec<AssetDescriptor>,
    ) -> LoadResult<()> {
        // Validate everything first so a failure leaves no references behind
        let mut planned: Vec<(AssetDescriptor, Option<LoaderKind>)> = Vec::new();
        for dependency in dependencies {
            let dependency_key = dependency.key();
            if planned.iter().any(|(x, _)| x.key() == dependency_key) {
                continue;
            }

            if dependency_key == owner || self.depends_on(dependency_key, owner) {
                return Err(LoadError::CircularDependency {
                    file_name: owner.file_name.clone(),
                    dependency: dependency_key.file_name.clone(),
                });
            }

            let loader = if self.registry.contains(dependency_key)
                || self.in_flight.contains_key(dependency_key)
            {
                None
            } else {
                Some(self.find_loader(&dependency)?)
            };

            planned.push((dependency, loader));
        }

        let mut dependency_keys = Vec::with_capacity(planned.len());
        let mut blocking_dependency_count = 0;
        for (dependency, loader) in planned {
            let dependency_key = dependency.key().clone();
            if self.registry.add_ref(&dependency_key) {
                log::debug!(
                    "{} depends on {}, already loaded",
                    owner.file_name,
                    dependency_key.file_name
                );
            } else if let Some(queued) = self.in_flight.get_mut(&dependency_key) {
                log::debug!(
                    "{} depends on {}, already queued",
                    owner.file_name,
                    dependency_key.file_name
                );
                queued.ref_count += 1;
                queued.task.resume();
                queued.blocked_loads.push(owner.clone());
                blocking_dependency_count += 1;
            } else if let Some(loader) = loader {
                self.enqueue(dependency, loader, Some(owner.clone()));
                blocking_dependency_count += 1;
            }

            dependency_keys.push(dependency_key);
        }

        let queued = self
            .in_flight
            .get_mut(owner)
            .ok_or_else(|| LoadError::NotLoaded {
                file_name: owner.file_name.clone(),
            })?;
        queued.dependencies = dependency_keys;
        queued.blocking_dependency_count = blocking_dependency_count;
        if blocking_dependency_count == 0 {
            queued.task.notify_dependencies_loaded();
        }

        Ok(())
    }

    // True if the queued load `from` waits on `target`, directly or through other queued loads
    fn depends_on(
        &self,
        from: &AssetKey,
        target: &AssetKey,
    ) -> bool {
        let mut visited = HashSet::default();
        let mut pending = vec![from];
        while let Some(key) = pending.pop() {
            if !visited.insert(key) {
                continue;
            }

            if let Some(queued) = self.in_flight.get(key) {
                for dependency in &queued.dependencies {
                    if dependency == target {
                        return true;
                    }

                    pending.push(dependency);
                }
            }
        }

        false
    }

    fn complete_load(
        &mut self,
        key: &AssetKey,
    ) -> LoadResult<()> {
        let queued = self
            .remove_queued(key)
            .ok_or_else(|| LoadError::NotLoaded {
                file_name: key.file_name.clone(),
            })?;

        let asset = queued
            .task
            .into_asset()
            .ok_or_else(|| LoadError::NotLoaded {
                file_name: key.file_name.clone(),
            })?;

        log::debug!(
            "Completed {} with {} references",
            key.file_name,
            queued.ref_count
        );

        self.registry.insert(
            key.clone(),
            AssetRegistryEntry {
                asset,
                ref_count: queued.ref_count,
                dependencies: queued.dependencies,
            },
        );

        for blocked_load in queued.blocked_loads {
            if let Some(blocked) = self.in_flight.get_mut(&blocked_load) {
                blocked.blocking_dependency_count -= 1;
                if blocked.blocking_dependency_count == 0 {
                    log::debug!("{} has all dependencies loaded", blocked_load.file_name);
                    blocked.task.notify_dependencies_loaded();
                }
            }
        }

        Ok(())
    }

    // Removes a failed load and, transitively, every queued load waiting on it. Returns the error
    // reported for the last load removed.
    fn fail_load(
        &mut self,
        key: &AssetKey,
        error: LoadError,
    ) -> LoadError {
        log::error!("Failed to load {}: {}", key.file_name, error);
        let queued = match self.remove_queued(key) {
            Some(queued) => queued,
            None => return error,
        };

        self.release_dependencies(key, &queued.dependencies);

        let source = Arc::new(error);
        let mut result = (*source).clone();
        for blocked_load in queued.blocked_loads {
            let dependent_error = LoadError::DependencyLoadFailed {
                file_name: blocked_load.file_name.clone(),
                dependency: key.file_name.clone(),
                source: source.clone(),
            };
            result = self.fail_load(&blocked_load, dependent_error);
        }

        result
    }

    // Drops a cancelled load once its task has no work left on the pool. Loads still waiting on it
    // lost their reference through an unbalanced unload() and can never finish, so they fail.
    fn discard_load(
        &mut self,
        key: &AssetKey,
    ) -> LoadResult<()> {
        let queued = match self.remove_queued(key) {
            Some(queued) => queued,
            None => return Ok(()),
        };

        log::debug!("Discarded cancelled load of {}", key.file_name);
        self.release_dependencies(key, &queued.dependencies);

        if queued.blocked_loads.is_empty() {
            return Ok(());
        }

        let source = Arc::new(LoadError::NotLoaded {
            file_name: key.file_name.clone(),
        });
        let mut result = None;
        for blocked_load in queued.blocked_loads {
            let dependent_error = LoadError::DependencyLoadFailed {
                file_name: blocked_load.file_name.clone(),
                dependency: key.file_name.clone(),
                source: source.clone(),
            };
            result = Some(self.fail_load(&blocked_load, dependent_error));
        }

        match result {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn remove_queued(
        &mut self,
        key: &AssetKey,
    ) -> Option<QueuedLoad> {
        let queued = self.in_flight.remove(key)?;
        self.queue.retain(|x| x != key);
        Some(queued)
    }

    fn release_dependencies(
        &mut self,
        owner: &AssetKey,
        dependencies: &[AssetKey],
    ) {
        for dependency in dependencies {
            if let Err(error) = self.release_dependency(owner, dependency) {
                log::error!(
                    "Could not release dependency {} of {}: {}",
                    dependency.file_name,
                    owner.file_name,
                    error
                );
            }
        }
    }

    fn release_dependency(
        &mut self,
        owner: &AssetKey,
        dependency: &AssetKey,
    ) -> LoadResult<()> {
        if let Some(queued) = self.in_flight.get_mut(dependency) {
            queued.blocked_loads.retain(|x| x != owner);
            Self::release_queued(dependency, queued)
        } else if self.registry.contains(dependency) {
            self.unload_key(dependency)
        } else {
            // Already failed or discarded
            Ok(())
        }
    }

    fn release_queued(
        key: &AssetKey,
        queued: &mut QueuedLoad,
    ) -> LoadResult<()> {
        // A cancelled load waiting to be discarded has no references left to release
        if queued.ref_count == 0 {
            return Err(LoadError::NotLoaded {
                file_name: key.file_name.clone(),
            });
        }

        queued.ref_count -= 1;
        if queued.ref_count == 0 {
            log::debug!("Cancelling load of {}", key.file_name);
            queued.task.cancel();
        }

        Ok(())
    }

    //
    // Access
    //

    pub fn get(
        &self,
        descriptor: &AssetDescriptor,
    ) -> LoadResult<&(dyn Asset + 'static)> {
        self.registry.get(descriptor.key())
    }

    pub fn get_as<T: Asset>(
        &self,
        descriptor: &AssetDescriptor,
    ) -> LoadResult<&T> {
        self.registry.get_as::<T>(descriptor.key())
    }

    /// Looks up a loaded asset of type `T` by file name
    pub fn get_asset<T: Asset + TypeUuid>(
        &self,
        file_name: &str,
    ) -> LoadResult<&T> {
        self.registry.get_typed::<T>(file_name)
    }

    pub fn registry(&self) -> &AssetRegistry {
        &self.registry
    }

    //
    // Unloading
    //

    /// Drops one reference. When the last reference goes, a loaded asset is disposed and releases
    /// its dependencies, and a queued load is cancelled.
    pub fn unload(
        &mut self,
        descriptor: &AssetDescriptor,
    ) -> LoadResult<()> {
        let key = descriptor.key();
        if let Some(queued) = self.in_flight.get_mut(key) {
            return Self::release_queued(key, queued);
        }

        self.unload_key(key)
    }

    /// Shorthand for unloading `file_name` loaded as `T`
    pub fn unload_asset<T: TypeUuid + 'static>(
        &mut self,
        file_name: &str,
    ) -> LoadResult<()> {
        self.unload(&AssetDescriptor::new::<T>(file_name))
    }

    fn unload_key(
        &mut self,
        key: &AssetKey,
    ) -> LoadResult<()> {
        let entry = match self.registry.release(key)? {
            Some(entry) => entry,
            None => return Ok(()),
        };

        log::debug!("Unloading {}", key.file_name);
        let mut asset = entry.asset;
        asset.dispose();

        self.release_dependencies(key, &entry.dependencies);
        Ok(())
    }

    /// Cancels every queued load, waits for work already on the pool, and disposes every loaded
    /// asset regardless of its reference count
    pub fn clear(&mut self) {
        log::info!(
            "Clearing {} queued and {} loaded assets",
            self.in_flight.len(),
            self.registry.len()
        );

        for queued in self.in_flight.values_mut() {
            queued.task.cancel();
        }

        while !self.queue.is_empty() {
            for key in self.queue.clone() {
                let status = match self.in_flight.get_mut(&key) {
                    Some(queued) => queued.task.update(&self.executor, &self.registry),
                    None => continue,
                };

                match status {
                    Ok(TaskStatus::Pending) | Ok(TaskStatus::NeedsDependencies(_)) => {}
                    Ok(TaskStatus::Completed) => {
                        if let Some(mut asset) = self
                            .remove_queued(&key)
                            .and_then(|queued| queued.task.into_asset())
                        {
                            asset.dispose();
                        }
                    }
                    Ok(TaskStatus::Cancelled) | Err(_) => {
                        self.remove_queued(&key);
                    }
                }
            }

            std::thread::sleep(WAIT_INTERVAL);
        }

        for (_, entry) in self.registry.drain() {
            let mut asset = entry.asset;
            asset.dispose();
        }

        self.requested_count = 0;
    }

    //
    // Inspection
    //

    pub fn is_loaded(
        &self,
        descriptor: &AssetDescriptor,
    ) -> bool {
        self.registry.contains(descriptor.key())
    }

    /// True if the asset is loaded or queued
    pub fn contains(
        &self,
        descriptor: &AssetDescriptor,
    ) -> bool {
        self.registry.contains(descriptor.key()) || self.in_flight.contains_key(descriptor.key())
    }

    pub fn reference_count(
        &self,
        descriptor: &AssetDescriptor,
    ) -> Option<u32> {
        let key = descriptor.key();
        self.registry
            .reference_count(key)
            .or_else(|| self.in_flight.get(key).map(|x| x.ref_count))
    }

    /// Dependencies of a loaded asset, or of a queued one once they have been discovered
    pub fn dependencies_of(
        &self,
        descriptor: &AssetDescriptor,
    ) -> Option<&[AssetKey]> {
        let key = descriptor.key();
        self.registry
            .dependencies(key)
            .or_else(|| self.in_flight.get(key).map(|x| x.dependencies.as_slice()))
    }

    pub fn queued_count(&self) -> usize {
        self.queue.len()
    }

    pub fn loaded_count(&self) -> usize {
        self.registry.len()
    }

    pub fn worker_thread_count(&self) -> usize {
        self.executor.thread_count()
    }

    /// Fraction of the loads requested since the queue was last empty that have finished, 1.0 when
    /// nothing is queued
    pub fn progress(&self) -> f32 {
        if self.requested_count == 0 {
            return 1.0;
        }

        let finished = self.requested_count.saturating_sub(self.queue.len());
        (finished as f32 / self.requested_count as f32).min(1.0)
    }

    /// File names of every loaded asset, sorted
    pub fn asset_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self
            .registry
            .keys()
            .map(|key| key.file_name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    /// Human readable dump of every loaded and queued asset
    pub fn diagnostics(&self) -> String {
        let mut out = String::new();

        let mut loaded: Vec<_> = self.registry.keys().collect();
        loaded.sort();
        for key in loaded {
            let _ = write!(
                out,
                "{}, {}, refs: {}",
                key.file_name,
                key.asset_type,
                self.registry.reference_count(key).unwrap_or(0)
            );

            let dependencies = self.registry.dependencies(key).unwrap_or(&[]);
            if !dependencies.is_empty() {
                let names: Vec<_> = dependencies.iter().map(|x| x.file_name.as_str()).collect();
                let _ = write!(out, ", deps: [{}]", names.join(", "));
            }

            out.push('\n');
        }

        for key in &self.queue {
            if let Some(queued) = self.in_flight.get(key) {
                let _ = writeln!(
                    out,
                    "{}, {}, refs: {}, queued: {} after {} ticks ({:.3}ms)",
                    key.file_name,
                    key.asset_type,
                    queued.ref_count,
                    queued.task.state_name(),
                    queued.task.ticks(),
                    queued.task.elapsed().as_secs_f64() * 1000.0
                );
            }
        }

        out
    }
}

impl Drop for AssetManager {
    fn drop(&mut self) {
        self.clear();
    }
}
