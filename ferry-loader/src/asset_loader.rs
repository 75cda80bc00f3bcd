use crate::{AssetRegistry, FileHandleResolver};
use ferry_base::{Asset, AssetDescriptor, FileHandle, LoadError, LoadResult};
use std::any::Any;
use std::sync::Arc;

/// Intermediate data produced by the off-thread phase of an asynchronous loader and consumed by its
/// on-thread phase
pub type AsyncLoadData = Box<dyn Any + Send>;

/// Functionality shared by synchronous and asynchronous loaders.
///
/// Loaders are shared between the driving thread and the worker pool, so they must be `Send + Sync`.
/// Any state produced while loading is returned by value instead of being stored on the loader.
pub trait AssetLoader: Send + Sync {
    fn resolver(&self) -> &dyn FileHandleResolver;

    /// Turns the logical file name into a location. Fails with `ResourceNotFound` if nothing exists
    /// there. The result is memoized on the descriptor, this is called at most once per request.
    fn resolve(
        &self,
        file_name: &str,
    ) -> LoadResult<FileHandle> {
        let file = self.resolver().resolve(file_name);
        if file.exists() {
            Ok(file)
        } else {
            Err(LoadError::ResourceNotFound {
                file_name: file_name.to_string(),
            })
        }
    }

    /// Lists the assets that must be loaded before this one. An empty list lets the task go straight
    /// to loading. For asynchronous loaders this runs on a worker thread.
    fn dependencies(
        &self,
        _descriptor: &AssetDescriptor,
        _file: &FileHandle,
    ) -> LoadResult<Vec<AssetDescriptor>> {
        Ok(Vec::new())
    }
}

/// A loader that does all of its work on the driving thread
pub trait SynchronousAssetLoader: AssetLoader {
    /// Produces the asset. Every dependency returned by `dependencies()` is available in `assets`.
    fn load(
        &self,
        assets: &AssetRegistry,
        descriptor: &AssetDescriptor,
        file: &FileHandle,
    ) -> LoadResult<Box<dyn Asset>>;
}

/// A loader split into an expensive part that runs on the worker pool and a finalization step
/// that runs on the driving thread (uploading to the GPU, for example)
pub trait AsynchronousAssetLoader: AssetLoader {
    /// Runs on a worker thread. Must not touch anything that is only valid on the driving thread.
    fn load_async(
        &self,
        descriptor: &AssetDescriptor,
        file: &FileHandle,
    ) -> LoadResult<AsyncLoadData>;

    /// Runs on the driving thread with the data returned by `load_async`. Every dependency returned
    /// by `dependencies()` is available in `assets`.
    fn load_sync(
        &self,
        assets: &AssetRegistry,
        descriptor: &AssetDescriptor,
        file: &FileHandle,
        data: AsyncLoadData,
    ) -> LoadResult<Box<dyn Asset>>;
}

/// A registered loader of either kind
#[derive(Clone)]
pub enum LoaderKind {
    Synchronous(Arc<dyn SynchronousAssetLoader>),
    Asynchronous(Arc<dyn AsynchronousAssetLoader>),
}

impl LoaderKind {
    pub fn synchronous<T: SynchronousAssetLoader + 'static>(loader: T) -> Self {
        LoaderKind::Synchronous(Arc::new(loader))
    }

    pub fn asynchronous<T: AsynchronousAssetLoader + 'static>(loader: T) -> Self {
        LoaderKind::Asynchronous(Arc::new(loader))
    }

    pub fn is_asynchronous(&self) -> bool {
        matches!(self, LoaderKind::Asynchronous(_))
    }

    pub fn resolve(
        &self,
        file_name: &str,
    ) -> LoadResult<FileHandle> {
        match self {
            LoaderKind::Synchronous(loader) => loader.resolve(file_name),
            LoaderKind::Asynchronous(loader) => loader.resolve(file_name),
        }
    }
}

impl std::fmt::Debug for LoaderKind {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            LoaderKind::Synchronous(_) => write!(f, "LoaderKind::Synchronous"),
            LoaderKind::Asynchronous(_) => write!(f, "LoaderKind::Asynchronous"),
        }
    }
}
