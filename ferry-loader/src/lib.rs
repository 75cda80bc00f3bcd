mod asset_loader;
pub use asset_loader::{
    AssetLoader, AsyncLoadData, AsynchronousAssetLoader, LoaderKind, SynchronousAssetLoader,
};

mod asset_manager;
pub use asset_manager::AssetManager;

mod asset_registry;
pub use asset_registry::AssetRegistry;

mod async_executor;
pub use async_executor::AsyncExecutor;

mod async_result;
pub use async_result::AsyncResult;

mod config;
pub use config::AssetManagerConfig;

mod loading_task;
pub use loading_task::{LoadingTask, TaskStatus};

pub mod resolvers;
pub use resolvers::FileHandleResolver;

pub use ferry_base::{
    Asset, AssetDescriptor, AssetKey, AssetTypeId, FileHandle, FileType, LoadError, LoadResult,
};
