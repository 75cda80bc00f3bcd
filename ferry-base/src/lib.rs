pub mod hashing;

mod asset;
mod asset_type_id;
mod descriptor;
mod error;
mod file_handle;

pub use asset::Asset;
pub use asset_type_id::AssetTypeId;
pub use descriptor::{AssetDescriptor, AssetKey, AssetParams};
pub use error::{LoadError, LoadResult};
pub use file_handle::{FileHandle, FileType};

pub use type_uuid;
pub use uuid;
