use ferry::loader::resolvers::InternalFileHandleResolver;
use ferry::loader::{
    Asset, AssetDescriptor, AssetLoader, AssetRegistry, AsyncLoadData, AsynchronousAssetLoader,
    FileHandle, FileHandleResolver, LoadError, LoadResult,
};
use serde::{Deserialize, Serialize};
use type_uuid::TypeUuid;

// On-disk format of an image, written with bincode
#[derive(Serialize, Deserialize)]
pub struct ImageAssetData {
    pub width: u32,
    pub height: u32,
    pub image_bytes: Vec<u8>,
}

/// Optional load settings for images
pub struct ImageParams {
    pub flip_vertically: bool,
}

// No real significance to this UUID, other than all assets should have a unique UUID
#[derive(TypeUuid)]
#[uuid = "3ebc8afd-09d2-427e-b9e9-50a53fcbde84"]
pub struct GpuImageAsset {
    pub image_bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Asset for GpuImageAsset {
    fn dispose(&mut self) {
        log::info!("Freeing {}x{} image", self.width, self.height);
    }
}

// Reads and decodes on the worker pool, then "uploads" on the main thread
pub struct GpuImageLoader {
    resolver: InternalFileHandleResolver,
}

impl GpuImageLoader {
    pub fn new(resolver: InternalFileHandleResolver) -> Self {
        GpuImageLoader { resolver }
    }
}

impl AssetLoader for GpuImageLoader {
    fn resolver(&self) -> &dyn FileHandleResolver {
        &self.resolver
    }
}

impl AsynchronousAssetLoader for GpuImageLoader {
    fn load_async(
        &self,
        descriptor: &AssetDescriptor,
        file: &FileHandle,
    ) -> LoadResult<AsyncLoadData> {
        profiling::scope!("GpuImageLoader::load_async");
        log::debug!("bincode deserialize {}", file);
        let bytes = file.read_bytes()?;
        let mut data = bincode::deserialize::<ImageAssetData>(&bytes)
            .map_err(|e| LoadError::StringError(e.to_string()))?;

        let flip = descriptor
            .params::<ImageParams>()
            .map(|x| x.flip_vertically)
            .unwrap_or(false);
        if flip && data.width > 0 {
            let row_length = data.width as usize * 4;
            let rows: Vec<_> = data.image_bytes.chunks(row_length).rev().collect();
            data.image_bytes = rows.concat();
        }

        Ok(Box::new(data))
    }

    fn load_sync(
        &self,
        _assets: &AssetRegistry,
        descriptor: &AssetDescriptor,
        _file: &FileHandle,
        data: AsyncLoadData,
    ) -> LoadResult<Box<dyn Asset>> {
        let data = data
            .downcast::<ImageAssetData>()
            .map_err(|_| LoadError::from("GpuImageLoader got unexpected async data"))?;
        log::debug!(
            "Uploading {} ({}x{})",
            descriptor.file_name(),
            data.width,
            data.height
        );

        Ok(Box::new(GpuImageAsset {
            image_bytes: data.image_bytes,
            width: data.width,
            height: data.height,
        }))
    }
}
