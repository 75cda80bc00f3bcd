use crate::image_asset::GpuImageAsset;
use ferry::loader::resolvers::InternalFileHandleResolver;
use ferry::loader::{
    Asset, AssetDescriptor, AssetLoader, AssetRegistry, FileHandle, FileHandleResolver, LoadError,
    LoadResult, SynchronousAssetLoader,
};
use serde::{Deserialize, Serialize};
use type_uuid::TypeUuid;

// On-disk format of an atlas, written as JSON
#[derive(Serialize, Deserialize)]
pub struct AtlasAssetData {
    pub regions: Vec<AtlasRegionData>,
}

#[derive(Serialize, Deserialize)]
pub struct AtlasRegionData {
    pub name: String,
    pub image: String,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

pub struct AtlasRegion {
    pub name: String,
    pub image: String,
    pub uv: [f32; 4],
}

#[derive(TypeUuid)]
#[uuid = "8d4c3a2b-5e6f-4a1b-9c8d-7e6f5a4b3c2d"]
pub struct AtlasAsset {
    pub regions: Vec<AtlasRegion>,
}

impl Asset for AtlasAsset {}

fn read_atlas(file: &FileHandle) -> LoadResult<AtlasAssetData> {
    let json = file.read_to_string()?;
    serde_json::from_str(&json).map_err(|e| LoadError::StringError(e.to_string()))
}

// Loads on the main thread once every image the atlas refers to is available
pub struct AtlasLoader {
    resolver: InternalFileHandleResolver,
}

impl AtlasLoader {
    pub fn new(resolver: InternalFileHandleResolver) -> Self {
        AtlasLoader { resolver }
    }
}

impl AssetLoader for AtlasLoader {
    fn resolver(&self) -> &dyn FileHandleResolver {
        &self.resolver
    }

    fn dependencies(
        &self,
        _descriptor: &AssetDescriptor,
        file: &FileHandle,
    ) -> LoadResult<Vec<AssetDescriptor>> {
        let data = read_atlas(file)?;
        let mut images: Vec<_> = data.regions.iter().map(|x| x.image.as_str()).collect();
        images.sort_unstable();
        images.dedup();

        // Images live next to the atlas
        let parent = file.parent();
        Ok(images
            .into_iter()
            .map(|image| {
                AssetDescriptor::new::<GpuImageAsset>(image).set_file(parent.child(image))
            })
            .collect())
    }
}

impl SynchronousAssetLoader for AtlasLoader {
    fn load(
        &self,
        assets: &AssetRegistry,
        descriptor: &AssetDescriptor,
        file: &FileHandle,
    ) -> LoadResult<Box<dyn Asset>> {
        profiling::scope!("AtlasLoader::load");
        let data = read_atlas(file)?;

        let mut regions = Vec::with_capacity(data.regions.len());
        for region in data.regions {
            let image = assets.get_typed::<GpuImageAsset>(&region.image)?;
            let width = image.width.max(1) as f32;
            let height = image.height.max(1) as f32;
            regions.push(AtlasRegion {
                uv: [
                    region.x as f32 / width,
                    region.y as f32 / height,
                    (region.x + region.width) as f32 / width,
                    (region.y + region.height) as f32 / height,
                ],
                name: region.name,
                image: region.image,
            });
        }

        log::debug!(
            "Built atlas {} with {} regions",
            descriptor.file_name(),
            regions.len()
        );
        Ok(Box::new(AtlasAsset { regions }))
    }
}
