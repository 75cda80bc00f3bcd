mod atlas_asset;
mod image_asset;

use atlas_asset::{AtlasAsset, AtlasAssetData, AtlasLoader, AtlasRegionData};
use ferry::loader::resolvers::InternalFileHandleResolver;
use ferry::loader::{AssetDescriptor, AssetManager, AssetManagerConfig, LoadResult, LoaderKind};
use image_asset::{GpuImageAsset, GpuImageLoader, ImageAssetData, ImageParams};
use std::path::{Path, PathBuf};

pub fn demo_data_path() -> PathBuf {
    std::env::temp_dir().join("ferry-demo-game")
}

fn write_image(
    root: &Path,
    name: &str,
    width: u32,
    height: u32,
) -> LoadResult<()> {
    let data = ImageAssetData {
        width,
        height,
        image_bytes: (0..width * height * 4).map(|x| (x % 251) as u8).collect(),
    };
    let bytes = bincode::serialize(&data).map_err(|e| e.to_string())?;
    std::fs::write(root.join(name), bytes)?;
    Ok(())
}

// Writes the files the demo loads, standing in for a build step
fn write_demo_data(root: &Path) -> LoadResult<()> {
    std::fs::create_dir_all(root)?;
    write_image(root, "buttons.png", 64, 32)?;
    write_image(root, "icons.png", 32, 32)?;
    write_image(root, "background.png", 256, 128)?;

    let region = |name: &str, image: &str, x, y| AtlasRegionData {
        name: name.to_string(),
        image: image.to_string(),
        x,
        y,
        width: 16,
        height: 16,
    };
    let atlas = AtlasAssetData {
        regions: vec![
            region("ok", "buttons.png", 0, 0),
            region("cancel", "buttons.png", 16, 0),
            region("gear", "icons.png", 0, 16),
        ],
    };
    let json = serde_json::to_string_pretty(&atlas).map_err(|e| e.to_string())?;
    std::fs::write(root.join("ui.atlas"), json)?;
    Ok(())
}

fn load_config() -> LoadResult<AssetManagerConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Reading config from {}", path);
            AssetManagerConfig::from_json_str(&std::fs::read_to_string(path)?)
        }
        None => Ok(AssetManagerConfig::default()),
    }
}

fn main() -> LoadResult<()> {
    // Setup logging
    env_logger::Builder::default()
        .write_style(env_logger::WriteStyle::Always)
        .filter_level(log::LevelFilter::Debug)
        .init();

    let root = demo_data_path();
    write_demo_data(&root)?;

    let mut manager = AssetManager::new(&load_config()?)?;
    manager.set_loader::<GpuImageAsset>(LoaderKind::asynchronous(GpuImageLoader::new(
        InternalFileHandleResolver::new(&root),
    )));
    manager.set_loader::<AtlasAsset>(LoaderKind::synchronous(AtlasLoader::new(
        InternalFileHandleResolver::new(&root),
    )));

    let atlas = AssetDescriptor::new::<AtlasAsset>("ui.atlas");
    let background = AssetDescriptor::with_params::<GpuImageAsset, _>(
        "background.png",
        ImageParams {
            flip_vertically: true,
        },
    );
    manager.load(atlas.clone())?;
    manager.load(background.clone())?;

    loop {
        std::thread::sleep(std::time::Duration::from_millis(15));
        let done = manager.update()?;
        println!("loading {:.0}%", manager.progress() * 100.0);
        profiling::finish_frame!();

        if done {
            break;
        }
    }

    let loaded_atlas = manager.get_as::<AtlasAsset>(&atlas)?;
    for region in &loaded_atlas.regions {
        println!(
            "region {} in {} uv {:?}",
            region.name, region.image, region.uv
        );
    }

    let loaded_background = manager.get_as::<GpuImageAsset>(&background)?;
    println!(
        "background loaded {}x{} ({} bytes)",
        loaded_background.width,
        loaded_background.height,
        loaded_background.image_bytes.len()
    );

    print!("{}", manager.diagnostics());

    manager.unload(&atlas)?;
    manager.unload(&background)?;
    println!("{} assets left after unloading", manager.loaded_count());
    Ok(())
}
