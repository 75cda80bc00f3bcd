use ferry_base::hashing::HashMap;
use ferry_base::{Asset, AssetKey, LoadError, LoadResult};
use type_uuid::TypeUuid;

pub(crate) struct AssetRegistryEntry {
    pub(crate) asset: Box<dyn Asset>,
    // Explicit load() calls plus one per loaded asset that depends on this one
    pub(crate) ref_count: u32,
    // Released when this asset is unloaded
    pub(crate) dependencies: Vec<AssetKey>,
}

/// Assets that have finished loading, with their reference counts.
///
/// An entry exists from the moment its loading task completes until its reference count is brought
/// to zero by unloading. Only the asset manager mutates the registry; loaders get read access while
/// running on the driving thread.
#[derive(Default)]
pub struct AssetRegistry {
    assets: HashMap<AssetKey, AssetRegistryEntry>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn contains(
        &self,
        key: &AssetKey,
    ) -> bool {
        self.assets.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &AssetKey> {
        self.assets.keys()
    }

    pub fn get(
        &self,
        key: &AssetKey,
    ) -> LoadResult<&(dyn Asset + 'static)> {
        self.assets
            .get(key)
            .map(|x| &*x.asset)
            .ok_or_else(|| LoadError::NotLoaded {
                file_name: key.file_name.clone(),
            })
    }

    /// Looks up a loaded asset by key and downcasts it
    pub fn get_as<T: Asset>(
        &self,
        key: &AssetKey,
    ) -> LoadResult<&T> {
        self.get(key)?
            .downcast_ref::<T>()
            .ok_or_else(|| LoadError::TypeMismatch {
                file_name: key.file_name.clone(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Looks up a loaded asset of type `T` by file name
    pub fn get_typed<T: Asset + TypeUuid>(
        &self,
        file_name: &str,
    ) -> LoadResult<&T> {
        self.get_as::<T>(&AssetKey::of::<T>(file_name))
    }

    pub fn reference_count(
        &self,
        key: &AssetKey,
    ) -> Option<u32> {
        self.assets.get(key).map(|x| x.ref_count)
    }

    pub fn dependencies(
        &self,
        key: &AssetKey,
    ) -> Option<&[AssetKey]> {
        self.assets.get(key).map(|x| x.dependencies.as_slice())
    }

    pub(crate) fn insert(
        &mut self,
        key: AssetKey,
        entry: AssetRegistryEntry,
    ) {
        assert!(entry.ref_count > 0);
        let old = self.assets.insert(key, entry);
        assert!(old.is_none());
    }

    // Returns false if the asset is not loaded
    pub(crate) fn add_ref(
        &mut self,
        key: &AssetKey,
    ) -> bool {
        if let Some(entry) = self.assets.get_mut(key) {
            entry.ref_count += 1;
            true
        } else {
            false
        }
    }

    // Drops one reference. When it was the last one, the entry is removed and handed back so the
    // caller can dispose it and release its dependencies.
    pub(crate) fn release(
        &mut self,
        key: &AssetKey,
    ) -> LoadResult<Option<AssetRegistryEntry>> {
        let entry = self
            .assets
            .get_mut(key)
            .ok_or_else(|| LoadError::NotLoaded {
                file_name: key.file_name.clone(),
            })?;

        entry.ref_count -= 1;
        if entry.ref_count > 0 {
            return Ok(None);
        }

        Ok(self.assets.remove(key))
    }

    pub(crate) fn drain(&mut self) -> Vec<(AssetKey, AssetRegistryEntry)> {
        self.assets.drain().collect()
    }
}
