use crate::{AssetTypeId, FileHandle};
use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use type_uuid::TypeUuid;

/// Loader-specific parameters attached to a request. Loaders downcast to their own parameter type
/// with [`AssetDescriptor::params`].
pub type AssetParams = Arc<dyn Any + Send + Sync>;

/// Identity of an asset: its logical file name plus its type. The same file may be loaded as two
/// different types, producing two independent assets.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetKey {
    pub file_name: String,
    pub asset_type: AssetTypeId,
}

impl AssetKey {
    pub fn new(
        file_name: impl Into<String>,
        asset_type: AssetTypeId,
    ) -> Self {
        AssetKey {
            file_name: file_name.into(),
            asset_type,
        }
    }

    pub fn of<T: TypeUuid>(file_name: impl Into<String>) -> Self {
        Self::new(file_name, AssetTypeId::of::<T>())
    }
}

impl fmt::Debug for AssetKey {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "AssetKey({}, {})", self.file_name, self.asset_type)
    }
}

/// A request to load one asset: "load `file_name` as `T` with these parameters". Descriptors are
/// also the nodes of the dependency graph, loaders return them from `dependencies()`.
///
/// Two descriptors are equal if their file name and type match. Parameters and the resolved file
/// do not participate in equality.
#[derive(Clone)]
pub struct AssetDescriptor {
    key: AssetKey,
    type_name: &'static str,
    file: Option<FileHandle>,
    params: Option<AssetParams>,
}

impl AssetDescriptor {
    pub fn new<T: TypeUuid + 'static>(file_name: impl Into<String>) -> Self {
        AssetDescriptor {
            key: AssetKey::of::<T>(file_name),
            type_name: std::any::type_name::<T>(),
            file: None,
            params: None,
        }
    }

    pub fn with_params<T: TypeUuid + 'static, P: Any + Send + Sync>(
        file_name: impl Into<String>,
        params: P,
    ) -> Self {
        Self::new::<T>(file_name).set_params(params)
    }

    /// Attaches parameters, replacing any previous ones
    pub fn set_params<P: Any + Send + Sync>(
        mut self,
        params: P,
    ) -> Self {
        self.params = Some(Arc::new(params));
        self
    }

    /// Use an already known location instead of resolving the file name through the loader
    pub fn set_file(
        mut self,
        file: FileHandle,
    ) -> Self {
        self.file = Some(file);
        self
    }

    pub fn key(&self) -> &AssetKey {
        &self.key
    }

    pub fn file_name(&self) -> &str {
        &self.key.file_name
    }

    pub fn asset_type(&self) -> AssetTypeId {
        self.key.asset_type
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The resolved location, if resolution has already happened
    pub fn file(&self) -> Option<&FileHandle> {
        self.file.as_ref()
    }

    /// Resolves the location once and memoizes it. Later calls return the stored handle without
    /// invoking `resolve` again.
    pub fn resolve_file<E, F: FnOnce(&str) -> Result<FileHandle, E>>(
        &mut self,
        resolve: F,
    ) -> Result<&FileHandle, E> {
        let file = match self.file.take() {
            Some(file) => file,
            None => (resolve)(&self.key.file_name)?,
        };

        Ok(&*self.file.insert(file))
    }

    pub fn raw_params(&self) -> Option<&AssetParams> {
        self.params.as_ref()
    }

    /// Returns the parameters if they were provided and are of type `P`
    pub fn params<P: Any>(&self) -> Option<&P> {
        self.params.as_ref()?.downcast_ref::<P>()
    }
}

impl PartialEq for AssetDescriptor {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.key == other.key
    }
}

impl Eq for AssetDescriptor {}

impl Hash for AssetDescriptor {
    fn hash<H: Hasher>(
        &self,
        state: &mut H,
    ) {
        self.key.hash(state)
    }
}

impl fmt::Debug for AssetDescriptor {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("AssetDescriptor")
            .field("file_name", &self.key.file_name)
            .field("type", &self.type_name)
            .field("file", &self.file)
            .field("has_params", &self.params.is_some())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::FileType;

    #[derive(TypeUuid)]
    #[uuid = "4c1f0e2a-9b7d-4e55-8a33-0d6b2f1c7e90"]
    struct Texture;

    #[derive(TypeUuid)]
    #[uuid = "b3e8d6a1-2f4c-4b9e-9c07-5a1d3e6f8b22"]
    struct Pixmap;

    struct TextureParams {
        gen_mip_maps: bool,
    }

    #[test]
    fn equality_ignores_params_and_file() {
        let a = AssetDescriptor::new::<Texture>("player.png");
        let b = AssetDescriptor::with_params::<Texture, _>(
            "player.png",
            TextureParams { gen_mip_maps: true },
        )
        .set_file(FileHandle::absolute("/tmp/player.png"));
        let c = AssetDescriptor::new::<Pixmap>("player.png");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), c.key());
    }

    #[test]
    fn params_downcast() {
        let descriptor = AssetDescriptor::with_params::<Texture, _>(
            "player.png",
            TextureParams { gen_mip_maps: true },
        );
        assert!(descriptor.params::<TextureParams>().unwrap().gen_mip_maps);
        assert!(descriptor.params::<u32>().is_none());
        assert!(AssetDescriptor::new::<Texture>("a.png")
            .params::<TextureParams>()
            .is_none());
    }

    #[test]
    fn resolve_is_memoized() {
        let mut descriptor = AssetDescriptor::new::<Texture>("player.png");
        let mut calls = 0;
        for _ in 0..3 {
            let file = descriptor
                .resolve_file::<(), _>(|name| {
                    calls += 1;
                    Ok(FileHandle::new(format!("data/{}", name), FileType::Internal))
                })
                .unwrap();
            assert_eq!(file.name(), "player.png");
        }
        assert_eq!(calls, 1);
        assert!(descriptor.file().is_some());
    }

    #[test]
    fn failed_resolve_is_not_memoized() {
        let mut descriptor = AssetDescriptor::new::<Texture>("missing.png");
        assert!(descriptor.resolve_file(|_| Err("nope")).is_err());
        assert!(descriptor.file().is_none());
    }
}
