use std::fmt;
use type_uuid::TypeUuid;
use uuid::Uuid;

/// Identifies an asset type. It's defined as a UUID on the asset struct itself (via
/// `#[derive(TypeUuid)]`) so it stays stable across builds, unlike `std::any::TypeId`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Default)]
pub struct AssetTypeId(pub Uuid);

impl AssetTypeId {
    pub const fn null() -> Self {
        AssetTypeId(Uuid::nil())
    }

    pub fn of<T: TypeUuid>() -> Self {
        Self::from_bytes(T::UUID)
    }

    pub fn is_null(&self) -> bool {
        self.0.is_nil()
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        AssetTypeId(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    pub fn from_bytes(bytes: uuid::Bytes) -> Self {
        AssetTypeId(Uuid::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &uuid::Bytes {
        self.0.as_bytes()
    }
}

impl fmt::Debug for AssetTypeId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_tuple("AssetTypeId").field(&self.0).finish()
    }
}

impl fmt::Display for AssetTypeId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
