#[cfg(feature = "ferry-base")]
pub use ferry_base as base;

#[cfg(feature = "ferry-loader")]
pub use ferry_loader as loader;
