use ferry_base::{LoadError, LoadResult};
use serde::Deserialize;

/// Settings for an [`AssetManager`](crate::AssetManager). Every field is optional when loading from
/// JSON, missing fields take their default value.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AssetManagerConfig {
    /// Number of threads in the worker pool. Zero is treated as one.
    pub worker_thread_count: usize,
    /// Worker threads are named "<worker_thread_name> <index>"
    pub worker_thread_name: String,
}

impl Default for AssetManagerConfig {
    fn default() -> Self {
        AssetManagerConfig {
            worker_thread_count: 4,
            worker_thread_name: "Asset Loader Thread".to_string(),
        }
    }
}

impl AssetManagerConfig {
    pub fn from_json_str(json: &str) -> LoadResult<Self> {
        serde_json::from_str(json).map_err(|e| {
            LoadError::StringError(format!("Could not parse asset manager config: {}", e))
        })
    }

    pub fn with_worker_thread_count(
        mut self,
        worker_thread_count: usize,
    ) -> Self {
        self.worker_thread_count = worker_thread_count;
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let config = AssetManagerConfig::from_json_str(r#"{ "worker_thread_count": 2 }"#).unwrap();
        assert_eq!(config.worker_thread_count, 2);
        assert_eq!(config.worker_thread_name, "Asset Loader Thread");

        let config = AssetManagerConfig::from_json_str("{}").unwrap();
        assert_eq!(config, AssetManagerConfig::default());
    }

    #[test]
    fn bad_json_is_an_error() {
        assert!(matches!(
            AssetManagerConfig::from_json_str("{ worker_thread_count: }"),
            Err(LoadError::StringError(_))
        ));
    }
}
