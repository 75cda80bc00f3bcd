use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum LoadError {
    // The resolver could not find the file backing an asset
    ResourceNotFound {
        file_name: String,
    },
    // A dependency failed, which is fatal for the asset that requested it
    DependencyLoadFailed {
        file_name: String,
        dependency: String,
        source: Arc<LoadError>,
    },
    // A job submitted to the worker pool returned an error or panicked
    WorkerExecutionFailed {
        file_name: String,
        source: Arc<LoadError>,
    },
    // A load phase running on the driving thread returned an error
    LoadFailed {
        file_name: String,
        source: Arc<LoadError>,
    },
    NotLoaded {
        file_name: String,
    },
    NoLoader {
        file_name: String,
        type_name: &'static str,
    },
    TypeMismatch {
        file_name: String,
        expected: &'static str,
    },
    CircularDependency {
        file_name: String,
        dependency: String,
    },
    WorkerPanicked(String),
    WorkerDisconnected,
    IoError(Arc<std::io::Error>),
    StringError(String),
}

impl LoadError {
    /// Name of the asset this error is tagged with, if any
    pub fn file_name(&self) -> Option<&str> {
        match self {
            LoadError::ResourceNotFound { file_name }
            | LoadError::DependencyLoadFailed { file_name, .. }
            | LoadError::WorkerExecutionFailed { file_name, .. }
            | LoadError::LoadFailed { file_name, .. }
            | LoadError::NotLoaded { file_name }
            | LoadError::NoLoader { file_name, .. }
            | LoadError::TypeMismatch { file_name, .. }
            | LoadError::CircularDependency { file_name, .. } => Some(file_name.as_str()),
            LoadError::WorkerPanicked(_)
            | LoadError::WorkerDisconnected
            | LoadError::IoError(_)
            | LoadError::StringError(_) => None,
        }
    }

    /// Follows wrapped errors down to the one that started the failure
    pub fn root_cause(&self) -> &LoadError {
        match self {
            LoadError::DependencyLoadFailed { source, .. }
            | LoadError::WorkerExecutionFailed { source, .. }
            | LoadError::LoadFailed { source, .. } => source.root_cause(),
            _ => self,
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            LoadError::DependencyLoadFailed { ref source, .. } => Some(&**source),
            LoadError::WorkerExecutionFailed { ref source, .. } => Some(&**source),
            LoadError::LoadFailed { ref source, .. } => Some(&**source),
            LoadError::IoError(ref e) => Some(&**e),
            _ => None,
        }
    }
}

impl core::fmt::Display for LoadError {
    fn fmt(
        &self,
        fmt: &mut core::fmt::Formatter,
    ) -> core::fmt::Result {
        match *self {
            LoadError::ResourceNotFound { ref file_name } => {
                write!(fmt, "Couldn't resolve asset file: {}", file_name)
            }
            LoadError::DependencyLoadFailed {
                ref file_name,
                ref dependency,
                ref source,
            } => write!(
                fmt,
                "Couldn't load dependency {} of asset {}: {}",
                dependency, file_name, source
            ),
            LoadError::WorkerExecutionFailed {
                ref file_name,
                ref source,
            } => write!(fmt, "Couldn't load asset {} off-thread: {}", file_name, source),
            LoadError::LoadFailed {
                ref file_name,
                ref source,
            } => write!(fmt, "Couldn't load asset {}: {}", file_name, source),
            LoadError::NotLoaded { ref file_name } => {
                write!(fmt, "Asset not loaded: {}", file_name)
            }
            LoadError::NoLoader {
                ref file_name,
                type_name,
            } => write!(
                fmt,
                "No loader registered for type {} (asset {})",
                type_name, file_name
            ),
            LoadError::TypeMismatch {
                ref file_name,
                expected,
            } => write!(fmt, "Asset {} is not of type {}", file_name, expected),
            LoadError::CircularDependency {
                ref file_name,
                ref dependency,
            } => write!(
                fmt,
                "Asset {} has a circular dependency on {}",
                file_name, dependency
            ),
            LoadError::WorkerPanicked(ref e) => write!(fmt, "Worker thread panicked: {}", e),
            LoadError::WorkerDisconnected => write!(fmt, "Worker thread disconnected"),
            LoadError::IoError(ref e) => write!(fmt, "{}", e),
            LoadError::StringError(ref e) => write!(fmt, "{}", e),
        }
    }
}

impl From<&str> for LoadError {
    fn from(str: &str) -> Self {
        LoadError::StringError(str.to_string())
    }
}

impl From<String> for LoadError {
    fn from(string: String) -> Self {
        LoadError::StringError(string)
    }
}

impl From<std::io::Error> for LoadError {
    fn from(error: std::io::Error) -> Self {
        LoadError::IoError(Arc::new(error))
    }
}

pub type LoadResult<T> = Result<T, LoadError>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn root_cause_unwraps_nested_failures() {
        let io: LoadError = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire").into();
        let worker = LoadError::WorkerExecutionFailed {
            file_name: "texture.png".to_string(),
            source: Arc::new(io),
        };
        let dependency = LoadError::DependencyLoadFailed {
            file_name: "ui.atlas".to_string(),
            dependency: "texture.png".to_string(),
            source: Arc::new(worker),
        };

        assert_eq!(dependency.file_name(), Some("ui.atlas"));
        assert!(matches!(dependency.root_cause(), LoadError::IoError(_)));
        assert!(std::error::Error::source(&dependency).is_some());
        assert_eq!(
            dependency.to_string(),
            "Couldn't load dependency texture.png of asset ui.atlas: Couldn't load asset texture.png off-thread: disk on fire"
        );
    }

    #[test]
    fn untagged_errors() {
        let error: LoadError = "bad header".into();
        assert_eq!(error.file_name(), None);
        assert_eq!(error.to_string(), "bad header");
    }
}
