use std::fmt;
use std::path::{Path, PathBuf};

/// How a `FileHandle` path should be interpreted
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FileType {
    // Relative to the application's asset root, already joined into the path
    Internal,
    // Used as given
    Absolute,
}

/// Location of a resource, as produced by a resolver. Handles are cheap values, they do not hold
/// the file open.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct FileHandle {
    path: PathBuf,
    file_type: FileType,
}

impl FileHandle {
    pub fn new(
        path: impl Into<PathBuf>,
        file_type: FileType,
    ) -> Self {
        FileHandle {
            path: path.into(),
            file_type,
        }
    }

    pub fn absolute(path: impl Into<PathBuf>) -> Self {
        Self::new(path, FileType::Absolute)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn is_directory(&self) -> bool {
        self.path.is_dir()
    }

    /// The last path component, including the extension
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|x| x.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn extension(&self) -> String {
        self.path
            .extension()
            .map(|x| x.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn name_without_extension(&self) -> String {
        self.path
            .file_stem()
            .map(|x| x.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// The directory containing this file. An empty handle is returned for a bare file name.
    pub fn parent(&self) -> FileHandle {
        let parent = self
            .path
            .parent()
            .map(|x| x.to_path_buf())
            .unwrap_or_default();
        FileHandle::new(parent, self.file_type)
    }

    pub fn child(
        &self,
        name: &str,
    ) -> FileHandle {
        FileHandle::new(self.path.join(name), self.file_type)
    }

    pub fn sibling(
        &self,
        name: &str,
    ) -> FileHandle {
        self.parent().child(name)
    }

    pub fn read_bytes(&self) -> std::io::Result<Vec<u8>> {
        std::fs::read(&self.path)
    }

    pub fn read_to_string(&self) -> std::io::Result<String> {
        std::fs::read_to_string(&self.path)
    }

    pub fn length(&self) -> u64 {
        std::fs::metadata(&self.path).map(|x| x.len()).unwrap_or(0)
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "FileHandle({:?}, {:?})", self.file_type, self.path)
    }
}

impl fmt::Display for FileHandle {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn name_parts() {
        let file = FileHandle::absolute("data/ui/atlas.pack");
        assert_eq!(file.name(), "atlas.pack");
        assert_eq!(file.extension(), "pack");
        assert_eq!(file.name_without_extension(), "atlas");
        assert_eq!(file.parent().path(), Path::new("data/ui"));
        assert_eq!(file.sibling("atlas.png").path(), Path::new("data/ui/atlas.png"));
    }

    #[test]
    fn bare_file_name_has_empty_parent() {
        let file = FileHandle::new("atlas.pack", FileType::Internal);
        assert_eq!(file.parent().path(), Path::new(""));
        assert_eq!(file.parent().file_type(), FileType::Internal);
        assert_eq!(file.sibling("a.png").path(), Path::new("a.png"));
    }

    #[test]
    fn missing_file() {
        let file = FileHandle::absolute("/this/path/should/not/exist/at/all.png");
        assert!(!file.exists());
        assert_eq!(file.length(), 0);
        assert!(file.read_bytes().is_err());
    }
}
