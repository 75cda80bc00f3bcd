use ferry_base::{FileHandle, FileType, LoadError, LoadResult};
use std::path::{Path, PathBuf};

/// Maps the logical file name of an asset to a location. Resolvers are shared by loaders and may be
/// called from worker threads.
pub trait FileHandleResolver: Send + Sync {
    fn resolve(
        &self,
        file_name: &str,
    ) -> FileHandle;
}

/// Resolves file names relative to the application's asset directory
pub struct InternalFileHandleResolver {
    root: PathBuf,
}

impl InternalFileHandleResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        InternalFileHandleResolver { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FileHandleResolver for InternalFileHandleResolver {
    fn resolve(
        &self,
        file_name: &str,
    ) -> FileHandle {
        FileHandle::new(self.root.join(file_name), FileType::Internal)
    }
}

/// Uses file names as-is
#[derive(Default)]
pub struct AbsoluteFileHandleResolver;

impl FileHandleResolver for AbsoluteFileHandleResolver {
    fn resolve(
        &self,
        file_name: &str,
    ) -> FileHandle {
        FileHandle::absolute(file_name)
    }
}

/// Prepends a fixed prefix to every file name before handing it to another resolver
pub struct PrefixFileHandleResolver {
    base: Box<dyn FileHandleResolver>,
    prefix: String,
}

impl PrefixFileHandleResolver {
    pub fn new(
        base: Box<dyn FileHandleResolver>,
        prefix: impl Into<String>,
    ) -> Self {
        PrefixFileHandleResolver {
            base,
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl FileHandleResolver for PrefixFileHandleResolver {
    fn resolve(
        &self,
        file_name: &str,
    ) -> FileHandle {
        self.base.resolve(&format!("{}{}", self.prefix, file_name))
    }
}

/// A set of assets authored for a particular screen size. Assets for it live in a sibling folder
/// named `suffix`, e.g. `ui/480x800/button.png` for `ui/button.png`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub portrait_width: u32,
    pub portrait_height: u32,
    pub suffix: String,
}

impl Resolution {
    pub fn new(
        portrait_width: u32,
        portrait_height: u32,
        suffix: impl Into<String>,
    ) -> Self {
        Resolution {
            portrait_width,
            portrait_height,
            suffix: suffix.into(),
        }
    }
}

/// Picks the largest resolution that still fits the screen. Sizes are compared against the
/// portrait dimensions, so a landscape screen matches its width against the portrait height.
pub fn choose_resolution(
    screen_width: u32,
    screen_height: u32,
    resolutions: &[Resolution],
) -> Option<&Resolution> {
    let mut best = resolutions.first()?;
    for other in resolutions {
        let fits = if screen_width < screen_height {
            screen_width >= other.portrait_width
                && other.portrait_width >= best.portrait_width
                && screen_height >= other.portrait_height
                && other.portrait_height >= best.portrait_height
        } else {
            screen_width >= other.portrait_height
                && other.portrait_height >= best.portrait_height
                && screen_height >= other.portrait_width
                && other.portrait_width >= best.portrait_width
        };

        if fits {
            best = other;
        }
    }

    Some(best)
}

/// Looks for a screen-size specific variant of a file first and falls back to the file itself
pub struct ResolutionFileHandleResolver {
    base: Box<dyn FileHandleResolver>,
    suffix: String,
}

impl ResolutionFileHandleResolver {
    pub fn new(
        base: Box<dyn FileHandleResolver>,
        screen_width: u32,
        screen_height: u32,
        resolutions: &[Resolution],
    ) -> LoadResult<Self> {
        let best = choose_resolution(screen_width, screen_height, resolutions).ok_or_else(|| {
            LoadError::from("ResolutionFileHandleResolver needs at least one resolution")
        })?;

        log::debug!(
            "Screen {}x{} uses resolution folder {}",
            screen_width,
            screen_height,
            best.suffix
        );

        Ok(ResolutionFileHandleResolver {
            base,
            suffix: best.suffix.clone(),
        })
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    fn variant_name(
        &self,
        file_name: &str,
    ) -> String {
        let path = Path::new(file_name);
        let name = path
            .file_name()
            .map(|x| x.to_string_lossy().into_owned())
            .unwrap_or_default();
        match path.parent().map(|x| x.to_string_lossy().into_owned()) {
            Some(parent) if !parent.is_empty() => format!("{}/{}/{}", parent, self.suffix, name),
            _ => format!("{}/{}", self.suffix, name),
        }
    }
}

impl FileHandleResolver for ResolutionFileHandleResolver {
    fn resolve(
        &self,
        file_name: &str,
    ) -> FileHandle {
        let handle = self.base.resolve(&self.variant_name(file_name));
        if handle.exists() {
            handle
        } else {
            self.base.resolve(file_name)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn resolutions() -> Vec<Resolution> {
        vec![
            Resolution::new(320, 480, "320x480"),
            Resolution::new(480, 800, "480x800"),
            Resolution::new(720, 1280, "720x1280"),
        ]
    }

    #[test]
    fn choose_portrait() {
        let resolutions = resolutions();
        assert_eq!(
            choose_resolution(480, 854, &resolutions).unwrap().suffix,
            "480x800"
        );
        assert_eq!(
            choose_resolution(1080, 1920, &resolutions).unwrap().suffix,
            "720x1280"
        );
        // Smaller than everything falls back to the first entry
        assert_eq!(
            choose_resolution(100, 200, &resolutions).unwrap().suffix,
            "320x480"
        );
    }

    #[test]
    fn choose_landscape() {
        let resolutions = resolutions();
        assert_eq!(
            choose_resolution(854, 480, &resolutions).unwrap().suffix,
            "480x800"
        );
    }

    #[test]
    fn choose_without_resolutions() {
        assert!(choose_resolution(800, 600, &[]).is_none());
        assert!(ResolutionFileHandleResolver::new(
            Box::new(AbsoluteFileHandleResolver),
            800,
            600,
            &[]
        )
        .is_err());
    }

    #[test]
    fn internal_and_prefix() {
        let internal = InternalFileHandleResolver::new("assets");
        let file = internal.resolve("ui/skin.json");
        assert_eq!(file.path(), Path::new("assets/ui/skin.json"));
        assert_eq!(file.file_type(), FileType::Internal);

        let prefixed =
            PrefixFileHandleResolver::new(Box::new(InternalFileHandleResolver::new("assets")), "hd/");
        assert_eq!(
            prefixed.resolve("skin.json").path(),
            Path::new("assets/hd/skin.json")
        );
    }

    #[test]
    fn resolution_falls_back_to_original_name() {
        let resolver = ResolutionFileHandleResolver::new(
            Box::new(AbsoluteFileHandleResolver),
            480,
            800,
            &resolutions(),
        )
        .unwrap();
        assert_eq!(resolver.suffix(), "480x800");
        assert_eq!(resolver.variant_name("ui/button.png"), "ui/480x800/button.png");
        assert_eq!(resolver.variant_name("button.png"), "480x800/button.png");

        // Neither file exists, so the original name is used
        let file = resolver.resolve("/no/such/dir/button.png");
        assert_eq!(file.path(), Path::new("/no/such/dir/button.png"));
    }
}
