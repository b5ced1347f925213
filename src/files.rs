use std::path::Path;

/// Local file access used for uploads, injected binaries and file-path
/// parameters of extension commands.
pub trait FileAccess {
    /// Whole file content, or `None` when the file cannot be read.
    fn read_file(&self, path: &str) -> Option<Vec<u8>>;

    fn file_exists(&self, path: &str) -> bool;
}

/// [`FileAccess`] over the operator's file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFiles;

impl FileAccess for LocalFiles {
    fn read_file(&self, path: &str) -> Option<Vec<u8>> {
        std::fs::read(path).ok()
    }

    fn file_exists(&self, path: &str) -> bool {
        Path::new(path).is_file()
    }
}
