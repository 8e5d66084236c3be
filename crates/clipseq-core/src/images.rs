// Content-addressed cache for captured images
use sha2::{Digest, Sha256};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

/// Image items reference files under this cache, so the originals can move or
/// disappear without breaking history. Identical images share one file.
pub struct ImageCache {
    root: PathBuf,
}

impl ImageCache {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store `bytes` and return the path of the cached file.
    pub fn put(&self, bytes: &[u8], ext: &str) -> std::io::Result<PathBuf> {
        let hex = hex::encode(Sha256::digest(bytes));
        let path = self.object_path(&hex, ext);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        if !path.exists() {
            let mut f = fs::File::create(&path)?;
            f.write_all(bytes)?;
        }
        Ok(path)
    }

    /// Copy the file at `src` into the cache, keeping its extension (default `png`).
    pub fn import(&self, src: &Path) -> std::io::Result<PathBuf> {
        let bytes = fs::read(src)?;
        let ext = src
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_else(|| "png".to_string());
        let path = self.put(&bytes, &ext)?;
        tracing::debug!(src = %src.display(), cached = %path.display(), "image cached");
        Ok(path)
    }

    fn object_path(&self, hex: &str, ext: &str) -> PathBuf {
        let (a, b) = (&hex[0..2], &hex[2..4]);
        self.root
            .join("objects")
            .join(a)
            .join(b)
            .join(format!("{}.{}", hex, ext))
    }
}
