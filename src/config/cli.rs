use crate::core::Storage;
use crate::utils::error::{ChainError, Result};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: String,
}

impl LocalStorage {
    pub fn new(base_path: String) -> Self {
        Self { base_path }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        Path::new(&self.base_path).join(path)
    }
}

fn partial_path(full_path: &Path) -> Result<PathBuf> {
    let file_name = full_path.file_name().ok_or_else(|| {
        ChainError::IoError(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("not a file path: {}", full_path.display()),
        ))
    })?;
    Ok(full_path.with_file_name(format!(".{}.partial", file_name.to_string_lossy())))
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let data = fs::read(self.resolve(path))?;
        Ok(data)
    }

    /// Writes to a sibling `.partial` file and renames it into place, so the
    /// destination is either the old content or the complete new content.
    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.resolve(path);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let partial = partial_path(&full_path)?;
        if let Err(e) = fs::write(&partial, data).and_then(|_| fs::rename(&partial, &full_path)) {
            let _ = fs::remove_file(&partial);
            return Err(e.into());
        }
        Ok(())
    }
}
