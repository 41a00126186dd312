use super::KeyValueStore;
use crate::error::StorageError;

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

/// The simple backend: each key is a file in one directory.
#[derive(Debug)]
pub struct FileStore {
  dir: PathBuf,
  quota: Option<usize>,
  // Serializes writers within this process.
  write_lock: Mutex<()>,
}

impl FileStore {
  /// Opens a store rooted at `dir`, creating the directory if needed.
  pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
    let dir = dir.as_ref().to_path_buf();
    fs::create_dir_all(&dir)?;
    Ok(Self {
      dir,
      quota: None,
      write_lock: Mutex::new(()),
    })
  }

  /// Caps the total bytes of all stored values.
  pub fn with_quota(mut self, bytes: usize) -> Self {
    self.quota = Some(bytes);
    self
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  fn path_for(&self, key: &str) -> PathBuf {
    let name: String = key
      .chars()
      .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
      .collect();
    self.dir.join(format!("{name}.json"))
  }

  fn used_bytes_excluding(&self, skip: &Path) -> Result<usize, StorageError> {
    let mut total = 0usize;
    for entry in fs::read_dir(&self.dir)? {
      let entry = entry?;
      let path = entry.path();
      if path == skip || path.extension().map_or(true, |ext| ext != "json") {
        continue;
      }
      total += entry.metadata()?.len() as usize;
    }
    Ok(total)
  }
}

impl KeyValueStore for FileStore {
  fn name(&self) -> &'static str {
    "file"
  }

  fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
    match fs::read_to_string(self.path_for(key)) {
      Ok(raw) => Ok(Some(raw)),
      Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
      Err(e) => Err(e.into()),
    }
  }

  fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
    let _guard = self.write_lock.lock();
    let path = self.path_for(key);

    if let Some(limit) = self.quota {
      let needed = self.used_bytes_excluding(&path)? + value.len();
      if needed > limit {
        return Err(StorageError::QuotaExceeded {
          key: key.to_string(),
          needed,
          limit,
        });
      }
    }

    // Write beside the target and rename so readers never see half a file.
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, value)?;
    fs::rename(&tmp, &path)?;
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<(), StorageError> {
    let _guard = self.write_lock.lock();
    match fs::remove_file(self.path_for(key)) {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
      Err(e) => Err(e.into()),
    }
  }
}
