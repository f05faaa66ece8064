// state.rs — 记录上次成功应用的图片地址

use crate::error::{Result, WallError};
use std::fs;
use std::path::PathBuf;
#[cfg(test)]
use std::sync::Mutex;

/// 上次应用状态的存取接口
pub trait StateStore {
    /// 没有记录时返回 `Ok(None)`
    fn get(&self) -> Result<Option<String>>;
    fn set(&self, value: &str) -> Result<()>;
}

/// 单行 UTF-8 文本文件
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StateStore for FileStateStore {
    fn get(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => {
                let value = content.trim();
                Ok((!value.is_empty()).then(|| value.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(WallError::StateIo {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn set(&self, value: &str) -> Result<()> {
        let state_err = |source| WallError::StateIo {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(state_err)?;
        }
        fs::write(&self.path, value.trim()).map_err(state_err)
    }
}

/// 仅存在于内存中的状态，用于测试
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStateStore {
    value: Mutex<Option<String>>,
}

#[cfg(test)]
impl MemoryStateStore {
    pub fn with_value(value: &str) -> Self {
        Self {
            value: Mutex::new(Some(value.to_string())),
        }
    }
}

#[cfg(test)]
impl StateStore for MemoryStateStore {
    fn get(&self) -> Result<Option<String>> {
        Ok(self.value.lock().map(|v| v.clone()).unwrap_or_default())
    }

    fn set(&self, value: &str) -> Result<()> {
        if let Ok(mut slot) = self.value.lock() {
            *slot = Some(value.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reads_as_no_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("last_url.txt"));
        assert_eq!(store.get().unwrap(), None);
    }

    #[test]
    fn value_is_written_and_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("last_url.txt");
        let store = FileStateStore::new(&path);
        store.set("  https://host/a.png\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "https://host/a.png");
        assert_eq!(store.get().unwrap().as_deref(), Some("https://host/a.png"));

        store.set("https://host/b.png").unwrap();
        assert_eq!(store.get().unwrap().as_deref(), Some("https://host/b.png"));
    }

    #[test]
    fn blank_file_reads_as_no_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last_url.txt");
        fs::write(&path, "  \n").unwrap();
        assert_eq!(FileStateStore::new(path).get().unwrap(), None);
    }

    #[test]
    fn unreadable_path_is_a_state_error() {
        let dir = tempfile::tempdir().unwrap();
        // 目录本身无法作为文件读取
        let store = FileStateStore::new(dir.path());
        assert!(matches!(store.get(), Err(WallError::StateIo { .. })));
        assert!(matches!(store.set("x"), Err(WallError::StateIo { .. })));
    }

    #[test]
    fn memory_store_round_trips() {
        let store = MemoryStateStore::default();
        assert_eq!(store.get().unwrap(), None);
        store.set("a").unwrap();
        assert_eq!(store.get().unwrap().as_deref(), Some("a"));
        assert_eq!(MemoryStateStore::with_value("b").get().unwrap().as_deref(), Some("b"));
    }
}
