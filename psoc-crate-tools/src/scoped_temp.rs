//! 作用域临时文件与临时目录
//!
//! 两者都在 drop 时清理磁盘上的内容；`retain` 为 true 时保留，只打印日志。

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// 生成 `{prefix}_{uuid}.{ext}` 形式的唯一文件名
pub fn unique_file_name(prefix: &str, ext: &str) -> String {
    format!("{prefix}_{}.{ext}", uuid::Uuid::new_v4().simple())
}

/// drop 时删除的临时文件
#[derive(Debug)]
pub struct ScopedTempFile {
    path: PathBuf,
    retain: bool,
}

impl ScopedTempFile {
    /// 在 `dir` 下创建一个名字唯一的文件并写入 `contents`
    pub fn create(dir: &Path, prefix: &str, ext: &str, contents: &str, retain: bool) -> io::Result<Self> {
        let path = dir.join(unique_file_name(prefix, ext));

        // create_new: 防止覆盖已有的文件
        let mut file = fs::OpenOptions::new().write(true).create_new(true).open(&path)?;
        io::Write::write_all(&mut file, contents.as_bytes())?;

        log::debug!("created temp file: {:?}", path);
        Ok(Self { path, retain })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScopedTempFile {
    fn drop(&mut self) {
        if self.retain {
            log::info!("retain temp file: {:?}", self.path);
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => log::debug!("removed temp file: {:?}", self.path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("failed to remove temp file {:?}: {}", self.path, e),
        }
    }
}

/// drop 时递归删除的临时目录
#[derive(Debug)]
pub struct ScopedTempDir {
    path: PathBuf,
    retain: bool,
}

impl ScopedTempDir {
    /// 在系统临时目录下创建 `{prefix}_{uuid}` 目录
    pub fn new(prefix: &str, retain: bool) -> io::Result<Self> {
        Self::new_in(&std::env::temp_dir(), prefix, retain)
    }

    pub fn new_in(parent: &Path, prefix: &str, retain: bool) -> io::Result<Self> {
        let path = parent.join(format!("{prefix}_{}", uuid::Uuid::new_v4().simple()));
        fs::create_dir_all(&path)?;

        log::debug!("created temp dir: {:?}", path);
        Ok(Self { path, retain })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `path()` 下的某个文件
    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.path.join(name)
    }
}

impl Drop for ScopedTempDir {
    fn drop(&mut self) {
        if self.retain {
            log::info!("retain temp dir: {:?}", self.path);
            return;
        }
        if let Err(e) = fs::remove_dir_all(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                log::warn!("failed to remove temp dir {:?}: {}", self.path, e);
            }
        }
    }
}
