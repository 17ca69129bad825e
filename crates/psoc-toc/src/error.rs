use std::path::PathBuf;

use thiserror::Error;

/// 解析 TOC 时可能出现的错误
///
/// 所有错误都是致命的：遇到第一个错误就中止本次解析。
#[derive(Error, Debug)]
pub enum TocError {
    /// TOC 缺少必填字段（name、root signature、path、entry）
    #[error("schema error: {0}")]
    Schema(String),

    /// TOC 引用的 shader / root signature 文件不存在
    #[error("missing resource: {}", path.display())]
    MissingResource { path: PathBuf },

    /// TOC 文件无法读取或无法解析
    #[error("failed to load manifest {}: {detail}", path.display())]
    Manifest { path: PathBuf, detail: String },

    /// 不认识的 shader stage
    #[error("unsupported shader stage: {stage}")]
    UnsupportedStage { stage: String },

    /// 读写文件失败
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TocError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, TocError>;
