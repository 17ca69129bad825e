use std::path::PathBuf;
use std::time::Duration;

use psoc_toc::TocError;
use thiserror::Error;

/// 编译过程中的错误，全部是致命的
#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Toc(#[from] TocError),

    /// 编译参数表中没有对应 stage 的模板
    #[error("unsupported shader stage: {stage}")]
    UnsupportedStage { stage: String },

    #[error("invalid build configuration '{0}', expected one of Debug, Release, Trace")]
    InvalidConfiguration(String),

    #[error("invalid settings {}: {detail}", path.display())]
    Settings { path: PathBuf, detail: String },

    /// 编译器无法启动，或者返回了非 0 的退出码
    #[error("compiler invocation failed: `{command}`: {detail}")]
    CompilerInvocation { command: String, detail: String },

    #[error("compiler did not finish within {timeout:?}: `{command}`")]
    CompilerTimeout { command: String, timeout: Duration },

    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BuildError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, BuildError>;
