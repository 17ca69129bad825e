//! TOC 文件的反序列化模型
//!
//! 字段在 serde 层面全部是可选的，必填项由 [`crate::parser`] 检查，
//! 这样缺字段时得到的是 [`TocError::Schema`] 而不是解析错误。

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, TocError};

/// TOC 文件格式，由扩展名决定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Toml,
    Json,
}

impl ManifestFormat {
    /// `.json` 为 JSON，其余都按 TOML 处理
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Toml,
        }
    }
}

/// 整个 TOC
#[derive(Debug, Default, Deserialize)]
pub struct Manifest {
    /// 保持文档中的顺序
    #[serde(default, alias = "PipelineState")]
    pub pipeline_state: Vec<PipelineStateEntry>,
}

/// TOC 中的一条 pipeline state 记录
#[derive(Debug, Default, Deserialize)]
pub struct PipelineStateEntry {
    pub name: Option<String>,

    #[serde(alias = "RootSignature")]
    pub root_signature: Option<StageEntry>,

    #[serde(alias = "VertexShader")]
    pub vertex_shader: Option<StageEntry>,

    #[serde(alias = "PixelShader")]
    pub pixel_shader: Option<StageEntry>,

    #[serde(alias = "ComputeShader")]
    pub compute_shader: Option<StageEntry>,

    /// 不认识的字段，由 parser 报告为不支持的 stage
    #[serde(flatten)]
    pub unknown: BTreeMap<String, serde::de::IgnoredAny>,
}

/// 一个 stage 的文件引用
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageEntry {
    /// 相对于 TOC 所在目录
    pub path: Option<String>,
    /// root signature 不需要
    pub entry: Option<String>,
}

impl Manifest {
    /// 从文件加载，格式由扩展名决定
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| TocError::Manifest {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;

        Self::from_str_with_format(&content, ManifestFormat::from_path(path)).map_err(|detail| TocError::Manifest {
            path: path.to_path_buf(),
            detail,
        })
    }

    /// 解析失败时返回错误描述
    pub fn from_str_with_format(content: &str, format: ManifestFormat) -> std::result::Result<Self, String> {
        match format {
            ManifestFormat::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            ManifestFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        }
    }
}
