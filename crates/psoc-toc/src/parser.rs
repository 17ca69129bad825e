use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::error::{Result, TocError};
use crate::manifest::{Manifest, PipelineStateEntry, StageEntry};
use crate::pipeline_state::{PipelineState, ShaderComponent};
use crate::root_signature::RootSignatureCache;
use crate::shader_stage::ShaderStage;

/// TOC 解析器
///
/// root signature 通过外部传入的 [`RootSignatureCache`] 去重，
/// 同一个缓存可以跨多次 `parse` 使用。
pub struct TocParser<'a> {
    cache: &'a mut RootSignatureCache,
}

impl<'a> TocParser<'a> {
    pub fn new(cache: &'a mut RootSignatureCache) -> Self {
        Self { cache }
    }

    /// 解析 TOC 文件，TOC 中的相对路径以 TOC 所在目录为基准
    ///
    /// 返回的顺序与文档中的顺序一致。
    pub fn parse<P: AsRef<Path>>(&mut self, toc_path: P) -> Result<Vec<PipelineState>> {
        let toc_path = toc_path.as_ref();
        log::info!("parse toc: {:?}", toc_path);

        let manifest = Manifest::from_file(toc_path)?;

        let base_dir = match toc_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let base_dir = std::path::absolute(base_dir).map_err(|e| TocError::io(base_dir, e))?;

        self.parse_manifest(&manifest, &base_dir)
    }

    /// 解析已经加载的 TOC
    pub fn parse_manifest(&mut self, manifest: &Manifest, base_dir: &Path) -> Result<Vec<PipelineState>> {
        let mut names = HashSet::new();
        let mut result = Vec::with_capacity(manifest.pipeline_state.len());

        for (index, entry) in manifest.pipeline_state.iter().enumerate() {
            let pipeline_state = self.parse_pipeline_state(index, entry, base_dir)?;

            if !names.insert(pipeline_state.name.clone()) {
                return Err(TocError::Schema(format!("duplicate pipeline state name '{}'", pipeline_state.name)));
            }

            log::debug!(
                "pipeline state '{}': {} component(s)",
                pipeline_state.name,
                pipeline_state.components().count()
            );
            result.push(pipeline_state);
        }

        log::info!("{} pipeline state(s), {} root signature(s)", result.len(), self.cache.len());
        Ok(result)
    }
}

impl TocParser<'_> {
    fn parse_pipeline_state(
        &mut self,
        index: usize,
        entry: &PipelineStateEntry,
        base_dir: &Path,
    ) -> Result<PipelineState> {
        let name = entry
            .name
            .as_deref()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| TocError::Schema(format!("pipeline state #{index} has no name")))?;
        Self::check_name(name)?;

        if let Some(stage) = entry.unknown.keys().next() {
            return Err(TocError::UnsupportedStage {
                stage: format!("{stage} (in pipeline state '{name}')"),
            });
        }

        let root_signature = entry
            .root_signature
            .as_ref()
            .ok_or_else(|| TocError::Schema(format!("pipeline state '{name}' has no root signature")))?;
        let root_signature = self.parse_root_signature(name, root_signature, base_dir)?;

        let mut pipeline_state = PipelineState::new(name, root_signature);

        let stages = [
            (ShaderStage::Vertex, &entry.vertex_shader),
            (ShaderStage::Pixel, &entry.pixel_shader),
            (ShaderStage::Compute, &entry.compute_shader),
        ];
        for (stage, stage_entry) in stages {
            if let Some(stage_entry) = stage_entry {
                pipeline_state.set_stage(Self::parse_shader(name, stage, stage_entry, base_dir)?);
            }
        }

        Ok(pipeline_state)
    }

    /// name 会直接作为输出文件名，只允许单个普通路径分量
    fn check_name(name: &str) -> Result<()> {
        let mut components = Path::new(name).components();
        let is_plain = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        ) && !name.contains(['/', '\\']);

        if !is_plain {
            return Err(TocError::Schema(format!(
                "pipeline state name '{name}' must be a plain file name"
            )));
        }
        Ok(())
    }

    /// root signature 可以被多个 pipeline state 共享，按规范路径去重
    fn parse_root_signature(
        &mut self,
        name: &str,
        entry: &StageEntry,
        base_dir: &Path,
    ) -> Result<Arc<ShaderComponent>> {
        let path = Self::resolve_path(name, ShaderStage::RootSignature, entry, base_dir)?;

        if entry.entry.is_some() {
            log::warn!("pipeline state '{name}': entry of root signature is ignored");
        }

        let canonical_path = fs::canonicalize(&path).map_err(|e| TocError::io(&path, e))?;
        self.cache.get_or_synthesize(&canonical_path)
    }

    fn parse_shader(name: &str, stage: ShaderStage, entry: &StageEntry, base_dir: &Path) -> Result<ShaderComponent> {
        let path = Self::resolve_path(name, stage, entry, base_dir)?;

        let entry_point = entry
            .entry
            .as_deref()
            .map(str::trim)
            .filter(|entry_point| !entry_point.is_empty())
            .ok_or_else(|| TocError::Schema(format!("pipeline state '{name}': {stage} has no entry point")))?;

        Ok(ShaderComponent::shader(stage, path, entry_point))
    }

    /// 拼接 TOC 目录与相对路径，并检查文件是否存在
    fn resolve_path(name: &str, stage: ShaderStage, entry: &StageEntry, base_dir: &Path) -> Result<PathBuf> {
        let relative = entry
            .path
            .as_deref()
            .filter(|path| !path.is_empty())
            .ok_or_else(|| TocError::Schema(format!("pipeline state '{name}': {stage} has no path")))?;

        let path = base_dir.join(relative);
        if !path.is_file() {
            return Err(TocError::MissingResource { path });
        }

        Ok(path)
    }
}
