use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::shader_stage::ShaderStage;

/// 一个可以交给外部编译器的编译单元
///
/// 创建后不可修改。root signature 的 `source_path` 指向生成的占位 shader，
/// 而不是原始的 root signature 文件。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderComponent {
    stage: ShaderStage,
    source_path: PathBuf,
    entry_point: Option<String>,
}

impl ShaderComponent {
    /// root signature 使用占位 shader 固定的 `main`，不需要 entry point
    pub fn root_signature(placeholder_path: impl Into<PathBuf>) -> Self {
        Self {
            stage: ShaderStage::RootSignature,
            source_path: placeholder_path.into(),
            entry_point: None,
        }
    }

    /// # Panics
    /// `stage` 为 [`ShaderStage::RootSignature`] 时 panic，应该使用 [`Self::root_signature`]
    pub fn shader(stage: ShaderStage, source_path: impl Into<PathBuf>, entry_point: impl Into<String>) -> Self {
        assert!(stage.requires_entry_point(), "use ShaderComponent::root_signature for root signatures");
        Self {
            stage,
            source_path: source_path.into(),
            entry_point: Some(entry_point.into()),
        }
    }

    #[inline]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    #[inline]
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    #[inline]
    pub fn entry_point(&self) -> Option<&str> {
        self.entry_point.as_deref()
    }
}

/// 一个 pipeline state：一个 root signature 加上若干 shader stage
///
/// 每种 stage 只有一个槽位，root signature 是必须的。
/// root signature 通过 `Arc` 在引用同一个文件的 pipeline state 之间共享。
#[derive(Debug, Clone)]
pub struct PipelineState {
    pub name: String,
    pub root_signature: Arc<ShaderComponent>,
    pub vertex: Option<ShaderComponent>,
    pub pixel: Option<ShaderComponent>,
    pub compute: Option<ShaderComponent>,
}

impl PipelineState {
    pub fn new(name: impl Into<String>, root_signature: Arc<ShaderComponent>) -> Self {
        Self {
            name: name.into(),
            root_signature,
            vertex: None,
            pixel: None,
            compute: None,
        }
    }

    /// 按 stage 取出对应的编译单元
    pub fn component(&self, stage: ShaderStage) -> Option<&ShaderComponent> {
        match stage {
            ShaderStage::RootSignature => Some(&self.root_signature),
            ShaderStage::Vertex => self.vertex.as_ref(),
            ShaderStage::Pixel => self.pixel.as_ref(),
            ShaderStage::Compute => self.compute.as_ref(),
        }
    }

    /// 填充某个 shader stage 的槽位，返回被替换掉的旧值
    ///
    /// # Panics
    /// 不能用来替换 root signature
    pub fn set_stage(&mut self, component: ShaderComponent) -> Option<ShaderComponent> {
        let slot = match component.stage() {
            ShaderStage::RootSignature => panic!("root signature is fixed at construction"),
            ShaderStage::Vertex => &mut self.vertex,
            ShaderStage::Pixel => &mut self.pixel,
            ShaderStage::Compute => &mut self.compute,
        };
        slot.replace(component)
    }

    /// 所有编译单元，root signature 总是第一个
    pub fn components(&self) -> impl Iterator<Item = &ShaderComponent> {
        ShaderStage::ALL.into_iter().filter_map(|stage| self.component(stage))
    }

    /// 编译产物的文件名：`{name}.{suffix}`
    pub fn output_file_name(&self, stage: ShaderStage) -> String {
        format!("{}.{}", self.name, stage.output_suffix())
    }
}
