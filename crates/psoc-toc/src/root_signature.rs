//! root signature 的占位 shader 生成与缓存
//!
//! root signature 文件只包含宏体，例如：
//!
//! ```text
//! RootFlags(ALLOW_INPUT_ASSEMBLER_INPUT_LAYOUT),
//! CBV(b0)
//! ```
//!
//! 为了让 dxc 单独导出 root signature，需要把它包装成 `#define RS ...`，
//! 再接上一个什么也不做的 compute shader：
//!
//! ```text
//! #define RS RootFlags(ALLOW_INPUT_ASSEMBLER_INPUT_LAYOUT), \
//! CBV(b0)
//!
//! [RootSignature(RS)]
//! [numthreads(1, 1, 1)]
//! void main(uint3 DTI : SV_DispatchThreadID)
//! {
//! }
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use psoc_crate_tools::scoped_temp::ScopedTempFile;

use crate::error::{Result, TocError};
use crate::pipeline_state::ShaderComponent;

/// 占位 shader 中 root signature 宏的名字，编译时通过 `-rootsig-define` 引用
pub const RS_MACRO: &str = "RS";

/// 占位 shader 的主体，1x1x1 的空 kernel
const CARRIER_BODY: &str = "
[RootSignature(RS)]
[numthreads(1, 1, 1)]
void main(uint3 DTI : SV_DispatchThreadID)
{
}
";

/// 将 root signature 的宏体包装为占位 shader 的源码
///
/// 空行（包括只有空白字符的行）会被丢弃；除最后一行外，每行末尾追加续行符 ` \`。
/// 没有任何非空行时返回 `None`。
pub fn synthesize_placeholder_source(signature_source: &str) -> Option<String> {
    let lines: Vec<&str> = signature_source.lines().filter(|line| !line.trim().is_empty()).collect();
    if lines.is_empty() {
        return None;
    }

    let mut source = format!("#define {RS_MACRO} ");
    source.push_str(&lines.join(" \\\n"));
    source.push('\n');
    source.push_str(CARRIER_BODY);

    Some(source)
}

/// 读取 root signature 文件，在 `temp_dir` 下写出占位 shader
pub fn write_placeholder(signature_path: &Path, temp_dir: &Path, retain: bool) -> Result<ScopedTempFile> {
    let signature_source = fs::read_to_string(signature_path).map_err(|e| TocError::io(signature_path, e))?;

    let source = synthesize_placeholder_source(&signature_source).ok_or_else(|| {
        TocError::Schema(format!("root signature {} has no content", signature_path.display()))
    })?;

    let placeholder =
        ScopedTempFile::create(temp_dir, "rs", "hlsl", &source, retain).map_err(|e| TocError::io(temp_dir, e))?;

    log::debug!("root signature {:?} -> placeholder {:?}", signature_path, placeholder.path());
    Ok(placeholder)
}

/// root signature 缓存
///
/// key 为 root signature 文件的规范路径。同一个 key 只会生成一次占位 shader，
/// 之后所有引用它的 pipeline state 拿到的是同一个 [`ShaderComponent`]。
///
/// 生成的占位文件由缓存持有，缓存 drop 时删除（`retain_artifacts` 为 true 时保留）。
/// 因此缓存需要存活到编译结束。
pub struct RootSignatureCache {
    temp_dir: PathBuf,
    retain_artifacts: bool,

    entries: HashMap<PathBuf, Arc<ShaderComponent>>,
    placeholders: Vec<ScopedTempFile>,
}

// new & init
impl RootSignatureCache {
    /// 占位文件写入 `temp_dir`，该目录需要已经存在
    pub fn new(temp_dir: impl Into<PathBuf>, retain_artifacts: bool) -> Self {
        Self {
            temp_dir: temp_dir.into(),
            retain_artifacts,
            entries: HashMap::new(),
            placeholders: Vec::new(),
        }
    }
}

// getter
impl RootSignatureCache {
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, canonical_path: &Path) -> Option<&Arc<ShaderComponent>> {
        self.entries.get(canonical_path)
    }

    /// 已经生成的占位文件数量
    #[inline]
    pub fn placeholder_count(&self) -> usize {
        self.placeholders.len()
    }
}

// tools
impl RootSignatureCache {
    /// 查找 `canonical_path` 对应的编译单元，不存在时调用 `factory` 生成占位文件
    ///
    /// `factory` 的参数为临时目录和是否保留产物；
    /// 每个 key 最多调用一次，失败时不会写入缓存。
    pub fn get_or_create<F>(&mut self, canonical_path: &Path, factory: F) -> Result<Arc<ShaderComponent>>
    where
        F: FnOnce(&Path, bool) -> Result<ScopedTempFile>,
    {
        if let Some(component) = self.entries.get(canonical_path) {
            log::debug!("reuse root signature: {:?}", canonical_path);
            return Ok(component.clone());
        }

        let placeholder = factory(&self.temp_dir, self.retain_artifacts)?;
        let component = Arc::new(ShaderComponent::root_signature(placeholder.path()));

        self.placeholders.push(placeholder);
        self.entries.insert(canonical_path.to_path_buf(), component.clone());

        Ok(component)
    }

    /// 以 [`write_placeholder`] 作为 factory 的 [`Self::get_or_create`]
    pub fn get_or_synthesize(&mut self, canonical_path: &Path) -> Result<Arc<ShaderComponent>> {
        self.get_or_create(canonical_path, |temp_dir, retain| write_placeholder(canonical_path, temp_dir, retain))
    }
}
