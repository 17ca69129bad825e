//! Pipeline State TOC
//!
//! 读取声明式的 TOC（table of contents），得到一组 [`PipelineState`]。
//! 每个 pipeline state 包含一个 root signature，以及可选的 vertex/pixel/compute shader。
//!
//! root signature 以宏的形式书写，本身不是一个可以编译的 shader。
//! 解析时会为它生成一个最小的 compute shader 作为载体（见 [`root_signature`]），
//! 并通过 [`RootSignatureCache`] 保证同一个文件只生成一次。

pub mod error;
pub mod manifest;
pub mod parser;
pub mod pipeline_state;
pub mod root_signature;
pub mod shader_stage;

pub use error::{Result, TocError};
pub use parser::TocParser;
pub use pipeline_state::{PipelineState, ShaderComponent};
pub use root_signature::RootSignatureCache;
pub use shader_stage::ShaderStage;
