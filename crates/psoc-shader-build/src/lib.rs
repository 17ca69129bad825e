//! Pipeline state 着色器编译
//!
//! 解析 TOC 得到 pipeline state 列表，然后对每个编译单元调用一次外部编译器（dxc）。
//! 编译是同步的：每个进程结束后才会启动下一个，root signature 总是先于其他 stage 编译。

pub mod build_config;
pub mod command;
pub mod compiler;
pub mod driver;
pub mod error;
pub mod flag_table;

pub use build_config::{BuildConfiguration, BuildOptions, BuildSettings};
pub use compiler::{Artifact, BuildReport, ShaderCompiler};
pub use driver::build;
pub use error::{BuildError, Result};
pub use flag_table::{FlagTable, FlagTemplate};
