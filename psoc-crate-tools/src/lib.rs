//! psoc 工具集
//!
//! 提供日志初始化、作用域临时文件等在各个 crate 之间共享的工具。
//!
//! # 作用域临时文件
//! [`scoped_temp::ScopedTempFile`] 与 [`scoped_temp::ScopedTempDir`] 在 drop 时删除自身，
//! 除非显式要求保留（用于事后排查编译器的输入）。

pub mod init_log;
pub mod scoped_temp;
