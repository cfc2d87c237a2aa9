// 工具模块入口
pub mod error;
pub mod file;
