//! # shang-core
//!
//! Shang 熵解码核心库, 提供基础类型定义、错误处理和位源工具.
//!
//! 为 `shang-hevc` 熵解码核心提供底层基础设施: 统一错误类型与
//! 字节对齐区域上的比特流读取器.

pub mod bitreader;
pub mod error;

// 重导出常用类型
pub use bitreader::BitReader;
pub use error::{ShangError, ShangResult};
