//! 统一错误类型定义.
//!
//! 所有 Shang crate 共用的错误类型, 支持跨模块传播.

use thiserror::Error;

/// Shang 框架统一错误类型
#[derive(Debug, Error)]
pub enum ShangError {
    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 无效数据 (损坏的码流等)
    #[error("无效数据: {0}")]
    InvalidData(String),

    /// 位源在需要更多输入位时耗尽.
    ///
    /// 与无效数据不同: 调用方可据此判断是码流截断还是片段正常结束.
    #[error("位源耗尽: 需要更多输入位")]
    BitstreamExhausted,

    /// 一元/Rice 前缀达到 31 bin 上限
    ///
    /// 单个语法元素级别的损坏, 调用方以钳制值继续解码.
    #[error("一元前缀溢出: 已解码 {bins} 个 bin")]
    UnaryOverflow {
        /// 溢出前已解码的 bin 数
        bins: u32,
    },

    /// 不支持的操作
    #[error("不支持的操作: {0}")]
    Unsupported(String),

    /// 内部错误 (不应发生)
    #[error("内部错误: {0}")]
    Internal(String),
}

/// Shang 框架统一 Result 类型
pub type ShangResult<T> = Result<T, ShangError>;
