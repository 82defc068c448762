//! # Shang (觞)
//!
//! 纯 Rust 实现的 HEVC (H.265) CABAC 熵解码引擎与残差系数解码.
//!
//! Shang 覆盖片数据熵解码的完整路径:
//! - **算术解码核**: 常规 bin / 旁路 bin / 终止 bin 三种解码原语
//! - **概率上下文**: 178 个上下文的初始化、推进与波前快照
//! - **语法元素**: SAO、编码单元、预测单元与变换树各层标志
//! - **残差解码**: 末位显著系数、显著性图、级别与符号, 含符号位
//!   隐藏、Rice 自适应、RDPCM 与反量化
//! - **并行结构**: 瓦片、依赖片段与波前 (WPP) 的上下文传递
//!
//! # 快速开始
//!
//! ```rust
//! use shang::hevc::{EntropySession, SliceParams};
//!
//! // 片数据第一个字节含对齐位, 随后 9 比特装载算术解码器
//! let data = [0x00, 0x52, 0x80];
//! let slice = SliceParams::default();
//! let mut session = EntropySession::new(&data, &slice).unwrap();
//! let flag = session.cabac.decode_terminate().unwrap();
//! println!("end_of_slice_flag = {flag}");
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `shang-core` | 错误类型与比特流读取 |
//! | `shang-hevc` | CABAC 引擎、上下文、语法元素与残差解码 |

/// 错误类型与比特流读取
pub use shang_core as core;

/// CABAC 引擎、上下文建模、语法元素与残差解码
pub use shang_hevc as hevc;

pub mod logging;

/// 获取 Shang 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
