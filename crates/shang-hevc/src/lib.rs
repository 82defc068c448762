//! # shang-hevc
//!
//! HEVC (H.265) CABAC 熵解码引擎与残差系数解码.
//!
//! 本 crate 覆盖片数据熵解码的完整路径: 算术解码核、概率上下文
//! 建模、各层语法元素, 以及残差解码 (末位显著系数、显著性图、
//! 级别与符号、符号位隐藏、Rice 自适应、RDPCM 与反量化), 并提供
//! 瓦片/依赖片段/波前的上下文传递规则.
//!
//! ## 使用示例
//!
//! ```rust
//! use shang_hevc::{decode_residual, EntropySession, SliceParams, TransformUnit};
//!
//! // 4x4 亮度块: 仅 DC 系数为 +1, 反量化后为 408
//! let data = [0x00, 0xE0, 0x80];
//! let slice = SliceParams::default();
//! let seq = shang_hevc::SequenceParams::default();
//! let mut session = EntropySession::new(&data, &slice).unwrap();
//! let block = decode_residual(&mut session, &seq, &slice, &TransformUnit::default()).unwrap();
//! assert_eq!(block.coeffs.get(0, 0), 408);
//! ```

pub mod cabac;
pub mod common;
pub mod context;
pub mod residual;
pub mod scan;
pub mod session;
pub mod syntax;
pub mod wavefront;

// 重导出常用类型
pub use cabac::CabacDecoder;
pub use common::{
    CoeffBuffer, InterPredDir, Mvd, PartitionMode, SaoType, ScalingList, ScanType,
    SequenceParams, SliceParams, SliceType,
};
pub use context::{ContextBank, ContextSnapshot};
pub use residual::{DecodedBlock, TransformUnit, decode_residual};
pub use session::{CtbLayout, CtbTransition, EntropySession, classify_ctb, should_save_snapshot};
pub use wavefront::WavefrontSync;
