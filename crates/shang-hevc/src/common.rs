//! 熵解码公共类型定义.
//!
//! 片类型、扫描次序、预测划分等枚举, 以及序列级/片级参数子集.
//! 参数结构只携带熵解码路径实际需要的字段, 由上层语法解析填充.

use shang_core::{ShangError, ShangResult};

/// 片类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceType {
    /// 双向预测片
    B = 0,
    /// 单向预测片
    P = 1,
    /// 帧内片
    I = 2,
}

/// 系数扫描次序
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanType {
    /// 右上对角扫描
    Diagonal = 0,
    /// 水平扫描
    Horizontal = 1,
    /// 垂直扫描
    Vertical = 2,
}

/// 编码单元划分模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionMode {
    /// 2Nx2N 整块
    Part2Nx2N = 0,
    /// 2NxN 水平对分
    Part2NxN = 1,
    /// Nx2N 垂直对分
    PartNx2N = 2,
    /// NxN 四分
    PartNxN = 3,
    /// 2NxnU 非对称上分
    Part2NxnU = 4,
    /// 2NxnD 非对称下分
    Part2NxnD = 5,
    /// nLx2N 非对称左分
    PartNLx2N = 6,
    /// nRx2N 非对称右分
    PartNRx2N = 7,
}

/// 帧间预测方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterPredDir {
    /// 仅参考列表 0
    L0,
    /// 仅参考列表 1
    L1,
    /// 双向
    Bi,
}

/// SAO 滤波类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaoType {
    /// 不滤波
    None,
    /// 带偏移
    Band,
    /// 边缘偏移
    Edge,
}

/// 运动矢量差
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mvd {
    pub x: i32,
    pub y: i32,
}

/// 缩放矩阵 (按尺寸与矩阵 ID 索引)
///
/// 尺寸 0 为 4x4 (仅前 16 项有效), 1 为 8x8, 2 为 16x16, 3 为 32x32;
/// 16x16 与 32x32 的 DC 系数另行存放.
#[derive(Debug, Clone)]
pub struct ScalingList {
    /// 各尺寸各矩阵的缩放因子
    pub sl: [[[u8; 64]; 6]; 4],
    /// 16x16 与 32x32 矩阵的 DC 缩放因子
    pub sl_dc: [[u8; 6]; 2],
}

impl Default for ScalingList {
    /// 全平坦矩阵 (一律 16), 即未显式传输缩放表时的行为
    fn default() -> Self {
        Self {
            sl: [[[16; 64]; 6]; 4],
            sl_dc: [[16; 6]; 2],
        }
    }
}

/// 序列级参数子集 (来自 SPS/PPS, 熵解码路径所需部分)
#[derive(Debug, Clone)]
pub struct SequenceParams {
    /// 亮度位深 (8-14)
    pub bit_depth: u8,
    /// 色度格式 (0=单色, 1=4:2:0, 2=4:2:2, 3=4:4:4)
    pub chroma_format_idc: u8,
    /// 是否允许变换跳过
    pub transform_skip_enabled: bool,
    /// 变换跳过允许的最大块对数尺寸
    pub log2_max_transform_skip_size: u8,
    /// 变换跳过块是否使用专用显著性上下文
    pub transform_skip_context_enabled: bool,
    /// 4x4 变换跳过块是否旋转系数
    pub transform_skip_rotation_enabled: bool,
    /// 符号位隐藏
    pub sign_data_hiding_enabled: bool,
    /// Rice 参数跨块持久自适应
    pub persistent_rice_adaptation_enabled: bool,
    /// 隐式 RDPCM
    pub implicit_rdpcm_enabled: bool,
    /// 显式 RDPCM
    pub explicit_rdpcm_enabled: bool,
    /// 缩放矩阵 (None 表示全平坦)
    pub scaling_list: Option<ScalingList>,
    /// 图像级 Cb 量化偏移
    pub cb_qp_offset: i32,
    /// 图像级 Cr 量化偏移
    pub cr_qp_offset: i32,
    /// 瓦片划分已启用
    pub tiles_enabled: bool,
    /// 波前熵同步已启用
    pub entropy_coding_sync_enabled: bool,
}

impl Default for SequenceParams {
    fn default() -> Self {
        Self {
            bit_depth: 8,
            chroma_format_idc: 1,
            transform_skip_enabled: false,
            log2_max_transform_skip_size: 2,
            transform_skip_context_enabled: false,
            transform_skip_rotation_enabled: false,
            sign_data_hiding_enabled: false,
            persistent_rice_adaptation_enabled: false,
            implicit_rdpcm_enabled: false,
            explicit_rdpcm_enabled: false,
            scaling_list: None,
            cb_qp_offset: 0,
            cr_qp_offset: 0,
            tiles_enabled: false,
            entropy_coding_sync_enabled: false,
        }
    }
}

impl SequenceParams {
    /// 校验参数组合的合法性
    pub fn validate(&self) -> ShangResult<()> {
        if !(8..=14).contains(&self.bit_depth) {
            return Err(ShangError::InvalidArgument(format!(
                "不支持的位深: {}",
                self.bit_depth,
            )));
        }
        if self.chroma_format_idc > 3 {
            return Err(ShangError::InvalidArgument(format!(
                "无效的色度格式: {}",
                self.chroma_format_idc,
            )));
        }
        Ok(())
    }
}

/// 片级参数子集
#[derive(Debug, Clone)]
pub struct SliceParams {
    /// 片类型
    pub slice_type: SliceType,
    /// 片量化参数 (上下文初始化用)
    pub qp: i32,
    /// cabac_init_flag
    pub cabac_init_flag: bool,
    /// 依赖片段 (继承前一片段的上下文)
    pub dependent_slice_segment: bool,
    /// 片级 Cb 量化偏移
    pub slice_cb_qp_offset: i32,
    /// 片级 Cr 量化偏移
    pub slice_cr_qp_offset: i32,
    /// 合并候选数上限 (1-5)
    pub max_num_merge_cand: u32,
}

impl Default for SliceParams {
    fn default() -> Self {
        Self {
            slice_type: SliceType::I,
            qp: 26,
            cabac_init_flag: false,
            dependent_slice_segment: false,
            slice_cb_qp_offset: 0,
            slice_cr_qp_offset: 0,
            max_num_merge_cand: 5,
        }
    }
}

/// 变换块系数缓冲
///
/// 以行优先一维数组存放一个变换块的全部系数, 通过 (x, y) 访问器
/// 做边界检查后换算线性下标.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoeffBuffer {
    coeffs: Vec<i16>,
    log2_size: u8,
}

impl CoeffBuffer {
    /// 创建全零缓冲, log2_size 取 2-5 (4x4 到 32x32)
    pub fn new(log2_size: u8) -> ShangResult<Self> {
        if !(2..=5).contains(&log2_size) {
            return Err(ShangError::InvalidArgument(format!(
                "无效的变换块对数尺寸: {}",
                log2_size,
            )));
        }
        let size = 1usize << log2_size;
        Ok(Self {
            coeffs: vec![0; size * size],
            log2_size,
        })
    }

    /// 块边长
    #[inline]
    pub fn size(&self) -> usize {
        1 << self.log2_size
    }

    /// 块对数尺寸
    #[inline]
    pub fn log2_size(&self) -> u8 {
        self.log2_size
    }

    fn linear(&self, x: usize, y: usize) -> usize {
        assert!(
            x < self.size() && y < self.size(),
            "系数坐标 ({}, {}) 越界, 块边长 {}",
            x,
            y,
            self.size(),
        );
        (y << self.log2_size) + x
    }

    /// 读取 (x, y) 处的系数
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> i16 {
        self.coeffs[self.linear(x, y)]
    }

    /// 写入 (x, y) 处的系数
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: i16) {
        let idx = self.linear(x, y);
        self.coeffs[idx] = value;
    }

    /// 行优先的系数切片
    pub fn as_slice(&self) -> &[i16] {
        &self.coeffs
    }

    /// 非零系数个数
    pub fn count_nonzero(&self) -> usize {
        self.coeffs.iter().filter(|&&c| c != 0).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coeff_buffer_indexing() {
        let mut buf = CoeffBuffer::new(2).unwrap();
        assert_eq!(buf.size(), 4);
        buf.set(3, 1, -7);
        assert_eq!(buf.get(3, 1), -7);
        assert_eq!(buf.as_slice()[7], -7);
        assert_eq!(buf.count_nonzero(), 1);
    }

    #[test]
    #[should_panic(expected = "越界")]
    fn test_coeff_buffer_out_of_bounds() {
        let buf = CoeffBuffer::new(2).unwrap();
        buf.get(4, 0);
    }

    #[test]
    fn test_coeff_buffer_rejects_bad_size() {
        assert!(CoeffBuffer::new(1).is_err());
        assert!(CoeffBuffer::new(6).is_err());
    }

    #[test]
    fn test_sequence_params_validate() {
        let mut params = SequenceParams::default();
        assert!(params.validate().is_ok());
        params.bit_depth = 15;
        assert!(params.validate().is_err());
    }
}
