//! CABAC 算术解码引擎.
//!
//! 基于 9 位 range/offset 寄存器的上下文自适应二进制算术解码器.
//! 采用逐位重整化模型: 每次重整化从位源读入 1 位, 与参考解码器
//! 的位消耗逐位一致, 便于在片/瓦片边界按字节重对齐.
//!
//! 三种 bin 解码路径:
//! - 常规 bin: 由概率状态驱动, 查 LPS 区间表并更新状态;
//! - 旁路 bin: 等概率, 不触碰任何上下文;
//! - 终止 bin: 用于 end_of_slice_flag 与 pcm_flag.

use log::warn;
use shang_core::{BitReader, ShangError, ShangResult};

/// 一元前缀解码的 bin 数上限, 超出即判定码流损坏
pub const MAX_PREFIX_BINS: u32 = 31;

// ============ 概率状态 ============

/// 单个上下文的概率状态
///
/// 打包为一个字节: 高 7 位是概率状态索引 (0-63 左移 1 位), 最低位是 MPS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProbabilityState(pub u8);

impl ProbabilityState {
    /// 由初始化值 (0-255) 与量化参数推导初始状态
    ///
    /// 初始化值高 4 位映射斜率, 低 4 位映射偏移,
    /// 推导出的预状态折叠符号后编码为 (状态, MPS) 对.
    pub fn from_init_value(init_value: u8, qp: i32) -> Self {
        let qp = qp.clamp(0, 51);
        let m = (i32::from(init_value >> 4)) * 5 - 45;
        let n = (i32::from(init_value & 15) << 3) - 16;
        let mut pre = 2 * (((m * qp) >> 4) + n) - 127;

        pre ^= pre >> 31;
        if pre > 124 {
            pre = 124 + (pre & 1);
        }
        Self(pre as u8)
    }

    /// 概率状态索引 (0-63)
    #[inline]
    pub fn state(self) -> u8 {
        self.0 >> 1
    }

    /// 最可能符号 (0 或 1)
    #[inline]
    pub fn mps(self) -> u8 {
        self.0 & 1
    }
}

// ============ 区间细分与状态迁移表 ============

// 按 (状态, (range >> 6) & 3) 查 LPS 子区间宽度
const LPS_RANGE: [[u8; 4]; 64] = [
    [128, 176, 208, 240],
    [128, 167, 197, 227],
    [128, 158, 187, 216],
    [123, 150, 178, 205],
    [116, 142, 169, 195],
    [111, 135, 160, 185],
    [105, 128, 152, 175],
    [100, 122, 144, 166],
    [95, 116, 137, 158],
    [90, 110, 130, 150],
    [85, 104, 123, 142],
    [81, 99, 117, 135],
    [77, 94, 111, 128],
    [73, 89, 105, 122],
    [69, 85, 100, 116],
    [66, 80, 95, 110],
    [62, 76, 90, 104],
    [59, 72, 86, 99],
    [56, 69, 81, 94],
    [53, 65, 77, 89],
    [51, 62, 73, 85],
    [48, 59, 69, 80],
    [46, 56, 66, 76],
    [43, 53, 63, 72],
    [41, 50, 59, 69],
    [39, 48, 56, 65],
    [37, 45, 54, 62],
    [35, 43, 51, 59],
    [33, 41, 48, 56],
    [32, 39, 46, 53],
    [30, 37, 43, 50],
    [29, 35, 41, 48],
    [27, 33, 39, 45],
    [26, 31, 37, 43],
    [24, 30, 35, 41],
    [23, 28, 33, 39],
    [22, 27, 32, 37],
    [21, 26, 30, 35],
    [20, 24, 29, 33],
    [19, 23, 27, 31],
    [18, 22, 26, 30],
    [17, 21, 25, 28],
    [16, 20, 23, 27],
    [15, 19, 22, 25],
    [14, 18, 21, 24],
    [14, 17, 20, 23],
    [13, 16, 19, 22],
    [12, 15, 18, 21],
    [12, 14, 17, 20],
    [11, 14, 16, 19],
    [11, 13, 15, 18],
    [10, 12, 15, 17],
    [10, 12, 14, 16],
    [9, 11, 13, 15],
    [9, 11, 12, 14],
    [8, 10, 12, 14],
    [8, 9, 11, 13],
    [7, 9, 11, 12],
    [7, 9, 10, 12],
    [7, 8, 10, 11],
    [6, 8, 9, 11],
    [6, 7, 9, 10],
    [6, 7, 8, 9],
    [2, 2, 2, 2],
];

// 解出 MPS 后的状态迁移
const MPS_NEXT_STATE: [u8; 64] = [
    1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16,
    17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27, 28, 29, 30, 31, 32,
    33, 34, 35, 36, 37, 38, 39, 40, 41, 42, 43, 44, 45, 46, 47, 48,
    49, 50, 51, 52, 53, 54, 55, 56, 57, 58, 59, 60, 61, 62, 62, 63,
];

// 解出 LPS 后的状态迁移 (状态 0 时翻转 MPS)
const LPS_NEXT_STATE: [u8; 64] = [
    0, 0, 1, 2, 2, 4, 4, 5, 6, 7, 8, 9, 9, 11, 11, 12,
    13, 13, 15, 15, 16, 16, 18, 18, 19, 19, 21, 21, 22, 22, 23, 24,
    24, 25, 26, 26, 27, 27, 28, 29, 29, 30, 30, 30, 31, 32, 32, 33,
    33, 33, 34, 34, 35, 35, 35, 36, 36, 36, 37, 37, 37, 38, 38, 63,
];

// ============ 解码引擎 ============

/// CABAC 算术解码器
///
/// 持有位源与 range/offset 两个 9 位寄存器. 不变量: 除终止 bin
/// 解码过程外, 每次操作结束后 256 <= range <= 510 且 offset < range.
pub struct CabacDecoder<'a> {
    reader: BitReader<'a>,
    range: u32,
    offset: u32,
}

impl<'a> CabacDecoder<'a> {
    /// 在片段数据区域上初始化解码器
    ///
    /// 消费 1 个对齐位后对齐到字节边界, 再读入 9 位作为初始 offset.
    /// 对齐位非零说明上层切片有误, 记录告警但继续解码.
    pub fn new(data: &'a [u8]) -> ShangResult<Self> {
        let mut reader = BitReader::new(data);

        let align_bit = reader.read_bit()?;
        if align_bit != 0 {
            warn!("CABAC 初始化: 对齐位非零, 片段数据起点可能有误");
        }
        reader.align_to_byte();

        let mut decoder = Self {
            reader,
            range: 0,
            offset: 0,
        };
        decoder.load_registers()?;
        Ok(decoder)
    }

    fn load_registers(&mut self) -> ShangResult<()> {
        self.range = 510;
        self.offset = self.reader.read_bits(9)?;

        if self.offset >= self.range {
            return Err(ShangError::InvalidData(format!(
                "CABAC 初始 offset {} 超出 range {}",
                self.offset, self.range,
            )));
        }
        Ok(())
    }

    /// 在子流边界重新初始化
    ///
    /// 对齐到字节边界并重新装载寄存器, 用于瓦片边界和单线程
    /// 波前行首的轻量重对齐. 上下文状态不受影响.
    pub fn reinit(&mut self) -> ShangResult<()> {
        self.reader.align_to_byte();
        self.load_registers()
    }

    /// 解码一个常规 bin, 并更新上下文概率状态
    pub fn decode_bin(&mut self, ctx: &mut ProbabilityState) -> ShangResult<u32> {
        debug_assert!((256..=510).contains(&self.range));

        let state = ctx.state() as usize;
        let mps = u32::from(ctx.mps());
        let lps_range = u32::from(LPS_RANGE[state][((self.range >> 6) & 3) as usize]);

        self.range -= lps_range;

        let bin;
        if self.offset < self.range {
            // MPS 路径
            bin = mps;
            ctx.0 = (MPS_NEXT_STATE[state] << 1) | ctx.mps();
        } else {
            // LPS 路径: 状态 0 解出 LPS 时翻转 MPS
            bin = mps ^ 1;
            self.offset -= self.range;
            self.range = lps_range;
            let mps_next = if state == 0 { ctx.mps() ^ 1 } else { ctx.mps() };
            ctx.0 = (LPS_NEXT_STATE[state] << 1) | mps_next;
        }

        while self.range < 256 {
            self.range <<= 1;
            self.offset = (self.offset << 1) | self.reader.read_bit()?;
        }
        Ok(bin)
    }

    /// 解码一个旁路 bin (等概率, 不更新任何上下文)
    pub fn decode_bypass(&mut self) -> ShangResult<u32> {
        self.offset = (self.offset << 1) | self.reader.read_bit()?;

        if self.offset >= self.range {
            self.offset -= self.range;
            Ok(1)
        } else {
            Ok(0)
        }
    }

    /// 连续解码 N 个旁路 bin (最多 31 个), 返回 MSB 在前的组合值
    ///
    /// 与逐个调用 [`decode_bypass`](Self::decode_bypass) 的结果
    /// 和位消耗完全一致.
    pub fn decode_bypass_bits(&mut self, n: u32) -> ShangResult<u32> {
        debug_assert!(n <= MAX_PREFIX_BINS);

        let mut value = 0u32;
        for _ in 0..n {
            value = (value << 1) | self.decode_bypass()?;
        }
        Ok(value)
    }

    /// 解码一个旁路符号位, 应用于给定的幅值
    ///
    /// 符号位为 1 时返回负值.
    pub fn decode_bypass_sign(&mut self, magnitude: u32) -> ShangResult<i32> {
        let sign = self.decode_bypass()?;
        let value = magnitude as i32;
        Ok(if sign != 0 { -value } else { value })
    }

    /// 解码一个终止 bin
    ///
    /// 返回 1 表示到达终止点 (片段结束或 PCM 负载开始), 此时不做
    /// 重整化, 解码器停在终止状态; 返回 0 则照常重整化后继续.
    pub fn decode_terminate(&mut self) -> ShangResult<u32> {
        self.range -= 2;

        if self.offset >= self.range {
            Ok(1)
        } else {
            while self.range < 256 {
                self.range <<= 1;
                self.offset = (self.offset << 1) | self.reader.read_bit()?;
            }
            Ok(0)
        }
    }

    /// 当前 range 寄存器值
    pub fn range(&self) -> u32 {
        self.range
    }

    /// 当前 offset 寄存器值
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// 位源已消费的总位数
    pub fn bits_read(&self) -> usize {
        self.reader.bits_read()
    }

    /// 位源当前的字节位置
    pub fn byte_position(&self) -> usize {
        self.reader.byte_position()
    }
}
