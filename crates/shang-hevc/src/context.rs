//! 上下文状态库.
//!
//! 维护一个片段内全部 178 个概率上下文, 提供按片类型与量化参数
//! 的初始化, 以及波前并行所需的快照/恢复能力.
//!
//! 每个语法元素在状态数组中占据一段连续区间, 起始下标见
//! [`ctx_off`] 常量表. 下标越界属于编程错误, 直接 panic 而不是
//! 返回错误.

use crate::cabac::ProbabilityState;
use crate::common::SliceType;
use std::ops::{Index, IndexMut};

/// 上下文总数
pub const NUM_CONTEXTS: usize = 178;

/// 各语法元素在上下文数组中的起始偏移
pub mod ctx_off {
    pub const SAO_MERGE_FLAG: usize = 0;
    pub const SAO_TYPE_IDX: usize = 1;
    pub const SPLIT_CODING_UNIT_FLAG: usize = 2;
    pub const CU_TRANSQUANT_BYPASS_FLAG: usize = 5;
    pub const SKIP_FLAG: usize = 6;
    pub const CU_QP_DELTA: usize = 9;
    pub const PRED_MODE_FLAG: usize = 12;
    pub const PART_MODE: usize = 13;
    pub const PREV_INTRA_LUMA_PRED_FLAG: usize = 17;
    pub const INTRA_CHROMA_PRED_MODE: usize = 18;
    pub const MERGE_FLAG: usize = 20;
    pub const MERGE_IDX: usize = 21;
    pub const INTER_PRED_IDC: usize = 22;
    pub const REF_IDX_L0: usize = 27;
    pub const REF_IDX_L1: usize = 29;
    pub const ABS_MVD_GREATER0_FLAG: usize = 31;
    pub const ABS_MVD_GREATER1_FLAG: usize = 33;
    pub const MVP_LX_FLAG: usize = 35;
    pub const NO_RESIDUAL_DATA_FLAG: usize = 36;
    pub const SPLIT_TRANSFORM_FLAG: usize = 37;
    pub const CBF_LUMA: usize = 40;
    pub const CBF_CB_CR: usize = 42;
    pub const TRANSFORM_SKIP_FLAG: usize = 46;
    pub const EXPLICIT_RDPCM_FLAG: usize = 48;
    pub const EXPLICIT_RDPCM_DIR_FLAG: usize = 50;
    pub const LAST_SIGNIFICANT_COEFF_X_PREFIX: usize = 52;
    pub const LAST_SIGNIFICANT_COEFF_Y_PREFIX: usize = 70;
    pub const SIGNIFICANT_COEFF_GROUP_FLAG: usize = 88;
    pub const SIGNIFICANT_COEFF_FLAG: usize = 92;
    pub const COEFF_ABS_LEVEL_GREATER1_FLAG: usize = 136;
    pub const COEFF_ABS_LEVEL_GREATER2_FLAG: usize = 160;
    pub const LOG2_RES_SCALE_ABS: usize = 166;
    pub const RES_SCALE_SIGN_FLAG: usize = 174;
    pub const CU_CHROMA_QP_OFFSET_FLAG: usize = 176;
    pub const CU_CHROMA_QP_OFFSET_IDX: usize = 177;
}

// 三行初始化值: 行 0 供 I 片, 行 1 供 P 片, 行 2 供 B 片
// (cabac_init_flag 置位时 B/P 互换)
pub(crate) const INIT_VALUES: [[u8; NUM_CONTEXTS]; 3] = [
    [
        153, 200, 139, 141, 157, 154, 154, 154, 154, 154, 154, 154, 154, 184,
        154, 154, 154, 184, 63, 139, 154, 154, 154, 154, 154, 154, 154, 154,
        154, 154, 154, 154, 154, 154, 154, 154, 154, 153, 138, 138, 111, 141,
        94, 138, 182, 154, 139, 139, 139, 139, 139, 139, 110, 110, 124, 125,
        140, 153, 125, 127, 140, 109, 111, 143, 127, 111, 79, 108, 123, 63,
        110, 110, 124, 125, 140, 153, 125, 127, 140, 109, 111, 143, 127, 111,
        79, 108, 123, 63, 91, 171, 134, 141, 111, 111, 125, 110, 110, 94,
        124, 108, 124, 107, 125, 141, 179, 153, 125, 107, 125, 141, 179, 153,
        125, 107, 125, 141, 179, 153, 125, 140, 139, 182, 182, 152, 136, 152,
        136, 153, 136, 139, 111, 136, 139, 111, 141, 111, 140, 92, 137, 138,
        140, 152, 138, 139, 153, 74, 149, 92, 139, 107, 122, 152, 140, 179,
        166, 182, 140, 227, 122, 197, 138, 153, 136, 167, 152, 152, 154, 154,
        154, 154, 154, 154, 154, 154, 154, 154, 154, 154,
    ],
    [
        153, 185, 107, 139, 126, 154, 197, 185, 201, 154, 154, 154, 149, 154,
        139, 154, 154, 154, 152, 139, 110, 122, 95, 79, 63, 31, 31, 153,
        153, 153, 153, 140, 198, 140, 198, 168, 79, 124, 138, 94, 153, 111,
        149, 107, 167, 154, 139, 139, 139, 139, 139, 139, 125, 110, 94, 110,
        95, 79, 125, 111, 110, 78, 110, 111, 111, 95, 94, 108, 123, 108,
        125, 110, 94, 110, 95, 79, 125, 111, 110, 78, 110, 111, 111, 95,
        94, 108, 123, 108, 121, 140, 61, 154, 155, 154, 139, 153, 139, 123,
        123, 63, 153, 166, 183, 140, 136, 153, 154, 166, 183, 140, 136, 153,
        154, 166, 183, 140, 136, 153, 154, 170, 153, 123, 123, 107, 121, 107,
        121, 167, 151, 183, 140, 151, 183, 140, 140, 140, 154, 196, 196, 167,
        154, 152, 167, 182, 182, 134, 149, 136, 153, 121, 136, 137, 169, 194,
        166, 167, 154, 167, 137, 182, 107, 167, 91, 122, 107, 167, 154, 154,
        154, 154, 154, 154, 154, 154, 154, 154, 154, 154,
    ],
    [
        153, 160, 107, 139, 126, 154, 197, 185, 201, 154, 154, 154, 134, 154,
        139, 154, 154, 183, 152, 139, 154, 137, 95, 79, 63, 31, 31, 153,
        153, 153, 153, 169, 198, 169, 198, 168, 79, 224, 167, 122, 153, 111,
        149, 92, 167, 154, 139, 139, 139, 139, 139, 139, 125, 110, 124, 110,
        95, 94, 125, 111, 111, 79, 125, 126, 111, 111, 79, 108, 123, 93,
        125, 110, 124, 110, 95, 94, 125, 111, 111, 79, 125, 126, 111, 111,
        79, 108, 123, 93, 121, 140, 61, 154, 170, 154, 139, 153, 139, 123,
        123, 63, 124, 166, 183, 140, 136, 153, 154, 166, 183, 140, 136, 153,
        154, 166, 183, 140, 136, 153, 154, 170, 153, 138, 138, 122, 121, 122,
        121, 167, 151, 183, 140, 151, 183, 140, 140, 140, 154, 196, 167, 167,
        154, 152, 167, 182, 182, 134, 149, 136, 153, 121, 136, 122, 169, 208,
        166, 167, 154, 152, 167, 182, 107, 167, 91, 107, 107, 167, 154, 154,
        154, 154, 154, 154, 154, 154, 154, 154, 154, 154,
    ],
];

/// 上下文状态库快照, 供波前同步点保存/恢复
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextSnapshot {
    states: [ProbabilityState; NUM_CONTEXTS],
}

/// 一个片段的全部概率上下文
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextBank {
    states: [ProbabilityState; NUM_CONTEXTS],
}

impl ContextBank {
    /// 创建并按片类型与量化参数初始化
    pub fn new(slice_type: SliceType, cabac_init_flag: bool, qp: i32) -> Self {
        let mut bank = Self {
            states: [ProbabilityState::default(); NUM_CONTEXTS],
        };
        bank.init(slice_type, cabac_init_flag, qp);
        bank
    }

    /// 重新初始化全部上下文
    ///
    /// 初始化行由片类型选出 (I=0, P=1, B=2), cabac_init_flag 置位且
    /// 非 I 片时 B/P 行互换.
    pub fn init(&mut self, slice_type: SliceType, cabac_init_flag: bool, qp: i32) {
        let mut init_type = 2 - slice_type as i32;
        if cabac_init_flag && init_type != 0 {
            init_type ^= 3;
        }

        let row = &INIT_VALUES[init_type as usize];
        for (state, &iv) in self.states.iter_mut().zip(row.iter()) {
            *state = ProbabilityState::from_init_value(iv, qp);
        }
    }

    /// 保存当前全部状态
    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            states: self.states,
        }
    }

    /// 从快照恢复全部状态
    pub fn restore(&mut self, snapshot: &ContextSnapshot) {
        self.states = snapshot.states;
    }
}

impl Index<usize> for ContextBank {
    type Output = ProbabilityState;

    fn index(&self, idx: usize) -> &ProbabilityState {
        &self.states[idx]
    }
}

impl IndexMut<usize> for ContextBank {
    fn index_mut(&mut self, idx: usize) -> &mut ProbabilityState {
        &mut self.states[idx]
    }
}
