//! 语法元素解码.
//!
//! 每个函数对应一个 CABAC 编码的语法元素, 按固定的二值化方式把
//! bin 序列还原为语法值. 上下文选择所需的邻块信息 (左/上块状态,
//! 深度等) 由调用方推导后以参数传入.
//!
//! 残差路径专用的元素 (末位显著系数、显著性图、级别标志等) 在
//! [`residual`](crate::residual) 模块内部.

use crate::cabac::{CabacDecoder, MAX_PREFIX_BINS};
use crate::common::{InterPredDir, Mvd, PartitionMode, SaoType};
use crate::context::{ctx_off, ContextBank};
use log::error;
use shang_core::{ShangError, ShangResult};

// ============ SAO ============

/// sao_merge_left_flag / sao_merge_up_flag
pub fn sao_merge_flag(
    dec: &mut CabacDecoder,
    ctxs: &mut ContextBank,
) -> ShangResult<bool> {
    Ok(dec.decode_bin(&mut ctxs[ctx_off::SAO_MERGE_FLAG])? != 0)
}

/// sao_type_idx_luma / sao_type_idx_chroma
pub fn sao_type_idx(
    dec: &mut CabacDecoder,
    ctxs: &mut ContextBank,
) -> ShangResult<SaoType> {
    if dec.decode_bin(&mut ctxs[ctx_off::SAO_TYPE_IDX])? == 0 {
        return Ok(SaoType::None);
    }
    if dec.decode_bypass()? == 0 {
        Ok(SaoType::Band)
    } else {
        Ok(SaoType::Edge)
    }
}

/// sao_band_position, 5 位旁路定长码
pub fn sao_band_position(dec: &mut CabacDecoder) -> ShangResult<u32> {
    dec.decode_bypass_bits(5)
}

/// sao_offset_abs, 截断一元码, 上限由位深决定
pub fn sao_offset_abs(dec: &mut CabacDecoder, bit_depth: u8) -> ShangResult<u32> {
    let length = (1u32 << (bit_depth.min(10) - 5)) - 1;
    let mut i = 0;
    while i < length && dec.decode_bypass()? != 0 {
        i += 1;
    }
    Ok(i)
}

/// sao_offset_sign
pub fn sao_offset_sign(dec: &mut CabacDecoder) -> ShangResult<u32> {
    dec.decode_bypass()
}

/// sao_eo_class, 2 位旁路定长码
pub fn sao_eo_class(dec: &mut CabacDecoder) -> ShangResult<u32> {
    dec.decode_bypass_bits(2)
}

// ============ 编码树与编码单元 ============

/// end_of_slice_segment_flag, 终止 bin
pub fn end_of_slice_flag(dec: &mut CabacDecoder) -> ShangResult<bool> {
    Ok(dec.decode_terminate()? != 0)
}

/// cu_transquant_bypass_flag
pub fn cu_transquant_bypass_flag(
    dec: &mut CabacDecoder,
    ctxs: &mut ContextBank,
) -> ShangResult<bool> {
    Ok(dec.decode_bin(&mut ctxs[ctx_off::CU_TRANSQUANT_BYPASS_FLAG])? != 0)
}

/// cu_skip_flag, 上下文由左/上邻块的 skip 状态决定
pub fn skip_flag(
    dec: &mut CabacDecoder,
    ctxs: &mut ContextBank,
    left_skipped: bool,
    above_skipped: bool,
) -> ShangResult<bool> {
    let inc = usize::from(left_skipped) + usize::from(above_skipped);
    Ok(dec.decode_bin(&mut ctxs[ctx_off::SKIP_FLAG + inc])? != 0)
}

/// split_cu_flag, 上下文由左/上邻块深度是否大于当前深度决定
pub fn split_coding_unit_flag(
    dec: &mut CabacDecoder,
    ctxs: &mut ContextBank,
    left_deeper: bool,
    above_deeper: bool,
) -> ShangResult<bool> {
    let inc = usize::from(left_deeper) + usize::from(above_deeper);
    Ok(dec.decode_bin(&mut ctxs[ctx_off::SPLIT_CODING_UNIT_FLAG + inc])? != 0)
}

/// cu_qp_delta_abs: 截断一元前缀 (上限 5) 接指数哥伦布旁路后缀
pub fn cu_qp_delta_abs(
    dec: &mut CabacDecoder,
    ctxs: &mut ContextBank,
) -> ShangResult<u32> {
    let mut prefix = 0u32;
    let mut inc = 0usize;

    while prefix < 5 && dec.decode_bin(&mut ctxs[ctx_off::CU_QP_DELTA + inc])? != 0 {
        prefix += 1;
        inc = 1;
    }
    if prefix < 5 {
        return Ok(prefix);
    }

    let mut suffix = 0u32;
    let mut k = 0u32;
    while k < MAX_PREFIX_BINS && dec.decode_bypass()? != 0 {
        suffix += 1 << k;
        k += 1;
    }
    if k == MAX_PREFIX_BINS {
        error!("cu_qp_delta_abs: {}", ShangError::UnaryOverflow { bins: k });
    }
    while k > 0 {
        k -= 1;
        suffix += dec.decode_bypass()? << k;
    }
    Ok(prefix + suffix)
}

/// cu_qp_delta_sign_flag
pub fn cu_qp_delta_sign_flag(dec: &mut CabacDecoder) -> ShangResult<u32> {
    dec.decode_bypass()
}

/// cu_chroma_qp_offset_flag
pub fn cu_chroma_qp_offset_flag(
    dec: &mut CabacDecoder,
    ctxs: &mut ContextBank,
) -> ShangResult<bool> {
    Ok(dec.decode_bin(&mut ctxs[ctx_off::CU_CHROMA_QP_OFFSET_FLAG])? != 0)
}

/// cu_chroma_qp_offset_idx, 截断一元码 (单上下文)
pub fn cu_chroma_qp_offset_idx(
    dec: &mut CabacDecoder,
    ctxs: &mut ContextBank,
    chroma_qp_offset_list_len: u32,
) -> ShangResult<u32> {
    let c_max = chroma_qp_offset_list_len.max(5);
    let mut i = 0;
    while i < c_max && dec.decode_bin(&mut ctxs[ctx_off::CU_CHROMA_QP_OFFSET_IDX])? != 0 {
        i += 1;
    }
    Ok(i)
}

/// pred_mode_flag, 真值表示帧内预测
pub fn pred_mode_flag(
    dec: &mut CabacDecoder,
    ctxs: &mut ContextBank,
) -> ShangResult<bool> {
    Ok(dec.decode_bin(&mut ctxs[ctx_off::PRED_MODE_FLAG])? != 0)
}

/// part_mode, 变长树码
///
/// 可用码字集合由块尺寸、预测模式与非对称划分开关共同决定.
pub fn part_mode(
    dec: &mut CabacDecoder,
    ctxs: &mut ContextBank,
    log2_cb_size: u8,
    log2_min_cb_size: u8,
    is_intra: bool,
    amp_enabled: bool,
) -> ShangResult<PartitionMode> {
    if dec.decode_bin(&mut ctxs[ctx_off::PART_MODE])? != 0 {
        return Ok(PartitionMode::Part2Nx2N);
    }

    if log2_cb_size == log2_min_cb_size {
        if is_intra {
            return Ok(PartitionMode::PartNxN);
        }
        if dec.decode_bin(&mut ctxs[ctx_off::PART_MODE + 1])? != 0 {
            return Ok(PartitionMode::Part2NxN);
        }
        if log2_cb_size == 3 {
            return Ok(PartitionMode::PartNx2N);
        }
        if dec.decode_bin(&mut ctxs[ctx_off::PART_MODE + 2])? != 0 {
            return Ok(PartitionMode::PartNx2N);
        }
        return Ok(PartitionMode::PartNxN);
    }

    if !amp_enabled {
        if dec.decode_bin(&mut ctxs[ctx_off::PART_MODE + 1])? != 0 {
            return Ok(PartitionMode::Part2NxN);
        }
        return Ok(PartitionMode::PartNx2N);
    }

    if dec.decode_bin(&mut ctxs[ctx_off::PART_MODE + 1])? != 0 {
        if dec.decode_bin(&mut ctxs[ctx_off::PART_MODE + 3])? != 0 {
            return Ok(PartitionMode::Part2NxN);
        }
        if dec.decode_bypass()? != 0 {
            return Ok(PartitionMode::Part2NxnD);
        }
        return Ok(PartitionMode::Part2NxnU);
    }

    if dec.decode_bin(&mut ctxs[ctx_off::PART_MODE + 3])? != 0 {
        return Ok(PartitionMode::PartNx2N);
    }
    if dec.decode_bypass()? != 0 {
        return Ok(PartitionMode::PartNRx2N);
    }
    Ok(PartitionMode::PartNLx2N)
}

/// pcm_flag, 终止 bin (其后紧跟对齐的 PCM 负载)
pub fn pcm_flag(dec: &mut CabacDecoder) -> ShangResult<bool> {
    Ok(dec.decode_terminate()? != 0)
}

// ============ 帧内预测模式 ============

/// prev_intra_luma_pred_flag
pub fn prev_intra_luma_pred_flag(
    dec: &mut CabacDecoder,
    ctxs: &mut ContextBank,
) -> ShangResult<bool> {
    Ok(dec.decode_bin(&mut ctxs[ctx_off::PREV_INTRA_LUMA_PRED_FLAG])? != 0)
}

/// mpm_idx, 截断一元码 (上限 2), 全旁路
pub fn mpm_idx(dec: &mut CabacDecoder) -> ShangResult<u32> {
    let mut i = 0;
    while i < 2 && dec.decode_bypass()? != 0 {
        i += 1;
    }
    Ok(i)
}

/// rem_intra_luma_pred_mode, 5 位旁路定长码
pub fn rem_intra_luma_pred_mode(dec: &mut CabacDecoder) -> ShangResult<u32> {
    dec.decode_bypass_bits(5)
}

/// intra_chroma_pred_mode: 0 bin 得 4 (DM), 否则 2 位旁路
pub fn intra_chroma_pred_mode(
    dec: &mut CabacDecoder,
    ctxs: &mut ContextBank,
) -> ShangResult<u32> {
    if dec.decode_bin(&mut ctxs[ctx_off::INTRA_CHROMA_PRED_MODE])? == 0 {
        return Ok(4);
    }
    dec.decode_bypass_bits(2)
}

// ============ 帧间预测 ============

/// merge_flag
pub fn merge_flag(
    dec: &mut CabacDecoder,
    ctxs: &mut ContextBank,
) -> ShangResult<bool> {
    Ok(dec.decode_bin(&mut ctxs[ctx_off::MERGE_FLAG])? != 0)
}

/// merge_idx: 首 bin 上下文编码, 其余截断一元旁路
pub fn merge_idx(
    dec: &mut CabacDecoder,
    ctxs: &mut ContextBank,
    max_num_merge_cand: u32,
) -> ShangResult<u32> {
    let mut i = dec.decode_bin(&mut ctxs[ctx_off::MERGE_IDX])?;
    if i != 0 {
        while i < max_num_merge_cand - 1 && dec.decode_bypass()? != 0 {
            i += 1;
        }
    }
    Ok(i)
}

/// inter_pred_idc
///
/// 8x4/4x8 预测块 (宽高和为 12) 不允许双向, 直接解单向选择位;
/// 其余块先按编码树深度选上下文解双向标志.
pub fn inter_pred_idc(
    dec: &mut CabacDecoder,
    ctxs: &mut ContextBank,
    pb_width: u32,
    pb_height: u32,
    ct_depth: usize,
) -> ShangResult<InterPredDir> {
    let uni = |bin: u32| if bin != 0 { InterPredDir::L1 } else { InterPredDir::L0 };

    if pb_width + pb_height == 12 {
        let bin = dec.decode_bin(&mut ctxs[ctx_off::INTER_PRED_IDC + 4])?;
        return Ok(uni(bin));
    }
    if dec.decode_bin(&mut ctxs[ctx_off::INTER_PRED_IDC + ct_depth])? != 0 {
        return Ok(InterPredDir::Bi);
    }
    let bin = dec.decode_bin(&mut ctxs[ctx_off::INTER_PRED_IDC + 4])?;
    Ok(uni(bin))
}

/// ref_idx_l0 / ref_idx_l1: 前两 bin 上下文编码, 其余旁路
pub fn ref_idx_lx(
    dec: &mut CabacDecoder,
    ctxs: &mut ContextBank,
    num_ref_idx: u32,
) -> ShangResult<u32> {
    let max = num_ref_idx - 1;
    let max_ctx = max.min(2);

    let mut i = 0;
    while i < max_ctx && dec.decode_bin(&mut ctxs[ctx_off::REF_IDX_L0 + i as usize])? != 0 {
        i += 1;
    }
    if i == 2 {
        while i < max && dec.decode_bypass()? != 0 {
            i += 1;
        }
    }
    Ok(i)
}

/// mvp_l0_flag / mvp_l1_flag
pub fn mvp_lx_flag(
    dec: &mut CabacDecoder,
    ctxs: &mut ContextBank,
) -> ShangResult<bool> {
    Ok(dec.decode_bin(&mut ctxs[ctx_off::MVP_LX_FLAG])? != 0)
}

/// rqt_root_cbf (是否存在残差数据)
pub fn no_residual_data_flag(
    dec: &mut CabacDecoder,
    ctxs: &mut ContextBank,
) -> ShangResult<bool> {
    Ok(dec.decode_bin(&mut ctxs[ctx_off::NO_RESIDUAL_DATA_FLAG])? != 0)
}

// 大于 1 部分的指数哥伦布旁路码, 初值 2 起步
fn mvd_tail(dec: &mut CabacDecoder) -> ShangResult<i32> {
    let mut ret = 2u32;
    let mut k = 1u32;

    while k < MAX_PREFIX_BINS && dec.decode_bypass()? != 0 {
        ret += 1 << k;
        k += 1;
    }
    if k == MAX_PREFIX_BINS {
        error!("mvd: {}", ShangError::UnaryOverflow { bins: k });
        return Ok(0);
    }
    while k > 0 {
        k -= 1;
        ret += dec.decode_bypass()? << k;
    }
    dec.decode_bypass_sign(ret)
}

/// mvd_coding: 解码一个运动矢量差的两个分量
///
/// 两个大于 0 标志在前, 大于 1 标志在后, 随后各自的幅值与符号.
pub fn mvd_coding(
    dec: &mut CabacDecoder,
    ctxs: &mut ContextBank,
) -> ShangResult<Mvd> {
    let x_gt0 = dec.decode_bin(&mut ctxs[ctx_off::ABS_MVD_GREATER0_FLAG])? != 0;
    let y_gt0 = dec.decode_bin(&mut ctxs[ctx_off::ABS_MVD_GREATER0_FLAG])? != 0;

    let x_gt1 = x_gt0 && dec.decode_bin(&mut ctxs[ctx_off::ABS_MVD_GREATER1_FLAG + 1])? != 0;
    let y_gt1 = y_gt0 && dec.decode_bin(&mut ctxs[ctx_off::ABS_MVD_GREATER1_FLAG + 1])? != 0;

    let mut mvd = Mvd::default();
    if x_gt0 {
        mvd.x = if x_gt1 {
            mvd_tail(dec)?
        } else {
            dec.decode_bypass_sign(1)?
        };
    }
    if y_gt0 {
        mvd.y = if y_gt1 {
            mvd_tail(dec)?
        } else {
            dec.decode_bypass_sign(1)?
        };
    }
    Ok(mvd)
}

// ============ 变换树 ============

/// split_transform_flag, 上下文按块尺寸选择
pub fn split_transform_flag(
    dec: &mut CabacDecoder,
    ctxs: &mut ContextBank,
    log2_trafo_size: u8,
) -> ShangResult<bool> {
    let inc = 5 - log2_trafo_size as usize;
    Ok(dec.decode_bin(&mut ctxs[ctx_off::SPLIT_TRANSFORM_FLAG + inc])? != 0)
}

/// cbf_cb / cbf_cr, 上下文按变换树深度选择
pub fn cbf_cb_cr(
    dec: &mut CabacDecoder,
    ctxs: &mut ContextBank,
    trafo_depth: usize,
) -> ShangResult<bool> {
    Ok(dec.decode_bin(&mut ctxs[ctx_off::CBF_CB_CR + trafo_depth])? != 0)
}

/// cbf_luma, 深度 0 与其余深度各用一个上下文
pub fn cbf_luma(
    dec: &mut CabacDecoder,
    ctxs: &mut ContextBank,
    trafo_depth: usize,
) -> ShangResult<bool> {
    let inc = usize::from(trafo_depth == 0);
    Ok(dec.decode_bin(&mut ctxs[ctx_off::CBF_LUMA + inc])? != 0)
}

/// transform_skip_flag, 亮度与色度各用一个上下文
pub fn transform_skip_flag(
    dec: &mut CabacDecoder,
    ctxs: &mut ContextBank,
    c_idx: usize,
) -> ShangResult<bool> {
    let inc = usize::from(c_idx > 0);
    Ok(dec.decode_bin(&mut ctxs[ctx_off::TRANSFORM_SKIP_FLAG + inc])? != 0)
}

/// explicit_rdpcm_flag
pub fn explicit_rdpcm_flag(
    dec: &mut CabacDecoder,
    ctxs: &mut ContextBank,
    c_idx: usize,
) -> ShangResult<bool> {
    let inc = usize::from(c_idx > 0);
    Ok(dec.decode_bin(&mut ctxs[ctx_off::EXPLICIT_RDPCM_FLAG + inc])? != 0)
}

/// explicit_rdpcm_dir_flag, 真值表示垂直方向
pub fn explicit_rdpcm_dir_flag(
    dec: &mut CabacDecoder,
    ctxs: &mut ContextBank,
    c_idx: usize,
) -> ShangResult<bool> {
    let inc = usize::from(c_idx > 0);
    Ok(dec.decode_bin(&mut ctxs[ctx_off::EXPLICIT_RDPCM_DIR_FLAG + inc])? != 0)
}

// ============ 跨分量预测 ============

/// log2_res_scale_abs_plus1, 截断一元码 (上限 4)
pub fn log2_res_scale_abs(
    dec: &mut CabacDecoder,
    ctxs: &mut ContextBank,
    idx: usize,
) -> ShangResult<u32> {
    let mut i = 0usize;
    while i < 4 && dec.decode_bin(&mut ctxs[ctx_off::LOG2_RES_SCALE_ABS + 4 * idx + i])? != 0 {
        i += 1;
    }
    Ok(i as u32)
}

/// res_scale_sign_flag
pub fn res_scale_sign_flag(
    dec: &mut CabacDecoder,
    ctxs: &mut ContextBank,
    idx: usize,
) -> ShangResult<bool> {
    Ok(dec.decode_bin(&mut ctxs[ctx_off::RES_SCALE_SIGN_FLAG + idx])? != 0)
}
