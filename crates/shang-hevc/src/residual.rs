//! 残差系数解码.
//!
//! 一个变换块的完整残差语法: 末位显著系数定位、按 4x4 系数组
//! 反向扫描的显著性图、级别标志 (大于 1 / 大于 2)、符号位与
//! Rice 编码的剩余级别, 以及符号位隐藏、反量化、RDPCM 与
//! 变换跳过旋转的后处理.
//!
//! 每个系数组内最多 8 个大于 1 标志; 组内符号位在剩余级别之前
//! 解码. 级别解码的上下文集合由组位置与前一组是否出现大级别
//! 联合选择.

use crate::cabac::{CabacDecoder, MAX_PREFIX_BINS};
use crate::common::{CoeffBuffer, ScanType, SequenceParams, SliceParams};
use crate::context::{ctx_off, ContextBank};
use crate::scan;
use crate::session::EntropySession;
use crate::syntax;
use log::error;
use shang_core::{ShangError, ShangResult};

// ============ 反量化常量 ============

const LEVEL_SCALE: [u32; 6] = [40, 45, 51, 57, 64, 72];

const REM6: [u8; 76] = [
    0, 1, 2, 3, 4, 5, 0, 1, 2, 3, 4, 5, 0, 1, 2, 3, 4, 5, 0, 1, 2,
    3, 4, 5, 0, 1, 2, 3, 4, 5, 0, 1, 2, 3, 4, 5, 0, 1, 2, 3, 4, 5,
    0, 1, 2, 3, 4, 5, 0, 1, 2, 3, 4, 5, 0, 1, 2, 3, 4, 5, 0, 1, 2,
    3, 4, 5, 0, 1, 2, 3, 4, 5, 0, 1, 2, 3,
];

const DIV6: [u8; 76] = [
    0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 1, 1, 2, 2, 2, 2, 2, 2, 3, 3, 3,
    3, 3, 3, 4, 4, 4, 4, 4, 4, 5, 5, 5, 5, 5, 5, 6, 6, 6, 6, 6, 6,
    7, 7, 7, 7, 7, 7, 8, 8, 8, 8, 8, 8, 9, 9, 9, 9, 9, 9, 10, 10, 10,
    10, 10, 10, 11, 11, 11, 11, 11, 11, 12, 12, 12, 12,
];

// 4:2:0 色度量化参数映射 (qp_i 30-43)
const QP_C: [i32; 14] = [29, 30, 31, 32, 33, 33, 34, 34, 35, 35, 36, 36, 37, 37];

const FLAT_SCALE: [u8; 64] = [16; 64];
const UNIT_SCALE: [u8; 64] = [1; 64];

// ============ 显著性图上下文映射 ============

// 4x4 块的映射, 按组内扫描序号索引, 三种扫描各一张
const SIG_CTX_MAP_4X4: [[u8; 16]; 3] = [
    // 对角
    [0, 2, 1, 6, 3, 4, 7, 6, 4, 5, 7, 8, 5, 8, 8, 8],
    // 水平
    [0, 1, 4, 5, 2, 3, 4, 5, 6, 6, 8, 8, 7, 7, 8, 8],
    // 垂直
    [0, 2, 6, 7, 1, 3, 6, 7, 4, 4, 8, 8, 5, 5, 8, 8],
];

// 8x8 及以上的映射, 按 [扫描][右/下邻组显著性模式][组内扫描序号] 索引
const SIG_CTX_MAPS: [[[u8; 16]; 4]; 3] = [
    [
        [1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
        [2, 1, 2, 0, 1, 2, 0, 0, 1, 2, 0, 0, 1, 0, 0, 0],
        [2, 2, 1, 2, 1, 0, 2, 1, 0, 0, 1, 0, 0, 0, 0, 0],
        [2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2],
    ],
    [
        [1, 1, 1, 0, 1, 1, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0],
        [2, 2, 2, 2, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0],
        [2, 1, 0, 0, 2, 1, 0, 0, 2, 1, 0, 0, 2, 1, 0, 0],
        [2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2],
    ],
    [
        [1, 1, 1, 0, 1, 1, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0],
        [2, 1, 0, 0, 2, 1, 0, 0, 2, 1, 0, 0, 2, 1, 0, 0],
        [2, 2, 2, 2, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0],
        [2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2],
    ],
];

// ============ 输入与输出 ============

/// 一个变换块的残差解码输入
#[derive(Debug, Clone)]
pub struct TransformUnit {
    /// 块对数尺寸 (2-5)
    pub log2_size: u8,
    /// 分量索引 (0 亮度, 1 Cb, 2 Cr)
    pub c_idx: usize,
    /// 扫描次序
    pub scan: ScanType,
    /// 当前亮度量化参数
    pub qp_y: i32,
    /// 所在编码单元是帧内预测
    pub is_intra: bool,
    /// 当前分量的帧内预测模式 (0-34)
    pub intra_pred_mode: u8,
    /// 变换量化旁路
    pub transquant_bypass: bool,
    /// 编码单元级 Cb 量化偏移
    pub cu_qp_offset_cb: i32,
    /// 编码单元级 Cr 量化偏移
    pub cu_qp_offset_cr: i32,
}

impl Default for TransformUnit {
    fn default() -> Self {
        Self {
            log2_size: 2,
            c_idx: 0,
            scan: ScanType::Diagonal,
            qp_y: 26,
            is_intra: true,
            intra_pred_mode: 0,
            transquant_bypass: false,
            cu_qp_offset_cb: 0,
            cu_qp_offset_cr: 0,
        }
    }
}

/// 残差解码输出: 反量化后的系数与末位显著系数位置
#[derive(Debug, Clone)]
pub struct DecodedBlock {
    /// 反量化 (或旁路透传) 后的系数
    pub coeffs: CoeffBuffer,
    /// 末位显著系数横坐标
    pub last_x: u8,
    /// 末位显著系数纵坐标
    pub last_y: u8,
}

// ============ 内部工具 ============

// 反量化并饱和到 16 位
fn trans_scale_sat(level: i32, scale: u32, scale_m: u8, shift: u32) -> i16 {
    let product = i64::from(level) * i64::from(scale) * i64::from(scale_m);
    let value = ((product >> shift) + 1) >> 1;
    value.clamp(i64::from(i16::MIN), i64::from(i16::MAX)) as i16
}

// Rice 统计更新, 只在每组第一个剩余级别后调用
fn update_rice(stat_coeff: &mut u8, remaining: u32, c_rice_param: u32) {
    let x = remaining >> c_rice_param;
    if x >= 3 {
        *stat_coeff = stat_coeff.saturating_add(1);
    } else if x == 0 && *stat_coeff > 0 {
        *stat_coeff -= 1;
    }
}

// coeff_abs_level_remaining: 一元前缀 + Rice/指数哥伦布后缀, 全旁路
fn coeff_abs_level_remaining(
    dec: &mut CabacDecoder,
    rice_param: u32,
) -> ShangResult<u32> {
    let mut prefix = 0u32;
    while prefix < MAX_PREFIX_BINS && dec.decode_bypass()? != 0 {
        prefix += 1;
    }
    if prefix == MAX_PREFIX_BINS {
        error!(
            "coeff_abs_level_remaining: {}",
            ShangError::UnaryOverflow { bins: prefix },
        );
        return Ok(0);
    }

    if prefix < 3 {
        let suffix = dec.decode_bypass_bits(rice_param)?;
        Ok((prefix << rice_param) + suffix)
    } else {
        let len = prefix - 3 + rice_param;
        if len > MAX_PREFIX_BINS {
            error!("coeff_abs_level_remaining: 后缀长度 {} 超出上限", len);
            return Ok(0);
        }
        let suffix = dec.decode_bypass_bits(len)?;
        Ok((((1 << (prefix - 3)) + 2) << rice_param) + suffix)
    }
}

// 末位显著系数坐标的截断一元前缀
fn last_sig_coeff_prefix(
    dec: &mut CabacDecoder,
    ctxs: &mut ContextBank,
    elem: usize,
    c_idx: usize,
    log2_size: usize,
) -> ShangResult<usize> {
    let max = (log2_size << 1) - 1;
    let (ctx_offset, ctx_shift) = if c_idx == 0 {
        (3 * (log2_size - 2) + ((log2_size - 1) >> 2), (log2_size + 1) >> 2)
    } else {
        (15, log2_size - 2)
    };

    let mut i = 0;
    while i < max && dec.decode_bin(&mut ctxs[elem + (i >> ctx_shift) + ctx_offset])? != 0 {
        i += 1;
    }
    Ok(i)
}

// 前缀大于 3 时的旁路后缀, 还原完整坐标
fn last_sig_coeff_value(
    dec: &mut CabacDecoder,
    prefix: usize,
) -> ShangResult<usize> {
    if prefix <= 3 {
        return Ok(prefix);
    }
    let length = (prefix >> 1) - 1;
    let suffix = dec.decode_bypass_bits(length as u32)? as usize;
    Ok((1 << length) * (2 + (prefix & 1)) + suffix)
}

// RDPCM: 沿预测方向做累加和
fn apply_rdpcm(coeffs: &mut CoeffBuffer, vertical: bool) {
    let size = coeffs.size();
    if vertical {
        for y in 1..size {
            for x in 0..size {
                let sum = coeffs.get(x, y).wrapping_add(coeffs.get(x, y - 1));
                coeffs.set(x, y, sum);
            }
        }
    } else {
        for y in 0..size {
            for x in 1..size {
                let sum = coeffs.get(x, y).wrapping_add(coeffs.get(x - 1, y));
                coeffs.set(x, y, sum);
            }
        }
    }
}

// 反量化参数: 缩放因子、右移位数、缩放矩阵与 DC 缩放
struct DequantParams<'a> {
    scale: u32,
    shift: u32,
    scale_matrix: &'a [u8],
    dc_scale: u8,
}

fn derive_dequant_params<'a>(
    seq: &'a SequenceParams,
    slice: &SliceParams,
    tu: &TransformUnit,
    trans_skip_or_bypass: bool,
) -> DequantParams<'a> {
    let qp_bd_offset = 6 * (i32::from(seq.bit_depth) - 8);

    let qp = if tu.c_idx == 0 {
        tu.qp_y + qp_bd_offset
    } else {
        let offset = if tu.c_idx == 1 {
            seq.cb_qp_offset + slice.slice_cb_qp_offset + tu.cu_qp_offset_cb
        } else {
            seq.cr_qp_offset + slice.slice_cr_qp_offset + tu.cu_qp_offset_cr
        };

        let qp_i = (tu.qp_y + offset).clamp(-qp_bd_offset, 57);
        let qp_c = if seq.chroma_format_idc == 1 {
            if qp_i < 30 {
                qp_i
            } else if qp_i > 43 {
                qp_i - 6
            } else {
                QP_C[(qp_i - 30) as usize]
            }
        } else {
            qp_i.min(51)
        };
        qp_c + qp_bd_offset
    };

    let qp = qp.clamp(0, 75) as usize;
    let mut shift = u32::from(seq.bit_depth) + u32::from(tu.log2_size) - 6;
    let mut scale = LEVEL_SCALE[REM6[qp] as usize];
    let div = u32::from(DIV6[qp]);
    // 把量化步长中的整六倍部分折进移位, 避免运行期双重移位
    if div >= shift {
        scale <<= div - shift;
        shift = 0;
    } else {
        shift -= div;
    }

    let (scale_matrix, dc_scale): (&[u8], u8) = match &seq.scaling_list {
        Some(sl) if !(trans_skip_or_bypass && tu.log2_size > 2) => {
            let matrix_id = 3 * usize::from(!tu.is_intra) + tu.c_idx;
            let matrix = &sl.sl[tu.log2_size as usize - 2][matrix_id];
            let dc = if tu.log2_size >= 4 {
                sl.sl_dc[tu.log2_size as usize - 4][matrix_id]
            } else {
                matrix[0]
            };
            (&matrix[..], dc)
        }
        _ => (&FLAT_SCALE[..], 16),
    };

    DequantParams {
        scale,
        shift,
        scale_matrix,
        dc_scale,
    }
}

// ============ 主解码流程 ============

/// 解码一个变换块的全部残差语法并反量化
pub fn decode_residual(
    session: &mut EntropySession,
    seq: &SequenceParams,
    slice: &SliceParams,
    tu: &TransformUnit,
) -> ShangResult<DecodedBlock> {
    if tu.c_idx > 2 {
        return Err(ShangError::InvalidArgument(format!(
            "无效的分量索引: {}",
            tu.c_idx,
        )));
    }
    let log2_size = tu.log2_size as usize;
    let mut coeffs = CoeffBuffer::new(tu.log2_size)?;

    let mut trans_skip_or_bypass = tu.transquant_bypass;
    let mut transform_skip = false;

    // 变换跳过标志与反量化参数只在非旁路下出现
    let dq = if !tu.transquant_bypass {
        if seq.transform_skip_enabled && tu.log2_size <= seq.log2_max_transform_skip_size {
            transform_skip =
                syntax::transform_skip_flag(&mut session.cabac, &mut session.contexts, tu.c_idx)?;
            if transform_skip {
                trans_skip_or_bypass = true;
            }
        }
        derive_dequant_params(seq, slice, tu, trans_skip_or_bypass)
    } else {
        DequantParams {
            scale: 2,
            shift: 0,
            scale_matrix: &UNIT_SCALE[..],
            dc_scale: 1,
        }
    };

    let mut explicit_rdpcm = false;
    let mut explicit_rdpcm_dir = false;
    if !tu.is_intra && seq.explicit_rdpcm_enabled && trans_skip_or_bypass {
        explicit_rdpcm =
            syntax::explicit_rdpcm_flag(&mut session.cabac, &mut session.contexts, tu.c_idx)?;
        if explicit_rdpcm {
            explicit_rdpcm_dir = syntax::explicit_rdpcm_dir_flag(
                &mut session.cabac,
                &mut session.contexts,
                tu.c_idx,
            )?;
        }
    }

    // 末位显著系数坐标
    let prefix_x = last_sig_coeff_prefix(
        &mut session.cabac,
        &mut session.contexts,
        ctx_off::LAST_SIGNIFICANT_COEFF_X_PREFIX,
        tu.c_idx,
        log2_size,
    )?;
    let prefix_y = last_sig_coeff_prefix(
        &mut session.cabac,
        &mut session.contexts,
        ctx_off::LAST_SIGNIFICANT_COEFF_Y_PREFIX,
        tu.c_idx,
        log2_size,
    )?;
    let mut last_x = last_sig_coeff_value(&mut session.cabac, prefix_x)?;
    let mut last_y = last_sig_coeff_value(&mut session.cabac, prefix_y)?;

    // 垂直扫描下两个坐标的语法含义互换
    if tu.scan == ScanType::Vertical {
        std::mem::swap(&mut last_x, &mut last_y);
    }

    let tables = scan::scan_tables(tu.scan, tu.log2_size)?;
    let num_coeff = scan::scan_rank(tu.scan, tu.log2_size, last_x as u8, last_y as u8)? + 1;
    let num_last_subset = (num_coeff - 1) >> 4;

    let mut sig_cg = [[false; 8]; 8];
    let mut prev_subset_coded = false;

    for i in (0..=num_last_subset).rev() {
        let offset = i << 4;
        let x_cg = tables.x_cg[i] as usize;
        let y_cg = tables.y_cg[i] as usize;
        let cg_bound = (1usize << (log2_size - 2)) - 1;

        let mut implicit_non_zero_coeff = false;

        if i < num_last_subset && i > 0 {
            let mut ctx_cg = 0usize;
            if x_cg < cg_bound {
                ctx_cg += usize::from(sig_cg[x_cg + 1][y_cg]);
            }
            if y_cg < cg_bound {
                ctx_cg += usize::from(sig_cg[x_cg][y_cg + 1]);
            }

            let inc = ctx_cg.min(1) + if tu.c_idx > 0 { 2 } else { 0 };
            sig_cg[x_cg][y_cg] = session.cabac.decode_bin(
                &mut session.contexts[ctx_off::SIGNIFICANT_COEFF_GROUP_FLAG + inc],
            )? != 0;
            implicit_non_zero_coeff = true;
        } else {
            // 首组与末位所在组总是显著
            sig_cg[x_cg][y_cg] = true;
        }

        let last_scan_pos = num_coeff - offset - 1;

        let mut sig_idx = [0u8; 16];
        let mut n_sig = 0usize;
        let scan_end: i32;
        if i == num_last_subset {
            sig_idx[0] = last_scan_pos as u8;
            n_sig = 1;
            scan_end = last_scan_pos as i32 - 1;
        } else {
            scan_end = 15;
        }

        let mut prev_sig = 0usize;
        if x_cg < cg_bound {
            prev_sig = usize::from(sig_cg[x_cg + 1][y_cg]);
        }
        if y_cg < cg_bound {
            prev_sig += usize::from(sig_cg[x_cg][y_cg + 1]) << 1;
        }

        if sig_cg[x_cg][y_cg] && scan_end >= 0 {
            // 上下文映射与基准偏移选择
            let ts_ctx = seq.transform_skip_context_enabled && trans_skip_or_bypass;
            let mut scf_offset = 0usize;
            let ctx_map: &[u8; 16] = if ts_ctx {
                scf_offset = if tu.c_idx == 0 { 40 } else { 14 + 27 };
                &SIG_CTX_MAPS[0][3]
            } else {
                if tu.c_idx != 0 {
                    scf_offset = 27;
                }
                if log2_size == 2 {
                    &SIG_CTX_MAP_4X4[tu.scan as usize]
                } else {
                    if tu.c_idx == 0 {
                        if x_cg > 0 || y_cg > 0 {
                            scf_offset += 3;
                        }
                        if log2_size == 3 {
                            scf_offset += if tu.scan == ScanType::Diagonal { 9 } else { 15 };
                        } else {
                            scf_offset += 21;
                        }
                    } else if log2_size == 3 {
                        scf_offset += 9;
                    } else {
                        scf_offset += 12;
                    }
                    &SIG_CTX_MAPS[tu.scan as usize][prev_sig]
                }
            };

            if scan_end > 0 {
                let base = ctx_off::SIGNIFICANT_COEFF_FLAG + scf_offset;
                let mut cnt = 0usize;
                let mut n = scan_end as usize;
                while n != 0 {
                    if session
                        .cabac
                        .decode_bin(&mut session.contexts[base + ctx_map[n] as usize])?
                        != 0
                    {
                        sig_idx[n_sig + cnt] = n as u8;
                        cnt += 1;
                    }
                    n -= 1;
                }
                n_sig += cnt;
                if cnt != 0 {
                    implicit_non_zero_coeff = false;
                }
            }

            // 组内 0 号位: 组标志显式解码且组内其余全零时隐含显著
            if !implicit_non_zero_coeff {
                let dc_offset = if ts_ctx {
                    if tu.c_idx == 0 { 42 } else { 16 + 27 }
                } else if i == 0 {
                    if tu.c_idx == 0 { 0 } else { 27 }
                } else {
                    2 + scf_offset
                };
                if session
                    .cabac
                    .decode_bin(&mut session.contexts[ctx_off::SIGNIFICANT_COEFF_FLAG + dc_offset])?
                    != 0
                {
                    sig_idx[n_sig] = 0;
                    n_sig += 1;
                }
            } else {
                sig_idx[n_sig] = 0;
                n_sig += 1;
            }
        }

        if n_sig == 0 {
            continue;
        }

        let ctx_set = (if i > 0 && tu.c_idx == 0 { 2 } else { 0 })
            + usize::from(i != num_last_subset && prev_subset_coded);
        let idx_delta = (if tu.c_idx > 0 { 4 } else { 0 }) + ctx_set;
        let g1_base = ctx_off::COEFF_ABS_LEVEL_GREATER1_FLAG + (idx_delta << 2);
        let g2_idx = ctx_off::COEFF_ABS_LEVEL_GREATER2_FLAG + idx_delta;

        // 大于 1 标志 (组内前 8 个), 首个置位的系数再解大于 2 标志
        let mut levels = [0i32; 16];
        let n_gt1 = n_sig.min(8);
        let mut coded_vals = 0u32;
        for m in 0..n_gt1 {
            let idx = if coded_vals != 0 {
                0
            } else if m < 3 {
                m + 1
            } else {
                3
            };
            let b = session
                .cabac
                .decode_bin(&mut session.contexts[g1_base + idx])?;
            coded_vals = (coded_vals << 1) | b;
            levels[m] = 1 + b as i32;
        }

        prev_subset_coded = false;
        let mut eq2 = false;
        coded_vals <<= 32 - n_gt1;
        if coded_vals != 0 {
            prev_subset_coded = true;
            let first = coded_vals.leading_zeros() as usize;
            levels[first] = 3;
            if session.cabac.decode_bin(&mut session.contexts[g2_idx])? == 0 {
                coded_vals &= !(0x8000_0000u32 >> first);
                levels[first] = 2;
                eq2 = true;
            }
        }
        // 第 9 个起没有大于 1 标志, 级别恒从 1 起步并解剩余级别
        if n_sig > 8 {
            let extra = n_sig - 8;
            coded_vals |= ((1u32 << extra) - 1) << (24 - extra);
            for m in 0..extra {
                levels[8 + m] = 1;
            }
        }

        // 符号位隐藏判定
        let implicit_rdpcm_active = tu.is_intra
            && seq.implicit_rdpcm_enabled
            && trans_skip_or_bypass
            && (tu.intra_pred_mode == 10 || tu.intra_pred_mode == 26);
        let sign_hidden = if !seq.sign_data_hiding_enabled
            || tu.transquant_bypass
            || implicit_rdpcm_active
            || explicit_rdpcm
        {
            false
        } else {
            sig_idx[0] as i32 - sig_idx[n_sig - 1] as i32 > 3
        };

        // 符号位先于剩余级别解码, 左对齐存放
        let n_signs = n_sig - usize::from(sign_hidden);
        let mut sign_flags = 0u32;
        for _ in 0..n_signs {
            sign_flags = (sign_flags << 1) | session.cabac.decode_bypass()?;
        }
        if n_signs > 0 {
            sign_flags <<= 32 - n_signs;
        }

        // 剩余级别
        let mut sum_abs = n_sig as i32 + i32::from(eq2);
        if coded_vals != 0 {
            let persistent = seq.persistent_rice_adaptation_enabled;
            let stat_class =
                (if tu.c_idx == 0 { 2 } else { 0 }) + usize::from(trans_skip_or_bypass);
            let mut c_rice_param = if persistent {
                u32::from(session.stat_coeff[stat_class] >> 2)
            } else {
                0
            };
            let mut update_stat = persistent;

            let mut mask = coded_vals;
            while mask != 0 {
                let m = mask.leading_zeros() as usize;
                mask &= !(0x8000_0000u32 >> m);

                let remaining = coeff_abs_level_remaining(&mut session.cabac, c_rice_param)?;
                let level = levels[m] + remaining as i32;

                // 统计只吸收每组第一个剩余级别
                if update_stat {
                    update_rice(&mut session.stat_coeff[stat_class], remaining, c_rice_param);
                    update_stat = false;
                }
                if level > (3 << c_rice_param) {
                    c_rice_param = if persistent {
                        c_rice_param + 1
                    } else {
                        (c_rice_param + 1).min(4)
                    };
                }

                levels[m] = level;
                sum_abs += level - 1;
            }
        }

        // 隐藏符号由级别和的奇偶性恢复, 作用于组内扫描序最小的系数
        if sign_hidden && (sum_abs & 1) != 0 {
            levels[n_sig - 1] = -levels[n_sig - 1];
        }

        // 符号、反量化与写出
        for m in 0..n_sig {
            let sp = sig_idx[m] as usize;
            let x_c = (x_cg << 2) + tables.x_off[sp] as usize;
            let y_c = (y_cg << 2) + tables.y_off[sp] as usize;

            let mut level = levels[m];
            if sign_flags & 0x8000_0000 != 0 {
                level = -level;
            }
            sign_flags <<= 1;

            let scale_m = if x_c == 0 && y_c == 0 {
                dq.dc_scale
            } else if log2_size >= 3 {
                let n_shr = log2_size - 3;
                dq.scale_matrix[((y_c >> n_shr) << 3) + (x_c >> n_shr)]
            } else {
                dq.scale_matrix[(y_c << 2) + x_c]
            };

            coeffs.set(
                x_c,
                y_c,
                trans_scale_sat(level, dq.scale, scale_m, dq.shift),
            );
        }
    }

    // 后处理: RDPCM 与变换跳过旋转
    if tu.transquant_bypass {
        if explicit_rdpcm
            || (seq.implicit_rdpcm_enabled
                && (tu.intra_pred_mode == 10 || tu.intra_pred_mode == 26))
        {
            let vertical = if seq.implicit_rdpcm_enabled {
                tu.intra_pred_mode == 26
            } else {
                explicit_rdpcm_dir
            };
            apply_rdpcm(&mut coeffs, vertical);
        }
    } else if transform_skip {
        if seq.transform_skip_rotation_enabled && tu.log2_size == 2 && tu.is_intra {
            for n in 0..8 {
                let (xa, ya) = (n & 3, n >> 2);
                let (xb, yb) = ((15 - n) & 3, (15 - n) >> 2);
                let a = coeffs.get(xa, ya);
                let b = coeffs.get(xb, yb);
                coeffs.set(xa, ya, b);
                coeffs.set(xb, yb, a);
            }
        }
        if explicit_rdpcm
            || (seq.implicit_rdpcm_enabled
                && tu.is_intra
                && (tu.intra_pred_mode == 10 || tu.intra_pred_mode == 26))
        {
            let vertical = if explicit_rdpcm {
                explicit_rdpcm_dir
            } else {
                tu.intra_pred_mode == 26
            };
            apply_rdpcm(&mut coeffs, vertical);
        }
    }

    Ok(DecodedBlock {
        coeffs,
        last_x: last_x as u8,
        last_y: last_y as u8,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trans_scale_sat() {
        // qp 26, 8 位深, 4x4: scale=51 (div6 折入移位后 shift=0), 平坦矩阵
        assert_eq!(trans_scale_sat(1, 51, 16, 0), 408);
        assert_eq!(trans_scale_sat(-1, 51, 16, 0), -408);
        assert_eq!(trans_scale_sat(2, 51, 16, 0), 816);
        // 饱和
        assert_eq!(trans_scale_sat(100_000, 51, 16, 0), i16::MAX);
        assert_eq!(trans_scale_sat(-100_000, 51, 16, 0), i16::MIN);
        // 旁路: scale=2, shift=0 等价透传
        assert_eq!(trans_scale_sat(-7, 2, 1, 0), -7);
    }

    #[test]
    fn test_update_rice() {
        let mut stat = 0u8;
        update_rice(&mut stat, 3, 0);
        assert_eq!(stat, 1);
        update_rice(&mut stat, 12, 2);
        assert_eq!(stat, 2);
        update_rice(&mut stat, 0, 0);
        assert_eq!(stat, 1);
        update_rice(&mut stat, 2, 1);
        assert_eq!(stat, 1, "0 < x < 3 时统计不变");
        update_rice(&mut stat, 1, 1);
        assert_eq!(stat, 0, "remaining 非零但 x 为 0 时递减");
        let mut zero = 0u8;
        update_rice(&mut zero, 0, 0);
        assert_eq!(zero, 0);
    }

    #[test]
    fn test_sig_ctx_map_transposes() {
        // 垂直映射是水平映射的转置
        for pos in 0..16 {
            let (x, y) = (pos & 3, pos >> 2);
            assert_eq!(
                SIG_CTX_MAP_4X4[1][pos],
                SIG_CTX_MAP_4X4[2][(x << 2) + y],
            );
        }
    }

    #[test]
    fn test_apply_rdpcm_horizontal() {
        let mut buf = CoeffBuffer::new(2).unwrap();
        buf.set(0, 0, 5);
        buf.set(1, 0, -2);
        buf.set(2, 0, 1);
        apply_rdpcm(&mut buf, false);
        assert_eq!(buf.get(0, 0), 5);
        assert_eq!(buf.get(1, 0), 3);
        assert_eq!(buf.get(2, 0), 4);
        assert_eq!(buf.get(3, 0), 4);
    }

    #[test]
    fn test_apply_rdpcm_vertical() {
        let mut buf = CoeffBuffer::new(2).unwrap();
        buf.set(0, 0, 3);
        buf.set(0, 2, -1);
        apply_rdpcm(&mut buf, true);
        assert_eq!(buf.get(0, 1), 3);
        assert_eq!(buf.get(0, 2), 2);
        assert_eq!(buf.get(0, 3), 2);
    }

    #[test]
    fn test_derive_dequant_chroma_qp_mapping() {
        let seq = SequenceParams::default();
        let slice = SliceParams::default();
        // qp_y 35 -> qp_i 35 -> 4:2:0 映射到 33
        let tu = TransformUnit {
            c_idx: 1,
            qp_y: 35,
            ..TransformUnit::default()
        };
        let dq = derive_dequant_params(&seq, &slice, &tu, false);
        // qp 33: rem6=3 -> 57, div6=5 > shift 4 -> scale 57<<1, shift 0
        assert_eq!(dq.scale, 57 << 1);
        assert_eq!(dq.shift, 0);
    }
}
