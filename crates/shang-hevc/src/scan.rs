//! 系数扫描次序表.
//!
//! 残差解码按 4x4 系数组为单位反向遍历, 扫描坐标由系数组坐标表
//! 与组内偏移表两级组合而成. 对角扫描适用于全部尺寸, 水平/垂直
//! 扫描仅出现在 4x4 与 8x8 帧内块.
//!
//! 正向表按扫描序号给出坐标, 逆向表按坐标给出扫描序号, 两者互逆.

use crate::common::ScanType;
use shang_core::{ShangError, ShangResult};

const SCAN_1X1: [u8; 1] = [0];

pub(crate) const HORIZ_SCAN2X2_X: [u8; 4] = [0, 1, 0, 1];
pub(crate) const HORIZ_SCAN2X2_Y: [u8; 4] = [0, 0, 1, 1];

pub(crate) const HORIZ_SCAN4X4_X: [u8; 16] = [
    0, 1, 2, 3, 0, 1, 2, 3, 0, 1, 2, 3, 0, 1, 2, 3,
];
pub(crate) const HORIZ_SCAN4X4_Y: [u8; 16] = [
    0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3,
];

// 以 4x4 组为单位的 8x8 水平扫描逆表
pub(crate) const HORIZ_SCAN8X8_INV: [[u8; 8]; 8] = [
    [0, 1, 2, 3, 16, 17, 18, 19],
    [4, 5, 6, 7, 20, 21, 22, 23],
    [8, 9, 10, 11, 24, 25, 26, 27],
    [12, 13, 14, 15, 28, 29, 30, 31],
    [32, 33, 34, 35, 48, 49, 50, 51],
    [36, 37, 38, 39, 52, 53, 54, 55],
    [40, 41, 42, 43, 56, 57, 58, 59],
    [44, 45, 46, 47, 60, 61, 62, 63],
];

pub(crate) const DIAG_SCAN2X2_X: [u8; 4] = [0, 0, 1, 1];
pub(crate) const DIAG_SCAN2X2_Y: [u8; 4] = [0, 1, 0, 1];

pub(crate) const DIAG_SCAN4X4_X: [u8; 16] = [
    0, 0, 1, 0, 1, 2, 0, 1, 2, 3, 1, 2, 3, 2, 3, 3,
];
pub(crate) const DIAG_SCAN4X4_Y: [u8; 16] = [
    0, 1, 0, 2, 1, 0, 3, 2, 1, 0, 3, 2, 1, 3, 2, 3,
];

pub(crate) const DIAG_SCAN8X8_X: [u8; 64] = [
    0, 0, 1, 0, 1, 2, 0, 1, 2, 3, 0, 1, 2, 3, 4, 0,
    1, 2, 3, 4, 5, 0, 1, 2, 3, 4, 5, 6, 0, 1, 2, 3,
    4, 5, 6, 7, 1, 2, 3, 4, 5, 6, 7, 2, 3, 4, 5, 6,
    7, 3, 4, 5, 6, 7, 4, 5, 6, 7, 5, 6, 7, 6, 7, 7,
];
pub(crate) const DIAG_SCAN8X8_Y: [u8; 64] = [
    0, 1, 0, 2, 1, 0, 3, 2, 1, 0, 4, 3, 2, 1, 0, 5,
    4, 3, 2, 1, 0, 6, 5, 4, 3, 2, 1, 0, 7, 6, 5, 4,
    3, 2, 1, 0, 7, 6, 5, 4, 3, 2, 1, 7, 6, 5, 4, 3,
    2, 7, 6, 5, 4, 3, 7, 6, 5, 4, 7, 6, 5, 7, 6, 7,
];

pub(crate) const DIAG_SCAN2X2_INV: [[u8; 2]; 2] = [[0, 2], [1, 3]];

pub(crate) const DIAG_SCAN4X4_INV: [[u8; 4]; 4] = [
    [0, 2, 5, 9],
    [1, 4, 8, 12],
    [3, 7, 11, 14],
    [6, 10, 13, 15],
];

pub(crate) const DIAG_SCAN8X8_INV: [[u8; 8]; 8] = [
    [0, 2, 5, 9, 14, 20, 27, 35],
    [1, 4, 8, 13, 19, 26, 34, 42],
    [3, 7, 12, 18, 25, 33, 41, 48],
    [6, 11, 17, 24, 32, 40, 47, 53],
    [10, 16, 23, 31, 39, 46, 52, 57],
    [15, 22, 30, 38, 45, 51, 56, 60],
    [21, 29, 37, 44, 50, 55, 59, 62],
    [28, 36, 43, 49, 54, 58, 61, 63],
];

/// 一个变换块扫描所需的四张坐标表
///
/// `x_cg`/`y_cg` 按系数组扫描序号给出组坐标, `x_off`/`y_off`
/// 按组内扫描序号 (0-15) 给出组内坐标.
#[derive(Debug, Clone, Copy)]
pub struct ScanTables {
    pub x_cg: &'static [u8],
    pub y_cg: &'static [u8],
    pub x_off: &'static [u8],
    pub y_off: &'static [u8],
}

/// 选取扫描类型与块尺寸对应的坐标表
///
/// 水平/垂直扫描只允许 4x4 与 8x8 块.
pub fn scan_tables(scan: ScanType, log2_size: u8) -> ShangResult<ScanTables> {
    if !(2..=5).contains(&log2_size) {
        return Err(ShangError::InvalidArgument(format!(
            "无效的变换块对数尺寸: {}",
            log2_size,
        )));
    }

    match scan {
        ScanType::Diagonal => {
            let (x_cg, y_cg): (&'static [u8], &'static [u8]) = match log2_size {
                2 => (&SCAN_1X1, &SCAN_1X1),
                3 => (&DIAG_SCAN2X2_X, &DIAG_SCAN2X2_Y),
                4 => (&DIAG_SCAN4X4_X, &DIAG_SCAN4X4_Y),
                _ => (&DIAG_SCAN8X8_X, &DIAG_SCAN8X8_Y),
            };
            Ok(ScanTables {
                x_cg,
                y_cg,
                x_off: &DIAG_SCAN4X4_X,
                y_off: &DIAG_SCAN4X4_Y,
            })
        }
        ScanType::Horizontal | ScanType::Vertical if log2_size > 3 => {
            Err(ShangError::InvalidArgument(format!(
                "水平/垂直扫描不支持对数尺寸 {}",
                log2_size,
            )))
        }
        ScanType::Horizontal => Ok(ScanTables {
            x_cg: &HORIZ_SCAN2X2_X,
            y_cg: &HORIZ_SCAN2X2_Y,
            x_off: &HORIZ_SCAN4X4_X,
            y_off: &HORIZ_SCAN4X4_Y,
        }),
        ScanType::Vertical => Ok(ScanTables {
            x_cg: &HORIZ_SCAN2X2_Y,
            y_cg: &HORIZ_SCAN2X2_X,
            x_off: &HORIZ_SCAN4X4_Y,
            y_off: &HORIZ_SCAN4X4_X,
        }),
    }
}

/// 按扫描序号求块内坐标
///
/// 序号 0 对应 DC. 组序号取高位, 组内序号取低 4 位 (4x4 块除外).
pub fn scan_position(scan: ScanType, log2_size: u8, pos: usize) -> ShangResult<(u8, u8)> {
    let size = 1usize << log2_size;
    if pos >= size * size {
        return Err(ShangError::InvalidArgument(format!(
            "扫描序号 {} 越界, 块边长 {}",
            pos, size,
        )));
    }

    let tables = scan_tables(scan, log2_size)?;
    if log2_size == 2 {
        return Ok((tables.x_off[pos], tables.y_off[pos]));
    }

    let cg = pos >> 4;
    let off = pos & 15;
    Ok((
        (tables.x_cg[cg] << 2) + tables.x_off[off],
        (tables.y_cg[cg] << 2) + tables.y_off[off],
    ))
}

/// 按块内坐标求扫描序号 (与 [`scan_position`] 互逆)
pub fn scan_rank(scan: ScanType, log2_size: u8, x: u8, y: u8) -> ShangResult<usize> {
    let size = 1u8 << log2_size;
    if x >= size || y >= size {
        return Err(ShangError::InvalidArgument(format!(
            "坐标 ({}, {}) 越界, 块边长 {}",
            x, y, size,
        )));
    }

    match scan {
        ScanType::Diagonal => {
            let off = DIAG_SCAN4X4_INV[(y & 3) as usize][(x & 3) as usize] as usize;
            let cg = match log2_size {
                2 => 0,
                3 => DIAG_SCAN2X2_INV[(y >> 2) as usize][(x >> 2) as usize] as usize,
                4 => DIAG_SCAN4X4_INV[(y >> 2) as usize][(x >> 2) as usize] as usize,
                _ => DIAG_SCAN8X8_INV[(y >> 2) as usize][(x >> 2) as usize] as usize,
            };
            Ok((cg << 4) + off)
        }
        ScanType::Horizontal | ScanType::Vertical if log2_size > 3 => {
            Err(ShangError::InvalidArgument(format!(
                "水平/垂直扫描不支持对数尺寸 {}",
                log2_size,
            )))
        }
        ScanType::Horizontal => Ok(HORIZ_SCAN8X8_INV[y as usize][x as usize] as usize),
        ScanType::Vertical => Ok(HORIZ_SCAN8X8_INV[x as usize][y as usize] as usize),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diag4x4_order() {
        let head: Vec<(u8, u8)> = (0..6)
            .map(|i| scan_position(ScanType::Diagonal, 2, i).unwrap())
            .collect();
        assert_eq!(head, [(0, 0), (0, 1), (1, 0), (0, 2), (1, 1), (2, 0)]);
    }

    #[test]
    fn test_scan_rank_inverts_scan_position() {
        for scan in [ScanType::Diagonal, ScanType::Horizontal, ScanType::Vertical] {
            for log2 in 2..=3u8 {
                let total = 1usize << (2 * log2);
                for pos in 0..total {
                    let (x, y) = scan_position(scan, log2, pos).unwrap();
                    assert_eq!(
                        scan_rank(scan, log2, x, y).unwrap(),
                        pos,
                        "scan={:?} log2={} pos={}",
                        scan,
                        log2,
                        pos,
                    );
                }
            }
        }
        for log2 in 4..=5u8 {
            let total = 1usize << (2 * log2);
            for pos in 0..total {
                let (x, y) = scan_position(ScanType::Diagonal, log2, pos).unwrap();
                assert_eq!(scan_rank(ScanType::Diagonal, log2, x, y).unwrap(), pos);
            }
        }
    }

    #[test]
    fn test_scan_covers_all_positions() {
        // 每个坐标恰好出现一次
        for log2 in 2..=5u8 {
            let size = 1usize << log2;
            let mut seen = vec![false; size * size];
            for pos in 0..size * size {
                let (x, y) = scan_position(ScanType::Diagonal, log2, pos).unwrap();
                let idx = (y as usize) * size + x as usize;
                assert!(!seen[idx]);
                seen[idx] = true;
            }
            assert!(seen.iter().all(|&s| s));
        }
    }

    #[test]
    fn test_horizontal_scan_8x8_groups() {
        // 8x8 水平扫描先走完左上 4x4 组
        assert_eq!(scan_position(ScanType::Horizontal, 3, 3).unwrap(), (3, 0));
        assert_eq!(scan_position(ScanType::Horizontal, 3, 4).unwrap(), (0, 1));
        assert_eq!(scan_position(ScanType::Horizontal, 3, 16).unwrap(), (4, 0));
        // 垂直扫描是其转置
        assert_eq!(scan_position(ScanType::Vertical, 3, 16).unwrap(), (0, 4));
    }

    #[test]
    fn test_large_blocks_reject_non_diagonal() {
        assert!(scan_tables(ScanType::Horizontal, 4).is_err());
        assert!(scan_rank(ScanType::Vertical, 5, 0, 0).is_err());
    }
}
