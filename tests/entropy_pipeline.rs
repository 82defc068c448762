//! 端到端集成测试: 片数据熵解码的完整管线.
//!
//! 测试流程: 片数据字节 → 会话初始化 → 算术解码/残差解码 → 验证
//! 以及瓦片/波前边界上的上下文传递.

use shang::hevc::{
    CtbLayout, CtbTransition, EntropySession, ScanType, SequenceParams, SliceParams,
    TransformUnit, WavefrontSync, classify_ctb, decode_residual, should_save_snapshot,
};
use std::sync::Arc;
use std::thread;

// 4x4 亮度块, 对角扫描, I 片 qp 26: 仅 DC 系数 +1, 反量化后 408
const DC_ONLY_STREAM: [u8; 3] = [0x00, 0xE0, 0x80];

// 4x4 亮度块, 符号位隐藏: 末位显著系数 (2, 0), 4 个显著系数,
// 最低扫描位的符号由级别和的奇偶性恢复
const SIGN_HIDDEN_STREAM: [u8; 5] = [0x00, 0x34, 0xD2, 0x4D, 0x00];

fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn luma_4x4() -> TransformUnit {
    TransformUnit {
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

#[test]
fn test_dc_only_block_pipeline() {
    init_test_logging();
    let slice = SliceParams::default();
    let seq = SequenceParams::default();
    let mut session = EntropySession::new(&DC_ONLY_STREAM, &slice).unwrap();

    let block = decode_residual(&mut session, &seq, &slice, &luma_4x4()).unwrap();
    assert_eq!((block.last_x, block.last_y), (0, 0));
    assert_eq!(block.coeffs.get(0, 0), 408);
    assert_eq!(block.coeffs.count_nonzero(), 1);
}

#[test]
fn test_sign_hiding_block_pipeline() {
    init_test_logging();
    let slice = SliceParams::default();
    let seq = SequenceParams {
        sign_data_hiding_enabled: true,
        ..SequenceParams::default()
    };
    let mut session = EntropySession::new(&SIGN_HIDDEN_STREAM, &slice).unwrap();

    let block = decode_residual(&mut session, &seq, &slice, &luma_4x4()).unwrap();
    assert_eq!((block.last_x, block.last_y), (2, 0));
    assert_eq!(block.coeffs.get(2, 0), 816);
    assert_eq!(block.coeffs.get(1, 0), -408);
    assert_eq!(block.coeffs.get(0, 1), 408);
    assert_eq!(block.coeffs.get(0, 0), -408, "隐藏符号按奇偶性恢复为负");
    assert_eq!(block.coeffs.count_nonzero(), 4);
}

#[test]
fn test_tile_boundary_resets_then_decodes() {
    init_test_logging();
    let slice = SliceParams::default();
    let seq = SequenceParams {
        tiles_enabled: true,
        ..SequenceParams::default()
    };
    let mut layout = CtbLayout::plain(4, 8);
    layout.tiles_enabled = true;
    layout.tile_id = vec![0, 0, 0, 0, 1, 1, 1, 1];

    let mut session = EntropySession::new(&DC_ONLY_STREAM, &slice).unwrap();
    // 第一个瓦片解码一个块, 推进了上下文
    let first = decode_residual(&mut session, &seq, &slice, &luma_4x4()).unwrap();
    assert_eq!(first.coeffs.get(0, 0), 408);

    // 跨瓦片: 新子流 + 上下文重置, 同一码流再解一次得到同一结果
    assert_eq!(classify_ctb(&layout, 0, 4), CtbTransition::TileBoundary);
    session
        .init_for_ctb(
            CtbTransition::TileBoundary,
            4,
            &layout,
            &slice,
            true,
            None,
            Some(&DC_ONLY_STREAM),
        )
        .unwrap();
    let second = decode_residual(&mut session, &seq, &slice, &luma_4x4()).unwrap();
    assert_eq!(second.coeffs.as_slice(), first.coeffs.as_slice());
}

#[test]
fn test_wavefront_rows_across_threads() {
    init_test_logging();
    let slice = SliceParams::default();
    let seq = SequenceParams {
        entropy_coding_sync_enabled: true,
        ..SequenceParams::default()
    };
    let layout = CtbLayout {
        ctb_width: 4,
        tile_id: vec![0; 8],
        tiles_enabled: false,
        entropy_sync_enabled: true,
    };
    let sync = Arc::new(WavefrontSync::new(2));

    // 第 1 行线程: 等待第 0 行的快照, 恢复后在自己的子流上解码
    let row1_sync = Arc::clone(&sync);
    let row1_slice = slice.clone();
    let row1_seq = seq.clone();
    let handle = thread::spawn(move || {
        let snap = row1_sync.wait_for_row(0).unwrap();
        let mut session = EntropySession::new(&DC_ONLY_STREAM, &row1_slice).unwrap();
        session.contexts.restore(&snap);
        decode_residual(&mut session, &row1_seq, &row1_slice, &luma_4x4()).unwrap()
    });

    // 第 0 行: 解码到第二个 CTB 后发布快照
    let session = EntropySession::new(&DC_ONLY_STREAM, &slice).unwrap();
    assert!(should_save_snapshot(&layout, 2));
    sync.publish(0, session.snapshot()).unwrap();

    let row1_block = handle.join().unwrap();
    assert_eq!(row1_block.coeffs.get(0, 0), 408);
}

#[test]
fn test_terminate_after_block() {
    init_test_logging();
    // DC 块码流末尾补一个终止 bin 为 0 的延续
    let slice = SliceParams::default();
    let seq = SequenceParams::default();
    let data = [0x00, 0xE0, 0x80, 0x00];
    let mut session = EntropySession::new(&data, &slice).unwrap();

    let block = decode_residual(&mut session, &seq, &slice, &luma_4x4()).unwrap();
    assert_eq!(block.coeffs.get(0, 0), 408);
    assert_eq!(session.cabac.decode_terminate().unwrap(), 0);
}
