//! 熵解码会话与 CTB 边界状态机.
//!
//! 一个会话对应一个片段的熵解码过程, 聚合算术解码器、上下文库与
//! Rice 自适应统计. 在 CTB 行/瓦片/片段边界上, 解码器与上下文
//! 需要按规则重新初始化或从波前快照恢复, 此处集中实现这套规则.

use crate::cabac::CabacDecoder;
use crate::common::SliceParams;
use crate::context::{ContextBank, ContextSnapshot};
use log::debug;
use shang_core::{ShangError, ShangResult};

/// CTB 级布局信息 (来自 PPS/SPS 的划分参数)
#[derive(Debug, Clone)]
pub struct CtbLayout {
    /// 一行 CTB 数
    pub ctb_width: usize,
    /// 每个 CTB (按瓦片扫描序) 所属瓦片编号, 未启用瓦片时全 0
    pub tile_id: Vec<u16>,
    /// 瓦片划分已启用
    pub tiles_enabled: bool,
    /// 波前熵同步已启用
    pub entropy_sync_enabled: bool,
}

impl CtbLayout {
    /// 无瓦片、无波前的平凡布局
    pub fn plain(ctb_width: usize, ctb_count: usize) -> Self {
        Self {
            ctb_width,
            tile_id: vec![0; ctb_count],
            tiles_enabled: false,
            entropy_sync_enabled: false,
        }
    }

    fn crosses_tile(&self, ctb_addr: usize) -> bool {
        self.tiles_enabled
            && ctb_addr > 0
            && self.tile_id[ctb_addr] != self.tile_id[ctb_addr - 1]
    }
}

/// CTB 起点处的熵状态迁移类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtbTransition {
    /// 片段首个 CTB
    SegmentStart,
    /// 跨入新瓦片
    TileBoundary,
    /// 波前行首 (第 0 列)
    WavefrontRowStart,
    /// 无边界, 继续当前状态
    Continue,
}

/// 判定 CTB 起点的状态迁移类别
///
/// 优先级: 片段起点 > 瓦片边界 > 波前行首. 片段起点同时是瓦片
/// 边界或行首时, 其附加行为在 [`EntropySession::init_for_ctb`]
/// 内部处理.
pub fn classify_ctb(
    layout: &CtbLayout,
    slice_start_addr: usize,
    ctb_addr: usize,
) -> CtbTransition {
    if ctb_addr == slice_start_addr {
        CtbTransition::SegmentStart
    } else if layout.crosses_tile(ctb_addr) {
        CtbTransition::TileBoundary
    } else if layout.entropy_sync_enabled && ctb_addr % layout.ctb_width == 0 {
        CtbTransition::WavefrontRowStart
    } else {
        CtbTransition::Continue
    }
}

/// 本 CTB 解码完成后是否应保存波前快照
///
/// 快照在每行第二个 CTB 之后保存; 一行只有两个 CTB 时在行首保存.
pub fn should_save_snapshot(layout: &CtbLayout, ctb_addr: usize) -> bool {
    layout.entropy_sync_enabled
        && (ctb_addr % layout.ctb_width == 2
            || (layout.ctb_width == 2 && ctb_addr % layout.ctb_width == 0))
}

/// 一个片段的熵解码会话
pub struct EntropySession<'a> {
    /// 算术解码器
    pub cabac: CabacDecoder<'a>,
    /// 概率上下文库
    pub contexts: ContextBank,
    /// Rice 参数持久自适应统计, 按 (亮度, 变换跳过) 分 4 类
    pub stat_coeff: [u8; 4],
}

impl<'a> EntropySession<'a> {
    /// 在片段数据上创建会话并初始化全部状态
    pub fn new(data: &'a [u8], slice: &SliceParams) -> ShangResult<Self> {
        let cabac = CabacDecoder::new(data)?;
        let contexts =
            ContextBank::new(slice.slice_type, slice.cabac_init_flag, slice.qp);
        Ok(Self {
            cabac,
            contexts,
            stat_coeff: [0; 4],
        })
    }

    /// 重新初始化上下文库与 Rice 统计
    pub fn init_contexts(&mut self, slice: &SliceParams) {
        self.contexts
            .init(slice.slice_type, slice.cabac_init_flag, slice.qp);
        self.stat_coeff = [0; 4];
    }

    /// 保存上下文快照 (波前同步点)
    pub fn snapshot(&self) -> ContextSnapshot {
        self.contexts.snapshot()
    }

    /// 在 CTB 起点应用熵状态迁移
    ///
    /// `substream` 给出新子流的数据区域: 片段起点必须提供; 瓦片
    /// 边界与波前行首在多子流模式下提供, 单子流模式传 `None` 则
    /// 就地按字节重对齐. `row_snapshot` 是上一行第二个 CTB 之后
    /// 保存的上下文快照, 仅波前路径需要.
    pub fn init_for_ctb(
        &mut self,
        transition: CtbTransition,
        ctb_addr: usize,
        layout: &CtbLayout,
        slice: &SliceParams,
        first_slice_in_pic: bool,
        row_snapshot: Option<&ContextSnapshot>,
        substream: Option<&'a [u8]>,
    ) -> ShangResult<()> {
        match transition {
            CtbTransition::SegmentStart => {
                let data = substream.ok_or_else(|| {
                    ShangError::InvalidArgument(
                        "片段起点必须提供子流数据".to_string(),
                    )
                })?;
                self.cabac = CabacDecoder::new(data)?;

                if !slice.dependent_slice_segment || layout.crosses_tile(ctb_addr) {
                    self.init_contexts(slice);
                }

                if !first_slice_in_pic
                    && layout.entropy_sync_enabled
                    && ctb_addr % layout.ctb_width == 0
                {
                    if layout.ctb_width == 1 {
                        self.init_contexts(slice);
                    } else if slice.dependent_slice_segment {
                        let snap = row_snapshot.ok_or_else(|| {
                            ShangError::InvalidArgument(
                                "依赖片段在波前行首需要上一行快照".to_string(),
                            )
                        })?;
                        self.contexts.restore(snap);
                    }
                }
                debug!("熵会话: CTB {} 片段起点初始化完成", ctb_addr);
            }
            CtbTransition::TileBoundary => {
                match substream {
                    Some(data) => self.cabac = CabacDecoder::new(data)?,
                    None => self.cabac.reinit()?,
                }
                self.init_contexts(slice);
                debug!("熵会话: CTB {} 跨瓦片边界, 上下文重置", ctb_addr);
            }
            CtbTransition::WavefrontRowStart => {
                // 行尾的子流终止 bin
                self.cabac.decode_terminate()?;
                match substream {
                    Some(data) => self.cabac = CabacDecoder::new(data)?,
                    None => self.cabac.reinit()?,
                }

                if layout.ctb_width == 1 {
                    self.init_contexts(slice);
                } else {
                    let snap = row_snapshot.ok_or_else(|| {
                        ShangError::InvalidArgument(
                            "波前行首需要上一行快照".to_string(),
                        )
                    })?;
                    self.contexts.restore(snap);
                }
            }
            CtbTransition::Continue => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{SliceParams, SliceType};
    use crate::context::NUM_CONTEXTS;

    fn layout_wpp(ctb_width: usize, rows: usize) -> CtbLayout {
        CtbLayout {
            ctb_width,
            tile_id: vec![0; ctb_width * rows],
            tiles_enabled: false,
            entropy_sync_enabled: true,
        }
    }

    #[test]
    fn test_classify_priorities() {
        let mut layout = layout_wpp(4, 3);
        layout.tiles_enabled = true;
        layout.tile_id = vec![0, 0, 0, 0, 1, 1, 1, 1, 1, 1, 1, 1];

        assert_eq!(classify_ctb(&layout, 0, 0), CtbTransition::SegmentStart);
        assert_eq!(classify_ctb(&layout, 0, 1), CtbTransition::Continue);
        // 瓦片边界与行首重合时瓦片优先
        assert_eq!(classify_ctb(&layout, 0, 4), CtbTransition::TileBoundary);
        assert_eq!(classify_ctb(&layout, 0, 8), CtbTransition::WavefrontRowStart);
    }

    #[test]
    fn test_snapshot_rule() {
        let layout = layout_wpp(4, 2);
        assert!(!should_save_snapshot(&layout, 0));
        assert!(!should_save_snapshot(&layout, 1));
        assert!(should_save_snapshot(&layout, 2));
        assert!(!should_save_snapshot(&layout, 3));
        assert!(should_save_snapshot(&layout, 6));

        // 两列布局在行首保存
        let narrow = layout_wpp(2, 2);
        assert!(should_save_snapshot(&narrow, 0));
        assert!(should_save_snapshot(&narrow, 2));

        let no_sync = CtbLayout::plain(4, 8);
        assert!(!should_save_snapshot(&no_sync, 2));
    }

    #[test]
    fn test_wavefront_row_start_restores_snapshot() {
        let slice = SliceParams {
            slice_type: SliceType::P,
            ..SliceParams::default()
        };
        let layout = layout_wpp(4, 2);
        // 行首前保证还有足够数据: 终止 bin 消费后重对齐再读 9 位
        let data = [0x00, 0x40, 0x00, 0x00, 0x12, 0x34, 0x56];
        let mut session = EntropySession::new(&data, &slice).unwrap();

        // 构造一个与初始态不同的快照
        let mut altered = session.contexts.clone();
        for i in 0..NUM_CONTEXTS {
            altered[i].0 ^= 2;
        }
        let snap = altered.snapshot();

        session
            .init_for_ctb(
                CtbTransition::WavefrontRowStart,
                4,
                &layout,
                &slice,
                false,
                Some(&snap),
                None,
            )
            .unwrap();
        assert_eq!(session.contexts.snapshot(), snap);
        assert_eq!(session.cabac.range(), 510);
    }

    #[test]
    fn test_wavefront_missing_snapshot_is_error() {
        let slice = SliceParams::default();
        let layout = layout_wpp(4, 2);
        let data = [0x00, 0x40, 0x00, 0x00, 0x12, 0x34, 0x56];
        let mut session = EntropySession::new(&data, &slice).unwrap();

        let result = session.init_for_ctb(
            CtbTransition::WavefrontRowStart,
            4,
            &layout,
            &slice,
            false,
            None,
            None,
        );
        assert!(matches!(result, Err(ShangError::InvalidArgument(_))));
    }

    #[test]
    fn test_tile_boundary_resets_contexts() {
        let slice = SliceParams::default();
        let mut layout = CtbLayout::plain(4, 8);
        layout.tiles_enabled = true;
        layout.tile_id = vec![0, 0, 0, 0, 1, 1, 1, 1];

        let data = [0x00, 0x40, 0x00, 0x00, 0x12, 0x34, 0x56];
        let mut session = EntropySession::new(&data, &slice).unwrap();
        session.contexts[7].0 = 88;
        session.stat_coeff = [3, 1, 4, 1];

        session
            .init_for_ctb(
                CtbTransition::TileBoundary,
                4,
                &layout,
                &slice,
                true,
                None,
                None,
            )
            .unwrap();

        let fresh = ContextBank::new(slice.slice_type, slice.cabac_init_flag, slice.qp);
        assert_eq!(session.contexts, fresh);
        assert_eq!(session.stat_coeff, [0; 4]);
    }

    #[test]
    fn test_one_ctb_wide_wavefront_reinits_contexts() {
        let slice = SliceParams::default();
        let layout = layout_wpp(1, 4);
        let data = [0x00, 0x40, 0x00, 0x00, 0x12, 0x34, 0x56];
        let mut session = EntropySession::new(&data, &slice).unwrap();
        session.contexts[7].0 = 88;

        session
            .init_for_ctb(
                CtbTransition::WavefrontRowStart,
                1,
                &layout,
                &slice,
                true,
                None,
                None,
            )
            .unwrap();

        let fresh = ContextBank::new(slice.slice_type, slice.cabac_init_flag, slice.qp);
        assert_eq!(session.contexts, fresh);
    }

    #[test]
    fn test_dependent_segment_keeps_contexts() {
        let slice = SliceParams {
            dependent_slice_segment: true,
            ..SliceParams::default()
        };
        let layout = CtbLayout::plain(4, 8);
        let data = [0x00, 0x40, 0x00, 0x00];
        let mut session = EntropySession::new(&data, &slice).unwrap();
        session.contexts[7].0 = 88;

        let next = [0x00, 0x52, 0x80];
        session
            .init_for_ctb(
                CtbTransition::SegmentStart,
                5,
                &layout,
                &slice,
                false,
                None,
                Some(&next),
            )
            .unwrap();
        // 依赖片段继承上下文, 解码器换到新子流
        assert_eq!(session.contexts[7].0, 88);
        assert_eq!(session.cabac.offset(), 165);
    }
}
