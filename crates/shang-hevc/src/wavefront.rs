//! 波前并行行间同步.
//!
//! 波前模式下每个 CTB 行可由独立线程解码: 上一行解码完第二个
//! CTB 后发布其上下文快照, 下一行的首个 CTB 必须等到该快照才能
//! 恢复上下文开始解码. 通过 Mutex + Condvar 在行线程间传递快照.

use crate::context::ContextSnapshot;
use shang_core::{ShangError, ShangResult};
use std::sync::{Condvar, Mutex};

struct WavefrontState {
    rows: Vec<Option<ContextSnapshot>>,
    aborted: bool,
}

/// 波前行间快照传递
///
/// 一个图像的所有行线程共享一个实例 (通常包在 `Arc` 里).
pub struct WavefrontSync {
    lock: Mutex<WavefrontState>,
    cvar: Condvar,
}

impl WavefrontSync {
    /// 创建 `num_rows` 行的同步器, 所有快照槽位初始为空
    pub fn new(num_rows: usize) -> Self {
        Self {
            lock: Mutex::new(WavefrontState {
                rows: vec![None; num_rows],
                aborted: false,
            }),
            cvar: Condvar::new(),
        }
    }

    /// 行数
    pub fn num_rows(&self) -> usize {
        self.lock.lock().unwrap().rows.len()
    }

    /// 发布第 `row` 行解码完第二个 CTB 后的上下文快照
    pub fn publish(&self, row: usize, snapshot: ContextSnapshot) -> ShangResult<()> {
        let mut state = self.lock.lock().unwrap();
        if row >= state.rows.len() {
            return Err(ShangError::InvalidArgument(format!(
                "波前行号 {} 越界, 共 {} 行",
                row,
                state.rows.len(),
            )));
        }
        state.rows[row] = Some(snapshot);
        self.cvar.notify_all();
        Ok(())
    }

    /// 阻塞等待第 `row` 行的快照 (供第 `row + 1` 行起始使用)
    ///
    /// 任一行解码失败调用 [`abort`](Self::abort) 后, 所有等待方
    /// 以错误返回, 避免整个图像的线程组悬挂.
    pub fn wait_for_row(&self, row: usize) -> ShangResult<ContextSnapshot> {
        let mut state = self.lock.lock().unwrap();
        if row >= state.rows.len() {
            return Err(ShangError::InvalidArgument(format!(
                "波前行号 {} 越界, 共 {} 行",
                row,
                state.rows.len(),
            )));
        }

        loop {
            if state.aborted {
                return Err(ShangError::Internal("波前解码已被中止".to_string()));
            }
            if let Some(snapshot) = state.rows[row].clone() {
                return Ok(snapshot);
            }
            state = self.cvar.wait(state).unwrap();
        }
    }

    /// 中止整个图像的波前解码, 唤醒所有等待线程
    pub fn abort(&self) {
        let mut state = self.lock.lock().unwrap();
        state.aborted = true;
        self.cvar.notify_all();
    }
}
