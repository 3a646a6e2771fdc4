//! Cooperative progress and cancellation hook.
//!
//! Engines call [`ExecutionMonitor::checkpoint`] once per outer K-Means
//! iteration and once per X-Means sweep. Returning
//! [`ControlFlow::Break`] aborts the run with [`ClusterError::Cancelled`].
//!
//! Any `FnMut(&Progress) -> ControlFlow<()>` closure is a monitor:
//!
//! ```
//! use std::ops::ControlFlow;
//! use u_xmeans::monitor::{ExecutionMonitor, Progress};
//!
//! let mut seen = 0;
//! let mut monitor = |_: &Progress| {
//!     seen += 1;
//!     if seen > 3 { ControlFlow::Break(()) } else { ControlFlow::Continue(()) }
//! };
//! assert!(monitor.checkpoint(&Progress::Sweep { sweep: 0, k: 3 }).is_ok());
//! ```

use std::ops::ControlFlow;

use crate::error::{ClusterError, Result};

/// Where an engine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Start of K-Means iteration `iteration` (0-based) out of at most `max`.
    Iteration { iteration: usize, max: usize },
    /// Start of X-Means sweep `sweep` (0-based) at `k` clusters.
    Sweep { sweep: usize, k: usize },
}

impl Progress {
    fn stage(&self) -> String {
        match self {
            Self::Iteration { iteration, .. } => format!("k-means iteration {iteration}"),
            Self::Sweep { sweep, k } => format!("x-means sweep {sweep} (k={k})"),
        }
    }
}

/// Receives progress and may request cancellation.
pub trait ExecutionMonitor {
    /// Reports progress; `Break` stops the engine.
    fn on_progress(&mut self, progress: &Progress) -> ControlFlow<()>;

    /// Reports progress and turns a stop request into an error.
    fn checkpoint(&mut self, progress: &Progress) -> Result<()> {
        match self.on_progress(progress) {
            ControlFlow::Continue(()) => Ok(()),
            ControlFlow::Break(()) => Err(ClusterError::Cancelled {
                stage: progress.stage(),
            }),
        }
    }
}

/// Monitor that never cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMonitor;

impl ExecutionMonitor for NoopMonitor {
    fn on_progress(&mut self, _progress: &Progress) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

impl<F> ExecutionMonitor for F
where
    F: FnMut(&Progress) -> ControlFlow<()>,
{
    fn on_progress(&mut self, progress: &Progress) -> ControlFlow<()> {
        self(progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_never_cancels() {
        let mut m = NoopMonitor;
        for i in 0..100 {
            assert!(m
                .checkpoint(&Progress::Iteration {
                    iteration: i,
                    max: 100
                })
                .is_ok());
        }
    }

    #[test]
    fn closure_break_becomes_cancelled() {
        let mut m = |p: &Progress| match p {
            Progress::Sweep { .. } => ControlFlow::Break(()),
            Progress::Iteration { .. } => ControlFlow::Continue(()),
        };
        assert!(m
            .checkpoint(&Progress::Iteration {
                iteration: 0,
                max: 1
            })
            .is_ok());
        let err = m.checkpoint(&Progress::Sweep { sweep: 2, k: 5 }).unwrap_err();
        assert_eq!(
            err,
            ClusterError::Cancelled {
                stage: "x-means sweep 2 (k=5)".into()
            }
        );
    }
}
