/// Status line shown for a single document chunk job at `progress` percent.
pub fn phase_label(progress: f64) -> &'static str {
    if progress < 10.0 {
        "正在初始化..."
    } else if progress < 50.0 {
        "正在分析文档..."
    } else if progress < 80.0 {
        "正在保存切块结果..."
    } else {
        "即将完成..."
    }
}

pub const WAITING_LABEL: &str = "通信中，请耐心等待...";

const NUDGE_STEP: f64 = 0.5;
const NUDGE_CEILING: f64 = 95.0;

/// Last progress value pushed to the view, owned by one poller.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressMeter {
    last: f64,
}

impl Default for ProgressMeter {
    fn default() -> Self {
        Self { last: 0.0 }
    }
}

impl ProgressMeter {
    /// A meter that reports the very first observation, whatever it is.
    pub fn primed() -> Self {
        Self { last: -1.0 }
    }

    /// Returns the value to render when it moved by at least one point.
    pub fn observe(&mut self, progress: f64) -> Option<f64> {
        if (progress - self.last).abs() >= 1.0 {
            self.last = progress;
            Some(progress)
        } else {
            None
        }
    }

    /// Creeps forward while the backend is slow to answer so the user sees
    /// activity. Returns `false` once the ceiling is reached.
    pub fn nudge(&mut self) -> bool {
        if self.last < NUDGE_CEILING {
            self.last += NUDGE_STEP;
            true
        } else {
            false
        }
    }
}
