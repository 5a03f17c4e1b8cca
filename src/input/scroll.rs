//! Wheel delta accumulation
//!
//! X11 scroll synthesis is discrete (button 4/5/6/7 press-release pairs),
//! while browsers report pixel deltas. Deltas accumulate per axis and drain
//! into one step per [`SCROLL_STEP_PX`] of travel.

/// Pixels of accumulated travel per discrete scroll step.
pub const SCROLL_STEP_PX: f64 = 40.0;

/// One discrete scroll step. Web deltaY is positive when scrolling down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollStep {
    Up,
    Down,
    Left,
    Right,
}

/// Signed per-axis accumulator carried across wheel events.
#[derive(Debug, Default)]
pub struct ScrollAccumulator {
    x: f64,
    y: f64,
}

impl ScrollAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a wheel delta and drain whole steps from both axes.
    pub fn push(&mut self, dx: f64, dy: f64) -> Vec<ScrollStep> {
        self.x += dx;
        self.y += dy;

        let mut steps = Vec::new();
        while self.y <= -SCROLL_STEP_PX {
            steps.push(ScrollStep::Up);
            self.y += SCROLL_STEP_PX;
        }
        while self.y >= SCROLL_STEP_PX {
            steps.push(ScrollStep::Down);
            self.y -= SCROLL_STEP_PX;
        }
        while self.x <= -SCROLL_STEP_PX {
            steps.push(ScrollStep::Left);
            self.x += SCROLL_STEP_PX;
        }
        while self.x >= SCROLL_STEP_PX {
            steps.push(ScrollStep::Right);
            self.x -= SCROLL_STEP_PX;
        }
        steps
    }
}

impl ScrollStep {
    /// X11 wheel button for this step (4 up, 5 down, 6 left, 7 right).
    pub fn x11_button(&self) -> u8 {
        match self {
            ScrollStep::Up => 4,
            ScrollStep::Down => 5,
            ScrollStep::Left => 6,
            ScrollStep::Right => 7,
        }
    }
}
