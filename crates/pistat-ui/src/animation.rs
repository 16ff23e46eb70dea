//! Value tweens for displayed metrics.
//!
//! Each metric animates on its own: a new target starts a fresh linear
//! tween from whatever value is currently displayed, over a duration drawn
//! from a [`TweenWindow`].

use pistat_types::entropy::Entropy;

/// A linear interpolation anchored to wall-clock time.
#[derive(Debug, Clone, PartialEq)]
pub struct Tween {
    pub start: f64,
    pub end: f64,
    pub duration_ms: u64,
    pub started_at_ms: u64,
}

impl Tween {
    pub fn new(start: f64, end: f64, duration_ms: u64, started_at_ms: u64) -> Self {
        Self {
            start,
            end,
            duration_ms,
            started_at_ms,
        }
    }

    /// Progress in `[0.0, 1.0]` at `now_ms`.
    pub fn fraction(&self, now_ms: u64) -> f64 {
        if self.duration_ms == 0 {
            return 1.0;
        }
        let elapsed = now_ms.saturating_sub(self.started_at_ms);
        (elapsed as f64 / self.duration_ms as f64).min(1.0)
    }

    /// Interpolated value at `now_ms`. Exactly `end` once finished.
    pub fn value_at(&self, now_ms: u64) -> f64 {
        let t = self.fraction(now_ms);
        if t >= 1.0 {
            return self.end;
        }
        self.start + (self.end - self.start) * t
    }

    pub fn is_finished(&self, now_ms: u64) -> bool {
        self.fraction(now_ms) >= 1.0
    }
}

/// Range the randomized tween duration is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TweenWindow {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl TweenWindow {
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub fn pick(&self, entropy: &mut Entropy) -> u64 {
        entropy.range(self.min_ms, self.max_ms)
    }
}

impl Default for TweenWindow {
    fn default() -> Self {
        Self::new(1200, 2100)
    }
}

/// A displayed number that eases toward its latest target.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub current: f64,
    pub target: f64,
    pub unit: String,
    pub decimals: usize,
    tween: Option<Tween>,
}

impl Metric {
    pub fn new(unit: &str, decimals: usize) -> Self {
        Self {
            current: 0.0,
            target: 0.0,
            unit: unit.to_string(),
            decimals,
            tween: None,
        }
    }

    /// Set a new target and start tweening toward it from the current
    /// displayed value. Non-finite targets are treated as zero.
    pub fn retarget(&mut self, target: f64, now_ms: u64, duration_ms: u64) {
        let target = if target.is_finite() { target } else { 0.0 };
        self.target = target;
        self.tween = Some(Tween::new(self.current, target, duration_ms, now_ms));
    }

    /// Write the interpolated value for `now_ms`. Returns `true` while the
    /// metric is still moving.
    pub fn advance(&mut self, now_ms: u64) -> bool {
        let Some(ref tween) = self.tween else {
            return false;
        };
        self.current = tween.value_at(now_ms);
        if tween.is_finished(now_ms) {
            self.current = self.target;
            self.tween = None;
            return false;
        }
        true
    }

    pub fn is_animating(&self) -> bool {
        self.tween.is_some()
    }

    /// Current value formatted with the metric's precision and unit.
    pub fn display(&self) -> String {
        let formatted = if self.decimals > 0 {
            format!("{:.*}", self.decimals, self.current)
        } else {
            format!("{}", self.current.round() as i64)
        };
        format!("{formatted}{}", self.unit)
    }
}
