//! Debris budget and simulation clock

use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Per-world debris accounting, threaded through the breakage manager
#[derive(Debug, Clone)]
pub struct WorldBreakageBudget {
    max_debris: u32,
    clock: f64,
    /// Expiry times of live particle debris, in milliseconds
    expiries: BinaryHeap<Reverse<u64>>,
    /// Latest expiry of any live debris
    watermark: f64,
}

impl WorldBreakageBudget {
    pub fn new(max_debris: u32) -> Self {
        Self {
            max_debris,
            clock: 0.0,
            expiries: BinaryHeap::new(),
            watermark: 0.0,
        }
    }

    /// Simulation time in seconds
    pub fn now(&self) -> f64 {
        self.clock
    }

    pub fn debris_count(&self) -> u32 {
        self.expiries.len() as u32
    }

    pub fn is_saturated(&self) -> bool {
        self.debris_count() >= self.max_debris
    }

    pub fn lifetime_watermark(&self) -> f64 {
        self.watermark
    }

    /// Advance the clock and retire expired debris
    pub fn advance(&mut self, dt: f32) {
        self.clock += f64::from(dt.max(0.0));
        let now_ms = (self.clock * 1000.0) as u64;
        while let Some(Reverse(expiry)) = self.expiries.peek() {
            if *expiry > now_ms {
                break;
            }
            self.expiries.pop();
        }
    }

    /// Reserve a particle slot living for `lifetime` seconds
    pub fn try_acquire(&mut self, lifetime: f32) -> bool {
        if self.is_saturated() {
            return false;
        }
        let expiry = self.clock + f64::from(lifetime.max(0.0));
        self.expiries.push(Reverse((expiry * 1000.0) as u64));
        self.watermark = self.watermark.max(expiry);
        true
    }

    /// Forget all live debris (level reset)
    pub fn clear(&mut self) {
        self.expiries.clear();
        self.watermark = self.clock;
    }
}
