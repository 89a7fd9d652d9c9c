//! Backoff for retrying a contended queue pop.

use std::hint::spin_loop;
use std::thread;

#[derive(Debug, Default)]
pub struct Backoff {
    step: u32,
}

impl Backoff {
    const SPIN_LIMIT: u32 = 6;

    pub fn new() -> Self {
        Self { step: 0 }
    }

    /// Spin with exponential growth, then start yielding the thread.
    pub fn spin(&mut self) {
        if self.step <= Self::SPIN_LIMIT {
            for _ in 0..(1 << self.step) {
                spin_loop();
            }
            self.step += 1;
        } else {
            thread::yield_now();
        }
    }

    pub fn reset(&mut self) {
        self.step = 0;
    }
}
