// src/retry.rs
//! Backoff schedule and the sleep seam used between attempts.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

/// Exponential backoff with a floor: the wait after failed attempt `n`
/// (1-based) is `max(floor, initial * 2^(n-1))`. Depends only on `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub initial: Duration,
    pub floor: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, floor: Duration) -> Self {
        Self { initial, floor }
    }

    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let scaled = self.initial.saturating_mul(1u32 << exp);
        scaled.max(self.floor)
    }
}

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, d: Duration);
}

/// Real waiting on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, d: Duration) {
        if !d.is_zero() {
            tokio::time::sleep(d).await;
        }
    }
}

// --- Test helper ---
/// Records requested waits instead of sleeping.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    pub waits: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<Duration> {
        self.waits.lock().expect("sleeper mutex poisoned").clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, d: Duration) {
        self.waits.lock().expect("sleeper mutex poisoned").push(d);
    }
}
