//! Wall-clock access, injectable so retention and archive naming can be tested.

use chrono::{DateTime, Local};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// The real system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock frozen at a single instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Local>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        self.0
    }
}
