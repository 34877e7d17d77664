use chrono::{DateTime, Utc};

/// Source of the process clock. A seam so tests can freeze time and assert
/// on create/modified dates deterministically.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
