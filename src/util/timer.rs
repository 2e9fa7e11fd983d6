//! Scan-cycle wall-clock timer.

use std::time::Instant;

/// Millisecond stopwatch used by the Scanner to produce `scan_duration_ms`.
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn elapsed_ms_increases() {
        let t = Timer::start();
        sleep(Duration::from_millis(5));
        assert!(t.elapsed_ms() >= 5);
    }
}
