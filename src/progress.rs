//! Transfer progress reporting.
//!
//! Observers are a best-effort side channel: they are called synchronously on
//! the transferring thread and have no way to fail or alter a transfer.

use tracing::info;

/// Granularity of [`ProgressObserver::on_step`], in percent.
const STEP_PERCENT: u64 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Download,
    Upload,
}

impl Direction {
    pub fn verb(&self) -> &'static str {
        match self {
            Direction::Download => "Reading",
            Direction::Upload => "Writing",
        }
    }
}

pub trait ProgressObserver: Send + Sync {
    /// Called once per transfer, before any bytes move.
    fn on_start(&self, _direction: Direction, _bucket: &str, _key: &str, _total: u64) {}

    /// `transferred` never decreases within one transfer.
    fn on_progress(&self, _transferred: u64, _total: u64) {}

    /// Called once per 10% boundary crossed by one transfer. Boundaries are
    /// tracked per transfer, so one observer can serve concurrent transfers.
    fn on_step(&self, _percent: u64, _transferred: u64, _total: u64) {}
}

/// Per-transfer byte counter handed to a backend.
pub struct Progress<'a> {
    observer: Option<&'a dyn ProgressObserver>,
    transferred: u64,
    total: u64,
    last_step: u64,
}

impl<'a> Progress<'a> {
    pub fn new(observer: Option<&'a dyn ProgressObserver>) -> Self {
        Self {
            observer,
            transferred: 0,
            total: 0,
            last_step: 0,
        }
    }

    pub fn start(&mut self, direction: Direction, bucket: &str, key: &str, total: u64) {
        self.transferred = 0;
        self.total = total;
        self.last_step = 0;
        if let Some(observer) = self.observer {
            observer.on_start(direction, bucket, key, total);
        }
    }

    pub fn advance(&mut self, bytes: u64) {
        self.transferred = self.transferred.saturating_add(bytes);
        let Some(observer) = self.observer else {
            return;
        };

        observer.on_progress(self.transferred, self.total);

        let step = self.percent() / STEP_PERCENT;
        if step > self.last_step {
            self.last_step = step;
            observer.on_step(step * STEP_PERCENT, self.transferred, self.total);
        }
    }

    /// Share of `total` transferred so far, capped at 100.
    pub fn percent(&self) -> u64 {
        if self.total == 0 {
            return 100;
        }
        (self.transferred.saturating_mul(100) / self.total).min(100)
    }

    pub fn transferred(&self) -> u64 {
        self.transferred
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}

/// Logs progress in 10% steps.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl TracingObserver {
    pub fn new() -> Self {
        Self
    }
}

impl ProgressObserver for TracingObserver {
    fn on_start(&self, direction: Direction, bucket: &str, key: &str, total: u64) {
        info!(bucket = bucket, key = key, total_bytes = total, "{}...", direction.verb());
    }

    fn on_step(&self, percent: u64, transferred: u64, total: u64) {
        info!(transferred_bytes = transferred, total_bytes = total, "{}%", percent);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub(crate) struct RecordingObserver {
        pub starts: Mutex<Vec<(Direction, String, u64)>>,
        pub updates: Mutex<Vec<(u64, u64)>>,
        pub steps: Mutex<Vec<(u64, u64)>>,
    }

    impl ProgressObserver for RecordingObserver {
        fn on_start(&self, direction: Direction, _bucket: &str, key: &str, total: u64) {
            self.starts
                .lock()
                .unwrap()
                .push((direction, key.to_string(), total));
        }

        fn on_progress(&self, transferred: u64, total: u64) {
            self.updates.lock().unwrap().push((transferred, total));
        }

        fn on_step(&self, percent: u64, _transferred: u64, total: u64) {
            self.steps.lock().unwrap().push((percent, total));
        }
    }

    #[test]
    fn test_progress_accumulates() {
        let observer = RecordingObserver::default();
        let mut progress = Progress::new(Some(&observer));

        progress.start(Direction::Upload, "bucket", "key.csv", 10);
        progress.advance(4);
        progress.advance(6);

        assert_eq!(progress.transferred(), 10);
        assert_eq!(progress.total(), 10);
        assert_eq!(
            *observer.starts.lock().unwrap(),
            vec![(Direction::Upload, "key.csv".to_string(), 10)]
        );
        assert_eq!(*observer.updates.lock().unwrap(), vec![(4, 10), (10, 10)]);
    }

    #[test]
    fn test_progress_without_observer() {
        let mut progress = Progress::new(None);
        progress.start(Direction::Download, "bucket", "key.csv", 3);
        progress.advance(3);
        assert_eq!(progress.transferred(), 3);
        assert_eq!(progress.percent(), 100);
    }

    #[test]
    fn test_progress_steps() {
        let observer = RecordingObserver::default();
        let mut progress = Progress::new(Some(&observer));
        progress.start(Direction::Download, "bucket", "key.csv", 200);

        let cases = vec![(10, 5, 0), (15, 12, 10), (5, 15, 10), (175, 100, 100), (0, 100, 100)];

        for (bytes, expected_percent, expected_step) in cases {
            progress.advance(bytes);
            assert_eq!(progress.percent(), expected_percent, "failed for case: {}", bytes);
            let last = observer.steps.lock().unwrap().last().map(|s| s.0).unwrap_or(0);
            assert_eq!(last, expected_step, "failed for case: {}", bytes);
        }
        assert_eq!(observer.steps.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_concurrent_transfers_step_independently() {
        let observer = RecordingObserver::default();
        let mut first = Progress::new(Some(&observer));
        let mut second = Progress::new(Some(&observer));

        first.start(Direction::Upload, "bucket", "a.csv", 100);
        first.advance(50);
        second.start(Direction::Download, "bucket", "b.csv", 100);
        second.advance(20);
        first.advance(50);
        second.advance(80);

        assert_eq!(
            *observer.steps.lock().unwrap(),
            vec![(50, 100), (20, 100), (100, 100), (100, 100)]
        );
    }

    #[test]
    fn test_empty_transfer_is_complete() {
        let observer = RecordingObserver::default();
        let mut progress = Progress::new(Some(&observer));
        progress.start(Direction::Upload, "bucket", "empty.csv", 0);
        progress.advance(0);

        assert_eq!(*observer.steps.lock().unwrap(), vec![(100, 0)]);
    }
}
