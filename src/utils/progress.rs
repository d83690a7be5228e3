use std::sync::Mutex;

/// Receives upload progress as a percentage in `0..=100`.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, percent: u8);
}

impl<F> ProgressObserver for F
where
    F: Fn(u8) + Send + Sync,
{
    fn on_progress(&self, percent: u8) {
        self(percent)
    }
}

/// Observer that discards every update.
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&self, _percent: u8) {}
}

/// Wraps an observer so it only ever sees non-decreasing values clamped to 100.
pub struct MonotonicProgress<'a> {
    inner: &'a dyn ProgressObserver,
    last: Mutex<Option<u8>>,
}

impl<'a> MonotonicProgress<'a> {
    pub fn new(inner: &'a dyn ProgressObserver) -> Self {
        Self {
            inner,
            last: Mutex::new(None),
        }
    }

    /// Reports `done` out of `total` bytes.
    pub fn report_bytes(&self, done: u64, total: u64) {
        let percent = if total == 0 {
            100
        } else {
            ((done.min(total) * 100) / total) as u8
        };
        self.report(percent);
    }

    pub fn report(&self, percent: u8) {
        let percent = percent.min(100);
        let mut last = match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if matches!(*last, Some(prev) if prev >= percent) {
            return;
        }
        *last = Some(percent);
        drop(last);
        self.inner.on_progress(percent);
    }
}

impl ProgressObserver for MonotonicProgress<'_> {
    fn on_progress(&self, percent: u8) {
        self.report(percent);
    }
}
