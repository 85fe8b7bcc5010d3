#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::{Level, LevelFilter, Log, Metadata, Record};
use once_cell::sync::Lazy;
use parking_lot::Mutex;

struct CaptureLogger {
    records: Mutex<Vec<(Level, String)>>,
}

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        self.records
            .lock()
            .push((record.level(), format!("{}: {}", record.target(), record.args())));
    }

    fn flush(&self) {}
}

static LOGGER: Lazy<CaptureLogger> = Lazy::new(|| CaptureLogger {
    records: Mutex::new(Vec::new()),
});

/// Installs the capturing logger for this test binary.
pub fn capture_logs() {
    if log::set_logger(&*LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Trace);
    }
}

/// Captured messages at `level` containing `needle`.
pub fn logged(level: Level, needle: &str) -> Vec<String> {
    LOGGER
        .records
        .lock()
        .iter()
        .filter(|(recorded, message)| *recorded == level && message.contains(needle))
        .map(|(_, message)| message.clone())
        .collect()
}

/// Counter shared with a dispose notify.
pub fn dispose_counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
    let count = Arc::new(AtomicUsize::new(0));
    let notify = {
        let count = Arc::clone(&count);
        move || {
            count.fetch_add(1, Ordering::SeqCst);
        }
    };
    (count, notify)
}
