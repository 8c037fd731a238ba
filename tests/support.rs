#![allow(dead_code)]

use execution_policy::{BoxError, LeakyBucketOptions, OverflowMode};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

pub(crate) fn trace_init() -> tracing::subscriber::DefaultGuard {
    let subscriber = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .with_thread_names(true)
        .finish();
    tracing::subscriber::set_default(subscriber)
}

pub(crate) fn bucket_options(
    initial: f64,
    maximum: f64,
    rate: f64,
    overflow_mode: OverflowMode,
) -> LeakyBucketOptions {
    LeakyBucketOptions {
        initial_capacity: initial,
        maximum_capacity: maximum,
        restore_rate_per_second: rate,
        overflow_mode,
    }
}

/// Records when each call to a unit of work happened, relative to its
/// creation.
#[derive(Clone, Debug)]
pub(crate) struct Calls {
    start: Instant,
    at: Arc<Mutex<Vec<Duration>>>,
}

impl Calls {
    pub(crate) fn new() -> Self {
        Calls {
            start: Instant::now(),
            at: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn record(&self) -> usize {
        let mut at = self.at.lock().unwrap();
        at.push(self.start.elapsed());
        at.len()
    }

    pub(crate) fn count(&self) -> usize {
        self.at.lock().unwrap().len()
    }

    /// Time between consecutive calls.
    pub(crate) fn gaps(&self) -> Vec<Duration> {
        let at = self.at.lock().unwrap();
        at.windows(2).map(|w| w[1] - w[0]).collect()
    }
}

/// The paused clock rounds timers up to the next millisecond.
pub(crate) fn assert_gaps(actual: &[Duration], expected_ms: &[u64]) {
    assert_eq!(actual.len(), expected_ms.len(), "gaps: {:?}", actual);
    for (gap, ms) in actual.iter().zip(expected_ms) {
        let expected = Duration::from_millis(*ms);
        assert!(
            *gap >= expected && *gap <= expected + Duration::from_millis(2),
            "gaps: {:?}, expected {:?}ms",
            actual,
            expected_ms
        );
    }
}

pub(crate) fn assert_is<E: std::error::Error + 'static>(error: &BoxError) -> &E {
    match error.downcast_ref::<E>() {
        Some(e) => e,
        None => panic!(
            "expected {}, got {:?}",
            std::any::type_name::<E>(),
            error
        ),
    }
}
