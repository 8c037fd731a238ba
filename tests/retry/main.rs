#[path = "../support.rs"]
mod support;

use execution_policy::{
    retry::{backoff::FixedBackoffMaker, IsRetryable},
    BoxError, Cancelled, ConfigurationError, ExecutionPolicy, ExponentialRetryOptions,
    ExponentialRetryPolicy, FixedRetryPolicy, RateLimited, RequiresOptions, RetriesExhausted,
    RetryOptions, RetryPolicy, Transient,
};
use std::{io, time::Duration};
use support::{assert_gaps, assert_is, Calls};
use tokio_test::{assert_pending, assert_ready_err, task};
use tokio_util::sync::CancellationToken;

fn exponential(max_attempts: u32) -> ExponentialRetryPolicy {
    ExponentialRetryPolicy::from_options(ExponentialRetryOptions {
        max_attempts,
        base_delay: Duration::from_millis(100),
        max_delay: Duration::from_secs(1),
        jitter: 0.0,
    })
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn exponential_delays_then_exhausted() {
    let _t = support::trace_init();

    let policy = exponential(3);
    let token = CancellationToken::new();
    let calls = Calls::new();

    let error = policy
        .execute(
            || {
                let attempt = calls.record();
                async move { Err::<(), _>(Transient::new(format!("reset {}", attempt))) }
            },
            1,
            &token,
        )
        .await
        .unwrap_err();

    assert_eq!(calls.count(), 4);
    assert_gaps(&calls.gaps(), &[100, 200, 400]);

    let exhausted = assert_is::<RetriesExhausted>(&error);
    assert_eq!(exhausted.attempts(), 3);
    assert_eq!(exhausted.errors().len(), 4);
    assert_eq!(exhausted.last_error().unwrap().to_string(), "transient failure: reset 4");
    assert_eq!(exhausted.errors()[0].to_string(), "transient failure: reset 1");
}

#[tokio::test(start_paused = true)]
async fn delays_are_capped() {
    let _t = support::trace_init();

    let policy = exponential(6);
    let token = CancellationToken::new();
    let calls = Calls::new();

    let _ = policy
        .execute(
            || {
                calls.record();
                async { Err::<(), _>(Transient::new("reset")) }
            },
            1,
            &token,
        )
        .await
        .unwrap_err();

    assert_gaps(&calls.gaps(), &[100, 200, 400, 800, 1000, 1000]);
}

#[tokio::test(start_paused = true)]
async fn fatal_error_is_not_retried() {
    let _t = support::trace_init();

    let policy = exponential(3);
    let token = CancellationToken::new();
    let calls = Calls::new();

    let error = policy
        .execute(
            || {
                calls.record();
                async { Err::<(), BoxError>("invalid sku".into()) }
            },
            1,
            &token,
        )
        .await
        .unwrap_err();

    assert_eq!(calls.count(), 1);
    assert_eq!(error.to_string(), "invalid sku");
    assert!(!error.is::<RetriesExhausted>());
}

#[tokio::test(start_paused = true)]
async fn succeeds_after_transient_failure() {
    let _t = support::trace_init();

    let policy = exponential(3);
    let token = CancellationToken::new();
    let calls = Calls::new();

    let response = policy
        .execute(
            || {
                let attempt = calls.record();
                async move {
                    if attempt < 3 {
                        Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
                    } else {
                        Ok("order created")
                    }
                }
            },
            1,
            &token,
        )
        .await
        .unwrap();

    assert_eq!(response, "order created");
    assert_gaps(&calls.gaps(), &[100, 200]);
}

#[tokio::test(start_paused = true)]
async fn honors_retry_after() {
    let _t = support::trace_init();

    let policy = exponential(3);
    let token = CancellationToken::new();
    let calls = Calls::new();

    let response = policy
        .execute(
            || {
                let attempt = calls.record();
                async move {
                    if attempt == 1 {
                        Err(RateLimited::after(Duration::from_secs(2)))
                    } else {
                        Ok(attempt)
                    }
                }
            },
            1,
            &token,
        )
        .await
        .unwrap();

    assert_eq!(response, 2);
    assert_gaps(&calls.gaps(), &[2000]);
}

#[tokio::test(start_paused = true)]
async fn cancel_during_backoff() {
    let _t = support::trace_init();

    let policy = exponential(3);
    let token = CancellationToken::new();
    let calls = Calls::new();

    let mut fut = task::spawn(policy.execute(
        || {
            calls.record();
            async { Err::<(), _>(Transient::new("reset")) }
        },
        1,
        &token,
    ));

    assert_pending!(fut.poll());
    assert_eq!(calls.count(), 1);

    token.cancel();
    assert!(fut.is_woken());
    let error = assert_ready_err!(fut.poll());
    assert_is::<Cancelled>(&error);
    assert_eq!(calls.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancel_in_flight_attempt() {
    let _t = support::trace_init();

    let policy = exponential(3);
    let token = CancellationToken::new();

    let mut fut = task::spawn(policy.execute(
        || futures::future::pending::<Result<(), BoxError>>(),
        1,
        &token,
    ));
    assert_pending!(fut.poll());

    token.cancel();
    let error = assert_ready_err!(fut.poll());
    assert_is::<Cancelled>(&error);
}

#[tokio::test(start_paused = true)]
async fn fixed_delay() {
    let _t = support::trace_init();

    let policy = FixedRetryPolicy::from_options(RetryOptions {
        max_attempts: 2,
        base_delay: Duration::from_millis(250),
        max_delay: Duration::from_millis(250),
        jitter: 0.0,
    })
    .unwrap();
    let token = CancellationToken::new();
    let calls = Calls::new();

    let error = policy
        .execute(
            || {
                calls.record();
                async { Err::<(), _>(Transient::new("reset")) }
            },
            1,
            &token,
        )
        .await
        .unwrap_err();

    assert_gaps(&calls.gaps(), &[250, 250]);
    assert_eq!(assert_is::<RetriesExhausted>(&error).attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn zero_attempts_never_retries() {
    let _t = support::trace_init();

    let policy = exponential(0);
    let token = CancellationToken::new();
    let calls = Calls::new();

    let error = policy
        .execute(
            || {
                calls.record();
                async { Err::<(), _>(Transient::new("reset")) }
            },
            1,
            &token,
        )
        .await
        .unwrap_err();

    assert_eq!(calls.count(), 1);
    let exhausted = assert_is::<RetriesExhausted>(&error);
    assert_eq!(exhausted.attempts(), 0);
    assert_eq!(exhausted.errors().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn custom_classifier() {
    let _t = support::trace_init();

    let retry_everything = |_: &BoxError| true;
    let policy = RetryPolicy::new(
        1,
        FixedBackoffMaker::new(Duration::from_millis(10), Duration::from_millis(10), 0.0).unwrap(),
    )
    .with_classifier(retry_everything);
    assert!(retry_everything.is_retryable(&"anything".into()));

    let token = CancellationToken::new();
    let calls = Calls::new();

    let error = policy
        .execute(
            || {
                calls.record();
                async { Err::<(), BoxError>("validation failed".into()) }
            },
            1,
            &token,
        )
        .await
        .unwrap_err();

    assert_eq!(calls.count(), 2);
    assert_eq!(assert_is::<RetriesExhausted>(&error).attempts(), 1);
}

#[test]
fn invalid_options_fail_construction() {
    let error: ConfigurationError = ExponentialRetryPolicy::from_options(ExponentialRetryOptions {
        base_delay: Duration::from_secs(5),
        max_delay: Duration::from_secs(1),
        ..ExponentialRetryOptions::default()
    })
    .unwrap_err();
    assert_eq!(error.field(), "base_delay");

    let error = FixedRetryPolicy::from_options(RetryOptions {
        jitter: -0.5,
        ..RetryOptions::default()
    })
    .unwrap_err();
    assert_eq!(error.field(), "jitter");
}

#[test]
fn defaults() {
    let policy = ExponentialRetryPolicy::with_default_options();
    assert_eq!(policy.max_attempts(), 5);

    let policy = FixedRetryPolicy::with_default_options();
    assert_eq!(policy.max_attempts(), 3);
}
