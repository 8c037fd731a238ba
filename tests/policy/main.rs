#[path = "../support.rs"]
mod support;

use execution_policy::{
    BoxError, CapacityExceeded, Cancelled, DefaultPolicy, ExecutionPolicy,
    ExponentialRetryOptions, ExponentialRetryPolicy, LeakyBucket, LeakyBucketPolicy, OverflowMode,
    Policy, PolicyConfig, RequiresOptions, RetriesExhausted, Transient,
};
use std::{sync::Arc, time::Duration};
use support::{assert_gaps, assert_is, bucket_options, Calls};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[tokio::test(start_paused = true)]
async fn default_policy_runs_once() {
    let _t = support::trace_init();

    let token = CancellationToken::new();
    let calls = Calls::new();

    let error = DefaultPolicy::new()
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
    assert_is::<Transient>(&error);
}

#[tokio::test(start_paused = true)]
async fn leaky_bucket_policy_throttles_work() {
    let _t = support::trace_init();

    let policy = LeakyBucketPolicy::from_options(bucket_options(
        1.0,
        1.0,
        2.0,
        OverflowMode::Enqueue,
    ))
    .unwrap();
    let token = CancellationToken::new();
    let calls = Calls::new();

    for _ in 0..3 {
        policy
            .execute(
                || {
                    calls.record();
                    async { Ok::<_, BoxError>(()) }
                },
                1,
                &token,
            )
            .await
            .unwrap();
    }

    assert_gaps(&calls.gaps(), &[500, 500]);
}

#[tokio::test(start_paused = true)]
async fn refused_work_never_runs() {
    let _t = support::trace_init();

    let bucket = LeakyBucket::new(bucket_options(
        0.0,
        5.0,
        1.0,
        OverflowMode::RejectImmediately,
    ))
    .unwrap();
    let policy = LeakyBucketPolicy::new(bucket);
    let token = CancellationToken::new();
    let calls = Calls::new();

    let error = policy
        .execute(
            || {
                calls.record();
                async { Ok::<_, BoxError>(()) }
            },
            1,
            &token,
        )
        .await
        .unwrap_err();

    assert!(assert_is::<CapacityExceeded>(&error).is_rejected());
    assert_eq!(calls.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancelled_while_throttled() {
    let _t = support::trace_init();

    let policy = LeakyBucketPolicy::from_options(bucket_options(
        0.0,
        5.0,
        1.0,
        OverflowMode::Enqueue,
    ))
    .unwrap();
    let token = CancellationToken::new();
    let calls = Calls::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        canceller.cancel();
    });

    let error = policy
        .execute(
            || {
                calls.record();
                async { Ok::<_, BoxError>(()) }
            },
            1,
            &token,
        )
        .await
        .unwrap_err();

    assert_is::<Cancelled>(&error);
    assert_eq!(calls.count(), 0);
    assert_eq!(policy.bucket().pending_requests(), 0);
}

#[tokio::test(start_paused = true)]
async fn built_from_config() {
    let _t = support::trace_init();

    let policy = Policy::from_config(PolicyConfig::LeakyBucket(bucket_options(
        2.0,
        2.0,
        1.0,
        OverflowMode::DropNewest,
    )))
    .unwrap();
    assert!(matches!(policy, Policy::LeakyBucket(_)));

    let token = CancellationToken::new();
    let work = || async { Ok::<_, BoxError>("ok") };

    assert_eq!(policy.execute(work, 2, &token).await.unwrap(), "ok");
    let error = policy.execute(work, 1, &token).await.unwrap_err();
    assert!(assert_is::<CapacityExceeded>(&error).is_dropped());
}

#[test]
fn invalid_config_is_rejected_up_front() {
    let config = PolicyConfig::LeakyBucket(bucket_options(
        0.0,
        10.0,
        0.0,
        OverflowMode::Enqueue,
    ));

    // Validation runs before the bucket's worker would be spawned, so no
    // runtime is needed to observe the error.
    let error = Policy::from_config(config).unwrap_err();
    assert_eq!(error.field(), "restore_rate_per_second");
    assert_eq!(error.constraint(), "must be > 0");
}

/// Retry around throttle: every retry waits for bucket capacity again.
#[tokio::test(start_paused = true)]
async fn retry_around_throttle() {
    let _t = support::trace_init();

    let throttle = LeakyBucketPolicy::from_options(bucket_options(
        1.0,
        1.0,
        1.0,
        OverflowMode::Enqueue,
    ))
    .unwrap();
    let retry = ExponentialRetryPolicy::from_options(ExponentialRetryOptions {
        max_attempts: 2,
        base_delay: Duration::from_millis(100),
        max_delay: Duration::from_secs(1),
        jitter: 0.0,
    })
    .unwrap();

    let token = CancellationToken::new();
    let calls = Calls::new();
    let start = Instant::now();

    let error = retry
        .execute(
            || {
                throttle.execute(
                    || {
                        calls.record();
                        async { Err::<(), _>(Transient::new("reset")) }
                    },
                    1,
                    &token,
                )
            },
            1,
            &token,
        )
        .await
        .unwrap_err();

    let exhausted = assert_is::<RetriesExhausted>(&error);
    assert_eq!(exhausted.attempts(), 2);
    assert_eq!(calls.count(), 3);

    // Attempts two and three each waited a full second for capacity.
    assert!(start.elapsed() >= Duration::from_millis(1990));
    for gap in calls.gaps() {
        assert!(gap >= Duration::from_millis(990), "{:?}", gap);
    }
}

#[tokio::test(start_paused = true)]
async fn shared_between_tasks() {
    let _t = support::trace_init();

    let policy = Arc::new(Policy::from(DefaultPolicy::new()));

    let tasks: Vec<_> = (0..4)
        .map(|i| {
            let policy = policy.clone();
            tokio::spawn(async move {
                let token = CancellationToken::new();
                policy
                    .execute(move || async move { Ok::<_, BoxError>(i) }, 1, &token)
                    .await
                    .unwrap()
            })
        })
        .collect();

    for (i, task) in tasks.into_iter().enumerate() {
        assert_eq!(task.await.unwrap(), i);
    }
}
