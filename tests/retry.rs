mod support;

use std::thread;
use std::time::{Duration, Instant};

use geo_refdata::{
    execute_with_retry, CancellationToken, Cancelled, ClassifiedError, Country, ErrorCode,
    HashMapStore, RetryError, RetryExecutor, RetryPolicy, TenantExt,
};
use support::{united_states, FlakyStore};

#[test]
fn invokes_until_success_with_documented_delays() {
    let policy = RetryPolicy::new(
        4,
        Duration::from_millis(20),
        Duration::from_millis(50),
        2.0,
    );
    let mut stamps = Vec::new();

    let result: Result<&str, RetryError<String>> =
        RetryExecutor::new(policy.clone()).run(&CancellationToken::new(), || {
            stamps.push(Instant::now());
            if stamps.len() < 4 {
                Err(format!("attempt {} failed", stamps.len()))
            } else {
                Ok("done")
            }
        });

    assert_eq!(result.unwrap(), "done");
    assert_eq!(stamps.len(), 4);

    // 20ms, 40ms, then capped at 50ms.
    let expected = [20, 40, 50];
    for (i, window) in stamps.windows(2).enumerate() {
        let gap = window[1] - window[0];
        assert!(
            gap >= Duration::from_millis(expected[i]),
            "gap {} was {:?}",
            i,
            gap
        );
        assert!(gap < Duration::from_millis(expected[i] + 500));
        assert_eq!(policy.delay_for(i as u32 + 1), Duration::from_millis(expected[i]));
    }
}

#[test]
fn cancelling_during_wait_returns_immediately() {
    let token = CancellationToken::new();
    let remote = token.clone();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        remote.cancel();
    });

    let start = Instant::now();
    let mut calls = 0;
    let result: Result<(), RetryError<&str>> = execute_with_retry(
        5,
        Duration::from_secs(30),
        Duration::from_secs(30),
        2.0,
        &token,
        || {
            calls += 1;
            Err("unavailable")
        },
    );

    assert!(matches!(result, Err(RetryError::Cancelled(Cancelled::Cancelled))));
    assert_eq!(calls, 1);
    assert!(start.elapsed() < Duration::from_secs(5));
    canceller.join().unwrap();
}

#[test]
fn deadline_is_never_overslept() {
    let token = CancellationToken::with_timeout(Duration::from_millis(50));
    let start = Instant::now();

    let result: Result<(), RetryError<&str>> =
        RetryExecutor::new(RetryPolicy::default().with_initial_delay(Duration::from_secs(10)))
            .run(&token, || Err("down"));

    let err = result.unwrap_err();
    assert!(err.is_cancelled());
    assert!(matches!(err, RetryError::Cancelled(Cancelled::DeadlineExceeded)));
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[test]
fn only_transient_errors_are_worth_retrying() {
    let store = FlakyStore::new(HashMapStore::new());
    let us = store
        .tenant::<Country>("tenant-a")
        .create(united_states())
        .unwrap();
    store.fail_next_reads(2);

    let executor = RetryExecutor::new(
        RetryPolicy::default().with_initial_delay(Duration::from_millis(1)),
    );
    let countries = store.tenant::<Country>("tenant-a");

    let found = executor
        .run(&CancellationToken::new(), || countries.get(&us.id))
        .unwrap();
    assert_eq!(found.id, us.id);
    assert_eq!(store.reads(), 3);

    // Three connection failures with three attempts: exhausted.
    store.fail_next_reads(3);
    let err = executor
        .run(&CancellationToken::new(), || countries.get(&us.id))
        .unwrap_err();
    let last: ClassifiedError = err.into_last_error().unwrap();
    assert_eq!(last.code, ErrorCode::Transient);
    assert!(last.retryable);
}
