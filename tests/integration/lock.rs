use crate::shared::*;
use opstore::{LockOptions, OpstoreError};
use std::time::Duration;
use testresult::TestResult;

fn fast_options() -> LockOptions {
    LockOptions {
        ttl: Duration::from_secs(5),
        blocking_timeout: Duration::from_millis(300),
        retry_interval: Duration::from_millis(50),
    }
}

#[tokio::test]
async fn test_acquire_and_release() -> TestResult {
    let locks = setup().locks();

    let guard = locks.acquire("report", fast_options()).await?;
    assert_eq!(guard.name(), "report");
    assert!(guard.release().await?);

    Ok(())
}

#[tokio::test]
async fn test_mutual_exclusion() -> TestResult {
    let locks = setup().locks();

    let guard = locks.acquire("exclusive", fast_options()).await?;

    let contender = locks.acquire("exclusive", fast_options()).await;
    assert!(matches!(
        contender,
        Err(OpstoreError::LockTimeout { .. })
    ));

    guard.release().await?;

    // released lock is immediately acquirable again
    let reacquired = locks.acquire("exclusive", fast_options()).await?;
    reacquired.release().await?;

    Ok(())
}

#[tokio::test]
async fn test_distinct_names_do_not_contend() -> TestResult {
    let locks = setup().locks();

    let a = locks.acquire("alpha", fast_options()).await?;
    let b = locks.acquire("beta", fast_options()).await?;

    a.release().await?;
    b.release().await?;

    Ok(())
}

#[tokio::test]
async fn test_acquire_waits_for_release() -> TestResult {
    let client = setup();
    let locks = client.locks();

    let guard = locks.acquire("handoff", fast_options()).await?;

    let contender = client.locks();
    let waiter = tokio::spawn(async move {
        let options = LockOptions {
            blocking_timeout: Duration::from_secs(3),
            ..fast_options()
        };
        contender.acquire("handoff", options).await
    });

    tokio::time::sleep(Duration::from_millis(150)).await;
    guard.release().await?;

    let acquired = waiter.await??;
    acquired.release().await?;

    Ok(())
}

#[tokio::test]
async fn test_expired_lock_is_not_released_by_stale_guard() -> TestResult {
    let locks = setup().locks();

    let options = LockOptions {
        ttl: Duration::from_secs(1),
        ..fast_options()
    };
    let stale = locks.acquire("volatile", options).await?;

    tokio::time::sleep(Duration::from_millis(1200)).await;

    // the key expired and may belong to someone else now
    let successor = locks.acquire("volatile", fast_options()).await?;
    assert!(!stale.release().await?);
    assert!(successor.release().await?);

    Ok(())
}

#[tokio::test]
async fn test_with_lock_runs_critical_section() -> TestResult {
    let client = setup();

    let result = client
        .locks()
        .with_lock("guarded", fast_options(), || async { 40 + 2 })
        .await?;
    assert_eq!(result, 42);

    // the lock is free again afterwards
    let guard = client.locks().acquire("guarded", fast_options()).await?;
    guard.release().await?;

    Ok(())
}
