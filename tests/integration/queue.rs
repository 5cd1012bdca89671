use crate::shared::*;
use opstore::{Config, JobPriority, RequeueOutcome};
use serde_json::json;
use testresult::TestResult;

#[tokio::test]
async fn test_enqueue_dequeue_round_trip() -> TestResult {
    let queue = setup().queue();

    let id = queue
        .enqueue("emails", json!({"to": "a@b.c"}), JobPriority::Normal)
        .await
        .expect("enqueue failed");

    let job = queue.dequeue(&["emails"], 1.0).await.expect("no job");
    assert_eq!(job.id, id);
    assert_eq!(job.queue, "emails");
    assert_eq!(job.priority, JobPriority::Normal);
    assert_eq!(job.payload, json!({"to": "a@b.c"}));
    assert_eq!(job.attempts, 0);

    Ok(())
}

#[tokio::test]
async fn test_fifo_within_priority() -> TestResult {
    let queue = setup().queue();

    let first = queue.enqueue("q", json!(1), JobPriority::Normal).await.unwrap();
    let second = queue.enqueue("q", json!(2), JobPriority::Normal).await.unwrap();

    assert_eq!(queue.dequeue(&["q"], 1.0).await.unwrap().id, first);
    assert_eq!(queue.dequeue(&["q"], 1.0).await.unwrap().id, second);

    Ok(())
}

#[tokio::test]
async fn test_priority_ordering() -> TestResult {
    let queue = setup().queue();

    queue.enqueue("q", json!("low"), JobPriority::Low).await.unwrap();
    queue.enqueue("q", json!("normal"), JobPriority::Normal).await.unwrap();
    queue.enqueue("q", json!("urgent"), JobPriority::Urgent).await.unwrap();
    queue.enqueue("q", json!("high"), JobPriority::High).await.unwrap();

    assert_eq!(queue.dequeue(&["q"], 1.0).await.unwrap().payload, json!("urgent"));
    assert_eq!(queue.dequeue(&["q"], 1.0).await.unwrap().payload, json!("high"));
    assert_eq!(queue.dequeue(&["q"], 1.0).await.unwrap().payload, json!("normal"));
    assert_eq!(queue.dequeue(&["q"], 1.0).await.unwrap().payload, json!("low"));

    Ok(())
}

#[tokio::test]
async fn test_dequeue_timeout_returns_none() -> TestResult {
    let queue = setup().queue();

    assert!(queue.dequeue(&["empty"], 0.1).await.is_none());

    Ok(())
}

#[tokio::test]
async fn test_requeue_schedules_retry() -> TestResult {
    let queue = setup().queue();

    queue.enqueue("q", json!(1), JobPriority::Normal).await.unwrap();
    let job = queue.dequeue(&["q"], 1.0).await.unwrap();

    let outcome = queue.requeue(&job).await.expect("requeue failed");
    assert!(matches!(outcome, RequeueOutcome::Scheduled { .. }));

    let stats = queue.stats("q").await;
    assert_eq!(stats.total_pending, 0);
    assert_eq!(stats.delayed, 1);
    assert_eq!(stats.dead_lettered, 0);

    Ok(())
}

#[tokio::test]
async fn test_requeue_dead_letters_after_max_attempts() -> TestResult {
    let config = Config {
        max_attempts: 1,
        ..Config::default()
    };
    let queue = setup_with(config).queue();

    queue.enqueue("q", json!(1), JobPriority::Normal).await.unwrap();
    let job = queue.dequeue(&["q"], 1.0).await.unwrap();

    let outcome = queue.requeue(&job).await.expect("requeue failed");
    assert_eq!(outcome, RequeueOutcome::DeadLettered);

    let stats = queue.stats("q").await;
    assert_eq!(stats.delayed, 0);
    assert_eq!(stats.dead_lettered, 1);

    Ok(())
}

#[tokio::test]
async fn test_promote_delayed_redelivers_due_jobs() -> TestResult {
    // zero backoff makes a scheduled retry due immediately
    let config = Config {
        base_retry_delay: std::time::Duration::ZERO,
        ..Config::default()
    };
    let queue = setup_with(config).queue();

    queue.enqueue("q", json!("flaky"), JobPriority::Normal).await.unwrap();
    let job = queue.dequeue(&["q"], 1.0).await.unwrap();
    queue.requeue(&job).await.unwrap();

    assert_eq!(queue.promote_delayed("q").await, 1);

    let redelivered = queue.dequeue(&["q"], 1.0).await.expect("not redelivered");
    assert_eq!(redelivered.id, job.id);
    assert_eq!(redelivered.attempts, 1);

    Ok(())
}

#[tokio::test]
async fn test_concurrent_promotion_does_not_duplicate_jobs() -> TestResult {
    let config = Config {
        base_retry_delay: std::time::Duration::ZERO,
        ..Config::default()
    };
    let client = setup_with(config);
    let queue = client.queue();

    for i in 0..10 {
        queue.enqueue("q", json!(i), JobPriority::Normal).await.unwrap();
    }
    for _ in 0..10 {
        let job = queue.dequeue(&["q"], 1.0).await.unwrap();
        queue.requeue(&job).await.unwrap();
    }
    assert_eq!(queue.stats("q").await.delayed, 10);

    // two promoters race over the same delayed list; each job must be
    // handed to exactly one of them
    let a = client.queue();
    let b = client.queue();
    let (promoted_a, promoted_b) = tokio::join!(
        tokio::spawn(async move { a.promote_delayed("q").await }),
        tokio::spawn(async move { b.promote_delayed("q").await }),
    );
    assert_eq!(promoted_a? + promoted_b?, 10);

    let stats = queue.stats("q").await;
    assert_eq!(stats.total_pending, 10);
    assert_eq!(stats.delayed, 0);

    Ok(())
}

#[tokio::test]
async fn test_promote_delayed_leaves_future_jobs() -> TestResult {
    let queue = setup().queue();

    queue.enqueue("q", json!(1), JobPriority::Normal).await.unwrap();
    let job = queue.dequeue(&["q"], 1.0).await.unwrap();
    // default backoff is 60s, so the retry is not yet due
    queue.requeue(&job).await.unwrap();

    assert_eq!(queue.promote_delayed("q").await, 0);
    assert_eq!(queue.stats("q").await.delayed, 1);

    Ok(())
}

#[tokio::test]
async fn test_stats_counts_per_priority() -> TestResult {
    let queue = setup().queue();

    queue.enqueue("q", json!(1), JobPriority::Urgent).await.unwrap();
    queue.enqueue("q", json!(2), JobPriority::Urgent).await.unwrap();
    queue.enqueue("q", json!(3), JobPriority::Low).await.unwrap();

    let stats = queue.stats("q").await;
    assert_eq!(stats.queue, "q");
    assert_eq!(stats.total_pending, 3);

    let urgent = stats
        .pending
        .iter()
        .find(|p| p.priority == JobPriority::Urgent)
        .unwrap();
    assert_eq!(urgent.count, 2);

    let normal = stats
        .pending
        .iter()
        .find(|p| p.priority == JobPriority::Normal)
        .unwrap();
    assert_eq!(normal.count, 0);

    Ok(())
}

#[tokio::test]
async fn test_dequeue_covers_multiple_queues() -> TestResult {
    let queue = setup().queue();

    queue.enqueue("pdf", json!("doc"), JobPriority::Normal).await.unwrap();

    let job = queue.dequeue(&["mail", "pdf"], 1.0).await.unwrap();
    assert_eq!(job.queue, "pdf");

    Ok(())
}
