use crate::shared::*;
use serde_json::json;
use testresult::TestResult;

#[tokio::test]
async fn test_set_get_scalar() -> TestResult {
    let cache = setup().cache();

    assert!(cache.set("greeting", &"hello", None).await);
    assert_eq!(cache.get("greeting").await, Some(json!("hello")));
    assert_eq!(cache.get("absent").await, None);

    Ok(())
}

#[tokio::test]
async fn test_set_get_compound() -> TestResult {
    let cache = setup().cache();
    let value = json!({
        "loan_id": 42,
        "applicant": { "name": "Ada", "scores": [710, 725, 698] },
    });

    assert!(cache.set("loan:42", &value, None).await);
    assert_eq!(cache.get("loan:42").await, Some(value));

    Ok(())
}

#[tokio::test]
async fn test_large_values_survive_compression() -> TestResult {
    let cache = setup().cache();
    let value = json!({ "blob": "x".repeat(8 * 1024) });

    assert!(cache.set("big", &value, None).await);
    assert_eq!(cache.get("big").await, Some(value));

    Ok(())
}

#[tokio::test]
async fn test_ttl_expiry() -> TestResult {
    let cache = setup().cache();

    assert!(cache.set("ephemeral", &1, Some(1)).await);
    assert!(cache.exists("ephemeral").await);

    tokio::time::sleep(std::time::Duration::from_millis(1200)).await;

    assert!(!cache.exists("ephemeral").await);
    assert_eq!(cache.get("ephemeral").await, None);

    Ok(())
}

#[tokio::test]
async fn test_default_ttl_applied() -> TestResult {
    let cache = setup().cache();

    cache.set("defaulted", &"v", None).await;
    let ttl = cache.ttl("defaulted").await;
    assert!(ttl > 0 && ttl <= 3600, "unexpected ttl {ttl}");

    Ok(())
}

#[tokio::test]
async fn test_delete() -> TestResult {
    let cache = setup().cache();

    cache.set("doomed", &"v", None).await;
    assert!(cache.delete("doomed").await);
    assert!(!cache.exists("doomed").await);
    assert!(!cache.delete("doomed").await);

    Ok(())
}

#[tokio::test]
async fn test_get_or_default() -> TestResult {
    let cache = setup().cache();

    assert_eq!(cache.get_or("missing", json!(0)).await, json!(0));
    cache.set("present", &7, None).await;
    assert_eq!(cache.get_or("present", json!(0)).await, json!(7));

    Ok(())
}

#[tokio::test]
async fn test_increment_decrement() -> TestResult {
    let cache = setup().cache();

    assert_eq!(cache.increment("counter", 1).await, 1);
    assert_eq!(cache.increment("counter", 5).await, 6);
    assert_eq!(cache.decrement("counter", 2).await, 4);

    Ok(())
}

#[tokio::test]
async fn test_hash_operations() -> TestResult {
    let cache = setup().cache();

    assert!(cache.hset("profile", "name", &"Ada").await);
    assert!(cache.hset("profile", "age", &36).await);

    assert_eq!(cache.hget("profile", "name").await, Some(json!("Ada")));
    assert_eq!(cache.hget("profile", "missing").await, None);

    let all = cache.hgetall("profile").await;
    assert_eq!(all.len(), 2);
    assert_eq!(all.get("age"), Some(&json!(36)));

    assert_eq!(cache.hdel("profile", &["name", "missing"]).await, 1);
    assert_eq!(cache.hgetall("profile").await.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_list_operations() -> TestResult {
    let cache = setup().cache();

    assert_eq!(cache.rpush("events", &"a").await, 1);
    assert_eq!(cache.rpush("events", &"b").await, 2);
    assert_eq!(cache.lpush("events", &"z").await, 3);

    assert_eq!(cache.llen("events").await, 3);
    assert_eq!(
        cache.lrange("events", 0, -1).await,
        vec![json!("z"), json!("a"), json!("b")]
    );

    assert_eq!(cache.lpop("events").await, Some(json!("z")));
    assert_eq!(cache.rpop("events").await, Some(json!("b")));
    assert_eq!(cache.llen("events").await, 1);

    Ok(())
}

#[tokio::test]
async fn test_brpop_returns_logical_key() -> TestResult {
    let cache = setup().cache();

    cache.lpush("inbox", &"first").await;
    let popped = cache.brpop(&["inbox".to_string()], 1.0).await;
    assert_eq!(popped, Some(("inbox".to_string(), json!("first"))));

    // empty list times out without an error
    assert_eq!(cache.brpop(&["inbox".to_string()], 0.1).await, None);

    Ok(())
}

#[tokio::test]
async fn test_set_operations() -> TestResult {
    let cache = setup().cache();

    assert_eq!(cache.sadd("tags", &"rust").await, 1);
    assert_eq!(cache.sadd("tags", &"redis").await, 1);
    assert_eq!(cache.sadd("tags", &"rust").await, 0);

    assert!(cache.sismember("tags", &"rust").await);
    assert!(!cache.sismember("tags", &"go").await);
    assert_eq!(cache.smembers("tags").await.len(), 2);

    assert_eq!(cache.srem("tags", &"rust").await, 1);
    assert!(!cache.sismember("tags", &"rust").await);

    Ok(())
}

#[tokio::test]
async fn test_metrics_track_hits_and_misses() -> TestResult {
    let client = setup();
    let cache = client.cache();

    cache.set("hit", &1, None).await;
    cache.get("hit").await;
    cache.get("miss-1").await;
    cache.get("miss-2").await;

    let snapshot = client.metrics();
    assert_eq!(snapshot.cache_hits, 1);
    assert_eq!(snapshot.cache_misses, 2);
    assert_eq!(snapshot.cache_sets, 1);
    assert!((snapshot.cache_hit_ratio - 33.33).abs() < 0.1);

    Ok(())
}

#[tokio::test]
async fn test_pop_counters_track_only_deliveries() -> TestResult {
    let client = setup();
    let cache = client.cache();

    cache.lpush("work", &"only-item").await;
    assert!(cache.lpop("work").await.is_some());

    // empty-list pops must not count, so pushes and pops stay reconcilable
    assert!(cache.lpop("work").await.is_none());
    assert!(cache.rpop("work").await.is_none());

    let snapshot = client.metrics();
    assert_eq!(snapshot.queue_pushes, 1);
    assert_eq!(snapshot.queue_pops, 1);

    Ok(())
}

#[tokio::test]
async fn test_overlong_keys_are_hashed() -> TestResult {
    let cache = setup().cache();
    let long_key = "k".repeat(600);

    assert!(cache.set(&long_key, &"stored", None).await);
    assert_eq!(cache.get(&long_key).await, Some(json!("stored")));

    Ok(())
}

#[tokio::test]
async fn test_namespaces_are_isolated() -> TestResult {
    let a = setup().cache();
    let b = setup().cache();

    a.set("shared-name", &"a", None).await;
    assert_eq!(b.get("shared-name").await, None);

    Ok(())
}
