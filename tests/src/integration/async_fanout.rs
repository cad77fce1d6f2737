//! # Async Fan-out Flows
//!
//! Concurrent emission, deferred subscriptions, event streams and
//! publishers running on several worker threads.

#[cfg(test)]
mod tests {
    use crate::fixtures::{init_test_logging, CallLog};
    use futures::future::join_all;
    use relay_bus::{
        done, BusConfig, Emission, EventBus, EventPublisher, Handler, HandlerError,
        PublishOptions, SubscribeOptions,
    };
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn test_publish_async_outcomes_follow_dispatch_order() {
        let bus = EventBus::new();
        let log = CallLog::new();

        let low = bus
            .subscribe_with("render", log.handler("low"), SubscribeOptions::new().priority(0))
            .unwrap();
        let high = bus
            .subscribe_with("render", log.deferred("high"), SubscribeOptions::new().priority(9))
            .unwrap();

        let outcomes = bus.publish_async("render", json!({"frame": 1})).await.unwrap();

        let ids: Vec<_> = outcomes.iter().map(|o| o.subscription_id).collect();
        assert_eq!(ids, vec![high.id(), low.id()]);
        assert!(outcomes.iter().all(|o| o.result.is_ok()));
        let mut labels = log.labels();
        labels.sort();
        assert_eq!(labels, vec!["high", "low"]);
    }

    #[tokio::test]
    async fn test_async_failures_are_reported_not_raised() {
        init_test_logging();
        let bus = EventBus::new();
        let log = CallLog::new();

        bus.subscribe_with(
            "upload",
            Handler::from_async(|_, _| async { Err(HandlerError::failed("disk full")) }),
            SubscribeOptions::new().priority(2),
        )
        .unwrap();
        bus.subscribe_with("upload", log.panicking("boom"), SubscribeOptions::new().priority(1))
            .unwrap();
        bus.subscribe("upload", log.deferred("ok")).unwrap();

        let outcomes = bus.publish_async("upload", json!(null)).await.unwrap();

        assert_eq!(outcomes.len(), 3);
        assert_eq!(
            outcomes[0].result,
            Err(HandlerError::Failed("disk full".to_string()))
        );
        assert!(matches!(outcomes[1].result, Err(HandlerError::Panicked(_))));
        assert!(outcomes[2].result.is_ok());
        assert_eq!(bus.metrics().handler_failures, 2);
    }

    #[tokio::test]
    async fn test_async_publish_runs_inline_handlers_before_returning() {
        let bus = EventBus::new();
        let log = CallLog::new();

        bus.subscribe_with("sync:first", log.handler("inline"), SubscribeOptions::new().priority(1))
            .unwrap();
        bus.subscribe_with(
            "sync:first",
            log.handler("deferred"),
            SubscribeOptions::new().priority(5).asynchronous(true),
        )
        .unwrap();

        let emission = bus
            .publish_with("sync:first", json!(1), PublishOptions::asynchronous())
            .unwrap();
        assert!(matches!(emission, Emission::Pending(_)));
        assert_eq!(log.labels(), vec!["inline"]);

        let outcomes = emission.wait().await;
        assert_eq!(outcomes.len(), 2);
        assert_eq!(log.labels(), vec!["inline", "deferred"]);
    }

    #[tokio::test]
    async fn test_async_default_flags_new_subscriptions() {
        let bus = EventBus::with_config(BusConfig::default().with_async_default(true)).unwrap();
        let log = CallLog::new();
        bus.subscribe("x", log.handler("flagged")).unwrap();
        bus.subscribe_with("x", log.handler("inline"), SubscribeOptions::new().asynchronous(false))
            .unwrap();

        let emission = bus.publish_with("x", json!(null), PublishOptions::asynchronous()).unwrap();
        assert_eq!(log.labels(), vec!["inline"]);
        emission.wait().await;
        assert_eq!(log.labels(), vec!["inline", "flagged"]);
    }

    #[tokio::test]
    async fn test_sync_publish_spawns_future_handlers() {
        let bus = EventBus::new();
        let log = CallLog::new();
        bus.subscribe("bg", log.deferred("bg")).unwrap();

        assert_eq!(bus.publish("bg", json!(7)).unwrap(), 1);

        timeout(Duration::from_secs(1), async {
            while log.calls().is_empty() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("spawned handler never ran");
        assert_eq!(log.calls(), vec![("bg".to_string(), json!(7))]);
    }

    #[tokio::test]
    async fn test_once_async_fires_once_under_concurrent_publishes() {
        let bus = EventBus::new();
        let log = CallLog::new();
        bus.once("race", log.deferred("once"), SubscribeOptions::new())
            .unwrap();

        let publishes = (0..10).map(|i| {
            let bus = bus.clone();
            async move { bus.publish_async("race", json!(i)).await }
        });
        let results = join_all(publishes).await;

        let delivered: usize = results.into_iter().map(|r| r.unwrap().len()).sum();
        assert_eq!(delivered, 1);
        assert_eq!(log.labels(), vec!["once"]);
        assert_eq!(bus.listener_count(Some("race")), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_publishers_share_one_bus() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        bus.subscribe(
            "metrics:*",
            Handler::sync(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                done()
            }),
        )
        .unwrap();

        let tasks: Vec<_> = (0..8)
            .map(|worker| {
                let bus = bus.clone();
                tokio::spawn(async move {
                    for i in 0..50 {
                        bus.publish(&format!("metrics:w{worker}"), json!(i)).unwrap();
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(seen.load(Ordering::SeqCst), 400);
        assert_eq!(bus.metrics().events_published, 400);
        assert_eq!(bus.history().len(), 400);
    }

    #[tokio::test]
    async fn test_stream_receives_namespace_events() {
        let bus = EventBus::new();
        let stream = bus.stream("orders:*").unwrap();

        let publisher = bus.clone();
        tokio::spawn(async move {
            for i in 0..3 {
                publisher.publish("orders:created", json!(i)).unwrap();
                publisher.publish("users:created", json!(i)).unwrap();
            }
        });

        let data: Vec<_> = timeout(
            Duration::from_secs(1),
            stream.take(3).map(|e| e.data).collect::<Vec<_>>(),
        )
        .await
        .expect("timeout");
        assert_eq!(data, vec![json!(0), json!(1), json!(2)]);
        assert_eq!(bus.listener_count(None), 0);
    }

    #[tokio::test]
    async fn test_publisher_trait_object() {
        let bus = EventBus::new();
        let log = CallLog::new();
        bus.subscribe("via:trait", log.deferred("t")).unwrap();

        let publisher: Arc<dyn EventPublisher> = Arc::new(bus.clone());
        let outcomes = publisher.publish_async("via:trait", json!("x")).await.unwrap();

        assert_eq!(outcomes.len(), 1);
        assert_eq!(publisher.events_published(), 1);
        assert_eq!(log.labels(), vec!["t"]);
    }
}
