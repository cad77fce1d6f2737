//! # History & Replay Flows
//!
//! Bounded history retention and chronological replay through the
//! dispatcher without growing history.

#[cfg(test)]
mod tests {
    use crate::fixtures::CallLog;
    use relay_bus::{BusConfig, EventBus, ReplayFilter, SubscribeOptions};
    use serde_json::json;
    use std::time::{Duration, SystemTime};

    fn bus_with_capacity(capacity: usize) -> EventBus {
        EventBus::with_config(BusConfig::default().with_history_capacity(capacity)).unwrap()
    }

    #[test]
    fn test_history_evicts_oldest_in_order() {
        let bus = bus_with_capacity(5);
        for i in 0..12 {
            bus.publish("seq", json!(i)).unwrap();
        }

        let data: Vec<_> = bus.history().into_iter().map(|e| e.data).collect();
        assert_eq!(data, vec![json!(7), json!(8), json!(9), json!(10), json!(11)]);
        assert_eq!(bus.stats().history_len, 5);
    }

    #[test]
    fn test_replay_namespace_in_chronological_order() {
        let bus = EventBus::new();
        bus.publish("chat:message", json!(1)).unwrap();
        bus.publish("user:login", json!(2)).unwrap();
        bus.publish("chat", json!(3)).unwrap();
        bus.publish("chatter", json!(4)).unwrap();
        bus.publish("chat:typing", json!(5)).unwrap();

        let log = CallLog::new();
        bus.subscribe_any(log.handler("any"));

        let replayed = bus.replay(&ReplayFilter::topic("chat"));

        assert_eq!(replayed, 3);
        let data: Vec<_> = log.calls().into_iter().map(|(_, d)| d).collect();
        assert_eq!(data, vec![json!(1), json!(3), json!(5)]);
        assert_eq!(bus.history().len(), 5);
    }

    #[test]
    fn test_replay_reapplies_priority_per_event() {
        let bus = EventBus::new();
        bus.publish("job:a", json!("first")).unwrap();
        bus.publish("job:b", json!("second")).unwrap();

        let log = CallLog::new();
        bus.subscribe_with("job:*", log.handler("low"), SubscribeOptions::new().priority(1))
            .unwrap();
        bus.subscribe_with("job:*", log.handler("high"), SubscribeOptions::new().priority(5))
            .unwrap();

        assert_eq!(bus.replay(&ReplayFilter::all()), 2);
        assert_eq!(
            log.calls(),
            vec![
                ("high".to_string(), json!("first")),
                ("low".to_string(), json!("first")),
                ("high".to_string(), json!("second")),
                ("low".to_string(), json!("second")),
            ]
        );
    }

    #[test]
    fn test_replay_time_bounds_are_inclusive() {
        let bus = EventBus::new();
        for i in 0..4 {
            bus.publish("tick", json!(i)).unwrap();
        }
        let history = bus.history();
        let since = history[1].timestamp;
        let until = history[2].timestamp;
        let expected = history
            .iter()
            .filter(|e| e.timestamp >= since && e.timestamp <= until)
            .count();

        let log = CallLog::new();
        bus.subscribe("tick", log.handler("tick")).unwrap();

        let replayed = bus.replay(&ReplayFilter::all().since(since).until(until));
        assert!(expected >= 2);
        assert_eq!(replayed, expected);
        assert_eq!(log.calls().len(), expected);
    }

    #[test]
    fn test_inverted_window_replays_nothing() {
        let bus = EventBus::new();
        bus.publish("tick", json!(0)).unwrap();
        let log = CallLog::new();
        bus.subscribe("tick", log.handler("tick")).unwrap();

        let now = SystemTime::now();
        let filter = ReplayFilter::all()
            .since(now)
            .until(now - Duration::from_secs(60));

        assert_eq!(bus.replay(&filter), 0);
        assert!(log.calls().is_empty());
    }

    #[test]
    fn test_replay_counts_as_publish_but_not_history() {
        let bus = EventBus::new();
        bus.publish("audit", json!(1)).unwrap();

        bus.replay(&ReplayFilter::topic("audit"));

        assert_eq!(bus.history().len(), 1);
        assert_eq!(bus.publish_count("audit"), 2);
    }

    #[test]
    fn test_recent_events_and_clear() {
        let bus = EventBus::new();
        for topic in ["a", "b", "c"] {
            bus.publish(topic, json!(null)).unwrap();
        }

        let recent: Vec<_> = bus.recent_events(2).into_iter().map(|e| e.topic).collect();
        assert_eq!(recent, vec!["c", "b"]);

        bus.clear_history();
        assert!(bus.history().is_empty());
        assert!(bus.event_counts().is_empty());
        assert_eq!(bus.replay(&ReplayFilter::all()), 0);
    }
}
