//! Live subscription and bootstrap hand-off tests

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect
#![allow(clippy::panic)]

use kitchen_board_core::event_bus::EventBusError;
use kitchen_board_core::event_log::EventLogError;
use kitchen_board_core::ticket::TicketStatus;
use kitchen_board_core::ticket_source::TicketSourceError;
use kitchen_board_projections::{
    BootstrapError, LiveSubscriber, SubscriberError, TicketStateCache, WarmError, WarmSource,
    DEFAULT_TOPIC,
};
use kitchen_board_testing::{fixtures, InMemoryEventBus, InMemoryEventLog, StaticTicketSource};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

async fn wait_for(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

async fn join(handle: JoinHandle<()>) {
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("pump did not stop in time")
        .unwrap();
}

fn live(bus: &InMemoryEventBus) -> (Arc<TicketStateCache>, LiveSubscriber) {
    let cache = Arc::new(TicketStateCache::new());
    let subscriber = LiveSubscriber::new(Arc::clone(&cache), Some(Arc::new(bus.clone())));
    (cache, subscriber)
}

#[tokio::test]
async fn live_events_flow_into_cache() {
    let bus = InMemoryEventBus::new();
    let (cache, subscriber) = live(&bus);
    let handle = subscriber.start().await.unwrap().unwrap();

    bus.publish_event(DEFAULT_TOPIC, &fixtures::created("A", "grill", TicketStatus::Created));
    wait_for(|| cache.contains("A")).await;

    bus.publish_event(DEFAULT_TOPIC, &fixtures::status_changed("A", TicketStatus::Started, 1));
    wait_for(|| cache.get("A").is_some_and(|t| t.status == TicketStatus::Started)).await;
    assert_eq!(cache.get_by_station_and_status("grill", TicketStatus::Started).len(), 1);

    bus.publish_event(DEFAULT_TOPIC, &fixtures::status_changed("A", TicketStatus::Delivered, 2));
    wait_for(|| !cache.contains("A")).await;
    assert!(cache.get_by_status(TicketStatus::Delivered).is_empty());

    subscriber.stop();
    join(handle).await;
}

#[tokio::test]
async fn live_terminal_event_for_unknown_ticket_creates_nothing() {
    let bus = InMemoryEventBus::new();
    let (cache, subscriber) = live(&bus);
    let handle = subscriber.start().await.unwrap().unwrap();

    bus.publish_event(DEFAULT_TOPIC, &fixtures::status_changed("ghost", TicketStatus::Cancelled, 1));
    bus.publish_event(DEFAULT_TOPIC, &fixtures::status_changed("new-ticket", TicketStatus::Started, 2));
    wait_for(|| cache.contains("new-ticket")).await;

    assert!(!cache.contains("ghost"));
    subscriber.stop();
    join(handle).await;
}

#[tokio::test]
async fn malformed_messages_do_not_stop_the_pump() {
    let bus = InMemoryEventBus::new();
    let (cache, subscriber) = live(&bus);
    let handle = subscriber.start().await.unwrap().unwrap();

    bus.deliver(DEFAULT_TOPIC, b"\xff\xfe not json");
    bus.deliver(DEFAULT_TOPIC, br#"{"event_type":"kitchen.ticket.created","ticket_id":42}"#);
    bus.deliver(DEFAULT_TOPIC, br#"{"event_type":"kitchen.table.closed"}"#);
    bus.inject_error(DEFAULT_TOPIC, EventBusError::TransportError("connection reset".into()));
    bus.publish_event(DEFAULT_TOPIC, &fixtures::created("B", "bar", TicketStatus::Ready));

    wait_for(|| cache.contains("B")).await;
    assert_eq!(cache.len(), 1);

    subscriber.stop();
    join(handle).await;
}

#[tokio::test]
async fn stop_ends_the_pump() {
    let bus = InMemoryEventBus::new();
    let (cache, subscriber) = live(&bus);
    let handle = subscriber.start().await.unwrap().unwrap();

    subscriber.stop();
    join(handle).await;
    assert!(subscriber.is_stopped());

    bus.publish_event(DEFAULT_TOPIC, &fixtures::created("late", "grill", TicketStatus::Created));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!cache.contains("late"));
}

#[tokio::test]
async fn dropping_the_subscriber_ends_the_pump() {
    let bus = InMemoryEventBus::new();
    let (_cache, subscriber) = live(&bus);
    let handle = subscriber.start().await.unwrap().unwrap();

    drop(subscriber);

    join(handle).await;
}

#[tokio::test]
async fn stream_end_ends_the_pump() {
    let bus = InMemoryEventBus::new();
    let (_cache, subscriber) = live(&bus);
    let handle = subscriber.start().await.unwrap().unwrap();

    bus.close(DEFAULT_TOPIC);

    join(handle).await;
    assert!(!subscriber.is_stopped());
}

#[tokio::test]
async fn custom_topic_is_used() {
    let bus = InMemoryEventBus::new();
    let cache = Arc::new(TicketStateCache::new());
    let subscriber = LiveSubscriber::new(Arc::clone(&cache), Some(Arc::new(bus.clone())))
        .with_topic("kitchen-staging");
    let handle = subscriber.start().await.unwrap().unwrap();

    assert_eq!(subscriber.topic(), "kitchen-staging");
    assert_eq!(bus.subscriber_count("kitchen-staging"), 1);
    assert_eq!(bus.subscriber_count(DEFAULT_TOPIC), 0);

    subscriber.stop();
    join(handle).await;
}

#[tokio::test]
async fn start_without_bus_is_a_no_op() {
    let cache = Arc::new(TicketStateCache::new());
    let subscriber = LiveSubscriber::new(cache, None);

    assert!(subscriber.start().await.unwrap().is_none());
}

#[tokio::test]
async fn subscribe_failure_is_returned() {
    let bus = InMemoryEventBus::new();
    bus.fail_subscriptions("no such topic");
    let (_cache, subscriber) = live(&bus);

    let err = subscriber.start().await.unwrap_err();

    let SubscriberError::Subscribe { topic, source } = err;
    assert_eq!(topic, DEFAULT_TOPIC);
    assert!(matches!(source, EventBusError::SubscriptionFailed { .. }));
}

#[tokio::test]
async fn bootstrap_keeps_events_published_during_warm_up() {
    let bus = InMemoryEventBus::new();
    let log = InMemoryEventLog::with_events(&[fixtures::created("A", "grill", TicketStatus::Created)]);
    log.delay_by(Duration::from_millis(200));
    let cache = Arc::new(TicketStateCache::new().with_event_log(Arc::new(log)));
    let subscriber = LiveSubscriber::new(Arc::clone(&cache), Some(Arc::new(bus.clone())));

    // Publishes once the subscription exists, while replay is still fetching.
    let publisher = {
        let bus = bus.clone();
        tokio::spawn(async move {
            while bus.subscriber_count(DEFAULT_TOPIC) == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            bus.publish_event(DEFAULT_TOPIC, &fixtures::status_changed("A", TicketStatus::Ready, 5));
            bus.publish_event(DEFAULT_TOPIC, &fixtures::created("B", "bar", TicketStatus::Created));
        })
    };

    let started = subscriber.bootstrap().await.unwrap();
    publisher.await.unwrap();

    assert_eq!(started.report.source, WarmSource::Replay);
    wait_for(|| cache.contains("B")).await;
    assert_eq!(cache.get("A").unwrap().status, TicketStatus::Ready);

    subscriber.stop();
    join(started.handle.unwrap()).await;
}

#[tokio::test]
async fn bootstrap_without_bus_only_warms() {
    let source = StaticTicketSource::new(vec![fixtures::snapshot("A", "grill", TicketStatus::Created)]);
    let cache = Arc::new(TicketStateCache::new().with_ticket_source(Arc::new(source)));
    let subscriber = LiveSubscriber::new(Arc::clone(&cache), None);

    let started = subscriber.bootstrap().await.unwrap();

    assert_eq!(started.report.source, WarmSource::HttpFallback);
    assert!(started.handle.is_none());
    assert!(cache.contains("A"));
}

#[tokio::test]
async fn bootstrap_warms_even_when_subscription_fails() {
    let bus = InMemoryEventBus::new();
    bus.fail_subscriptions("broker down");
    let log = InMemoryEventLog::with_events(&[fixtures::created("A", "grill", TicketStatus::Created)]);
    let cache = Arc::new(TicketStateCache::new().with_event_log(Arc::new(log)));
    let subscriber = LiveSubscriber::new(Arc::clone(&cache), Some(Arc::new(bus)));

    let err = subscriber.bootstrap().await.unwrap_err();

    match err {
        BootstrapError::Subscribe { report, .. } => assert_eq!(report.tickets, 1),
        other => panic!("unexpected error: {other}"),
    }
    assert!(cache.contains("A"));
}

#[tokio::test]
async fn bootstrap_reports_warm_failure() {
    let bus = InMemoryEventBus::new();
    let log = InMemoryEventLog::new();
    log.fail_with(EventLogError::ConnectionFailed("down".into()));
    let source = StaticTicketSource::failing(TicketSourceError::RequestFailed("refused".into()));
    let cache = Arc::new(
        TicketStateCache::new()
            .with_event_log(Arc::new(log))
            .with_ticket_source(Arc::new(source)),
    );
    let subscriber = LiveSubscriber::new(Arc::clone(&cache), Some(Arc::new(bus.clone())));

    let err = subscriber.bootstrap().await.unwrap_err();

    let BootstrapError::Warm { source, subscription } = err else {
        panic!("expected a warm failure");
    };
    assert!(matches!(source, WarmError::Fallback(_)));
    assert!(subscription.is_some());
    assert_eq!(bus.subscriber_count(DEFAULT_TOPIC), 1);

    drop(subscription);
    assert_eq!(bus.subscriber_count(DEFAULT_TOPIC), 0);
}

#[tokio::test]
async fn events_published_during_failed_warm_up_are_kept() {
    let bus = InMemoryEventBus::new();
    let log = InMemoryEventLog::new();
    log.delay_by(Duration::from_millis(50));
    log.fail_with(EventLogError::ConnectionFailed("down".into()));
    let source = StaticTicketSource::failing(TicketSourceError::RequestFailed("refused".into()));
    let cache = Arc::new(
        TicketStateCache::new()
            .with_event_log(Arc::new(log))
            .with_ticket_source(Arc::new(source)),
    );
    let subscriber = LiveSubscriber::new(Arc::clone(&cache), Some(Arc::new(bus.clone())));

    let (result, ()) = tokio::join!(subscriber.bootstrap(), async {
        wait_for(|| bus.subscriber_count(DEFAULT_TOPIC) == 1).await;
        bus.publish_event(DEFAULT_TOPIC, &fixtures::created("A", "grill", TicketStatus::Created));
    });

    let Err(BootstrapError::Warm { subscription: Some(subscription), .. }) = result else {
        panic!("expected a warm failure carrying the subscription");
    };
    let handle = subscription.spawn();

    wait_for(|| cache.contains("A")).await;
    assert_eq!(cache.get_by_station("grill").len(), 1);

    subscriber.stop();
    join(handle).await;
}

#[tokio::test]
async fn failed_warm_up_without_bus_carries_no_subscription() {
    let log = InMemoryEventLog::new();
    log.fail_with(EventLogError::ConnectionFailed("down".into()));
    let source = StaticTicketSource::failing(TicketSourceError::RequestFailed("refused".into()));
    let cache = Arc::new(
        TicketStateCache::new()
            .with_event_log(Arc::new(log))
            .with_ticket_source(Arc::new(source)),
    );
    let subscriber = LiveSubscriber::new(cache, None);

    let err = subscriber.bootstrap().await.unwrap_err();

    assert!(matches!(err, BootstrapError::Warm { subscription: None, .. }));
}
