//! Concurrent readers and writers against one cache

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect

use kitchen_board_core::ticket::TicketStatus;
use kitchen_board_projections::TicketStateCache;
use kitchen_board_testing::fixtures;
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn hundred_writers_and_three_hundred_readers() {
    let cache = Arc::new(TicketStateCache::new());
    let mut tasks = Vec::new();

    for n in 0..100 {
        let cache = Arc::clone(&cache);
        tasks.push(tokio::spawn(async move {
            cache.set(fixtures::ticket(&format!("t-{n:03}"), "grill", TicketStatus::Created));
        }));
    }

    for n in 0..300 {
        let cache = Arc::clone(&cache);
        tasks.push(tokio::spawn(async move {
            let seen = match n % 3 {
                0 => cache.get_all().len(),
                1 => cache.get_by_station("grill").len(),
                _ => cache.get_by_status(TicketStatus::Created).len(),
            };
            assert!(seen <= 100);
        }));
    }

    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(cache.get_all().len(), 100);
    assert_eq!(cache.get_by_station("grill").len(), 100);
    assert_eq!(cache.get_by_status(TicketStatus::Created).len(), 100);
}

#[test]
fn readers_never_see_a_ticket_in_two_status_buckets() {
    let cache = Arc::new(TicketStateCache::new());
    cache.set(fixtures::ticket("moving", "grill", TicketStatus::Created));

    std::thread::scope(|scope| {
        let writer = Arc::clone(&cache);
        scope.spawn(move || {
            for round in 0..500 {
                let status = if round % 2 == 0 { TicketStatus::Started } else { TicketStatus::Created };
                let station = if round % 2 == 0 { "prep" } else { "grill" };
                writer.set(fixtures::ticket("moving", station, status));
            }
        });

        for _ in 0..4 {
            let reader = Arc::clone(&cache);
            scope.spawn(move || {
                for _ in 0..500 {
                    let counts = reader.count_by_status();
                    assert_eq!(counts.values().sum::<usize>(), 1);
                    let stations = reader.stations();
                    assert_eq!(stations.len(), 1, "ticket indexed under {stations:?}");

                    let all = reader.get_all();
                    assert_eq!(all.len(), 1);
                    let expected = if all[0].status == TicketStatus::Started { "prep" } else { "grill" };
                    assert_eq!(all[0].station, expected);
                }
            });
        }
    });

    assert_eq!(cache.len(), 1);
}
