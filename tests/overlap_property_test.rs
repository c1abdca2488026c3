//! Randomised concurrent creation: active bookings on one court never overlap

use chrono::{Duration, TimeZone, Utc};
use court_booking::application::{BookingService, LifecyclePublisher, ListQuery};
use court_booking::config::{BookingSettings, TopicsConfig};
use court_booking::domain::booking::{Booking, TimeRange};
use court_booking::infrastructure::messaging::InMemoryEventChannel;
use court_booking::infrastructure::persistence::InMemoryBookingStore;
use court_booking::DomainError;
use futures::future::join_all;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

const COURTS: [&str; 3] = ["c1", "c2", "c3"];
const SLOT_MINUTES: i64 = 30;

fn random_request(rng: &mut StdRng) -> (String, String, TimeRange) {
    let day = Utc.with_ymd_and_hms(2025, 3, 1, 6, 0, 0).unwrap();
    let start = day + Duration::minutes(SLOT_MINUTES * rng.gen_range(0..32));
    let end = start + Duration::minutes(SLOT_MINUTES * rng.gen_range(1..=4));
    let court = COURTS[rng.gen_range(0..COURTS.len())];
    let user = format!("u{}", rng.gen_range(0..10));
    (user, court.to_string(), TimeRange::new(start, end).unwrap())
}

fn assert_no_active_overlap(bookings: &[Booking]) {
    let active: Vec<&Booking> = bookings.iter().filter(|b| b.status().is_active()).collect();
    for (i, a) in active.iter().enumerate() {
        for b in &active[i + 1..] {
            assert!(
                a.resource_id() != b.resource_id() || !a.range().overlaps(b.range()),
                "{} and {} overlap on {}",
                a.id(),
                b.id(),
                a.resource_id()
            );
        }
    }
}

async fn all_bookings(service: &BookingService) -> Vec<Booking> {
    service
        .list(ListQuery {
            page_size: Some(10_000),
            ..Default::default()
        })
        .await
        .unwrap()
        .items
}

async fn run_round(service: &Arc<BookingService>, rng: &mut StdRng, count: usize) -> usize {
    let requests: Vec<_> = (0..count).map(|_| random_request(rng)).collect();

    let results = join_all(requests.into_iter().map(|(user, court, range)| {
        let service = Arc::clone(service);
        tokio::spawn(async move { service.create_in(&user, &court, range).await })
    }))
    .await;

    let mut created = 0;
    for result in results {
        match result.unwrap() {
            Ok(_) => created += 1,
            Err(e) => assert_eq!(e, DomainError::OverlapConflict),
        }
    }
    created
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_never_overlap() {
    for seed in [7_u64, 42, 1337] {
        let mut rng = StdRng::seed_from_u64(seed);
        let store = InMemoryBookingStore::new();
        let service = Arc::new(BookingService::new(
            Arc::new(store.clone()),
            LifecyclePublisher::new(Arc::new(InMemoryEventChannel::new()), TopicsConfig::default()),
            BookingSettings::default(),
        ));

        let created = run_round(&service, &mut rng, 80).await;
        assert_eq!(store.len().await, created);
        assert_no_active_overlap(&all_bookings(&service).await);

        // Release some slots and contend for them again
        for booking in all_bookings(&service).await {
            if rng.gen_bool(0.3) {
                let id = booking.id().to_string();
                if rng.gen_bool(0.5) {
                    service.confirm(&id).await.unwrap();
                }
                service.cancel(&id).await.unwrap();
            }
        }

        run_round(&service, &mut rng, 80).await;
        assert_no_active_overlap(&all_bookings(&service).await);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_identical_requests_admit_exactly_one() {
    let service = Arc::new(BookingService::new(
        Arc::new(InMemoryBookingStore::new()),
        LifecyclePublisher::new(Arc::new(InMemoryEventChannel::new()), TopicsConfig::default()),
        BookingSettings::default(),
    ));
    let range = TimeRange::parse_rfc3339("2025-03-01T10:00:00Z", "2025-03-01T11:00:00Z").unwrap();

    let results = join_all((0..32).map(|i| {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.create_in(&format!("u{}", i), "c1", range).await })
    }))
    .await;

    let winners = results.into_iter().filter(|r| matches!(r, Ok(Ok(_)))).count();
    assert_eq!(winners, 1);
}
