use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use turnstile::{AdmissionController, KeyScope, ManualClock, Policy};

#[test]
fn test_parallel_first_use_creates_one_entry() {
    let clock = ManualClock::new();
    let controller = AdmissionController::builder(Policy::token_bucket(10, 0.0).unwrap())
        .clock(clock)
        .build()
        .unwrap();

    let callers = 32;
    let barrier = Arc::new(Barrier::new(callers));

    let handles: Vec<_> = (0..callers)
        .map(|_| {
            let controller = controller.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                controller.allow("203.0.113.9")
            })
        })
        .collect();

    let admitted = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|allowed| *allowed)
        .count();

    // A duplicate entry would have reset the burst and admitted more
    assert_eq!(admitted, 10);

    let stats = controller.stats();
    assert_eq!(stats.created, 1);
    assert_eq!(stats.active_keys, 1);
    assert_eq!(stats.denied, (callers - 10) as u64);
}

#[test]
fn test_parallel_keys_are_limited_independently() {
    let clock = ManualClock::new();
    let controller = AdmissionController::builder(Policy::token_bucket(5, 0.0).unwrap())
        .clock(clock)
        .build()
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|client| {
            let controller = controller.clone();
            thread::spawn(move || {
                let key = format!("10.0.0.{client}");
                (0..20).filter(|_| controller.allow(&key)).count()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 5);
    }
    assert_eq!(controller.len(), 8);
}

#[test]
fn test_global_scope_serializes_all_keys() {
    let clock = ManualClock::new();
    let controller =
        AdmissionController::builder(Policy::fixed_window(50, Duration::from_secs(1)).unwrap())
            .scope(KeyScope::Global)
            .clock(clock)
            .build()
            .unwrap();

    let handles: Vec<_> = (0..10)
        .map(|client| {
            let controller = controller.clone();
            thread::spawn(move || {
                let key = format!("client-{client}");
                (0..20).filter(|_| controller.allow(&key)).count()
            })
        })
        .collect();

    let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(admitted, 50);
    assert_eq!(controller.len(), 1);
}

#[test]
fn test_sweeps_racing_with_requests_never_tear_entries() {
    // Real clock with a tiny TTL so sweeps and requests genuinely interleave
    let capacity = 3;
    let controller = AdmissionController::builder(Policy::token_bucket(capacity, 0.0).unwrap())
        .entry_ttl(Duration::from_millis(1))
        .build()
        .unwrap();

    let workers: Vec<_> = (0..4)
        .map(|worker| {
            let controller = controller.clone();
            thread::spawn(move || {
                for i in 0..2000 {
                    let key = format!("key-{}", (worker + i) % 6);
                    controller.allow(&key);
                    if i % 100 == 0 {
                        thread::sleep(Duration::from_millis(2));
                    }
                }
            })
        })
        .collect();

    let sweeper = {
        let controller = controller.clone();
        thread::spawn(move || {
            for _ in 0..200 {
                controller.sweep();
                thread::sleep(Duration::from_micros(200));
            }
        })
    };

    for worker in workers {
        worker.join().unwrap();
    }
    sweeper.join().unwrap();

    let stats = controller.stats();
    // Every entry admits at most `capacity` requests during its lifetime
    assert!(
        stats.allowed <= capacity * stats.created,
        "allowed {} exceeds {} entries x capacity {}",
        stats.allowed,
        stats.created,
        capacity
    );
    // Every created entry is either still present or was evicted exactly once
    assert_eq!(stats.created - stats.evicted, controller.len() as u64);
    assert_eq!(stats.total(), 4 * 2000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_tasks_share_one_bucket() {
    let controller = AdmissionController::builder(Policy::token_bucket(25, 0.0).unwrap())
        .start()
        .unwrap();

    let mut tasks = Vec::new();
    for _ in 0..100 {
        let controller = controller.clone();
        tasks.push(tokio::spawn(async move { controller.allow("198.51.100.4") }));
    }

    let mut admitted = 0;
    for task in tasks {
        if task.await.unwrap() {
            admitted += 1;
        }
    }

    assert_eq!(admitted, 25);
    assert_eq!(controller.stats().created, 1);
    controller.shutdown().await;
}
