use crate::{
    config::{BarrierConfig, SupervisorTemplates},
    distributed::{BarrierError, Supervisor, SupervisorPaths, SyncBarrier},
    storage::{SharedStorage, Storage},
    test_util::{fast_barrier, memory_storage, Event, RecordingStorage},
};
use std::{sync::Arc, thread, time::Duration};

const ITERATIONS: usize = 4;

fn participants(storage: &SharedStorage, tasks: u32, threads: usize) -> Vec<SyncBarrier> {
    let mut barriers = Vec::new();

    for task in 0..tasks {
        for thread in 0..threads {
            barriers.push(SyncBarrier::new(
                Arc::clone(storage),
                "/work",
                task,
                thread,
                &fast_barrier(),
            ));
        }
    }

    barriers
}

#[test]
pub fn token_layout() {
    let barrier = SyncBarrier::new(memory_storage(), "/work/", 3, 1, &fast_barrier());

    assert_eq!(barrier.iteration_dir(2), "/work/sync/2");
    assert_eq!(barrier.token_path(2), "/work/sync/2/3-1");
}

#[test]
pub fn prepare_creates_one_token_per_iteration() {
    let storage = memory_storage();
    let barriers = participants(&storage, 2, 2);

    for barrier in barriers.iter() {
        barrier.prepare(ITERATIONS).unwrap();
    }

    for iteration in 0..ITERATIONS {
        assert_eq!(
            storage.list(&barriers[0].iteration_dir(iteration)).unwrap(),
            vec![
                format!("/work/sync/{iteration}/0-0"),
                format!("/work/sync/{iteration}/0-1"),
                format!("/work/sync/{iteration}/1-0"),
                format!("/work/sync/{iteration}/1-1"),
            ]
        );
    }
}

#[test]
pub fn single_participant_passes_immediately() {
    let storage = memory_storage();
    let barrier = SyncBarrier::new(storage.clone(), "/work", 0, 0, &BarrierConfig::default());

    barrier.prepare(1).unwrap();
    let waited = barrier.sync(0).unwrap();

    assert!(waited < Duration::from_millis(300));
    assert!(!storage.exists(&barrier.token_path(0)).unwrap());
}

#[test]
pub fn arriving_twice_is_harmless() {
    let barrier = SyncBarrier::new(memory_storage(), "/work", 0, 0, &fast_barrier());

    barrier.prepare(1).unwrap();
    barrier.arrive(0).unwrap();
    barrier.arrive(0).unwrap();
    barrier.wait(0).unwrap();
}

#[test]
pub fn missing_participant_stalls() {
    let storage = memory_storage();
    let config = BarrierConfig {
        poll_interval_ms: 1,
        timeout_ms: Some(50),
    };
    let present = SyncBarrier::new(storage.clone(), "/work", 0, 0, &config);
    let missing = SyncBarrier::new(storage, "/work", 1, 0, &config);

    present.prepare(1).unwrap();
    missing.prepare(1).unwrap();

    match present.sync(0) {
        Err(BarrierError::CoordinationStall {
            iteration,
            remaining,
            waited,
        }) => {
            assert_eq!(iteration, 0);
            assert_eq!(remaining, 1);
            assert!(waited >= Duration::from_millis(50));
        }
        other => panic!("expected a stall, got {other:?}"),
    }
}

/// Every token of iteration i has to be gone before anyone starts iteration i + 1
#[test]
pub fn lock_step_across_participants() {
    let recording = RecordingStorage::new();
    let storage: SharedStorage = Arc::new(recording.clone());
    let barriers = participants(&storage, 3, 2);

    for barrier in barriers.iter() {
        barrier.prepare(ITERATIONS).unwrap();
    }

    thread::scope(|scope| {
        for (index, barrier) in barriers.iter().enumerate() {
            let storage = Arc::clone(&storage);

            scope.spawn(move || {
                for iteration in 0..ITERATIONS {
                    storage
                        .create_empty(&format!("/work/data/{iteration}/{index}"))
                        .unwrap();
                    // stagger arrivals so some participants really have to wait
                    thread::sleep(Duration::from_millis((index as u64 * 3) % 7));
                    barrier.sync(iteration).unwrap();
                }
            });
        }
    });

    let events = recording.events();
    for iteration in 0..ITERATIONS {
        let token_prefix = format!("/work/sync/{iteration}/");
        let next_data = format!("/work/data/{}/", iteration + 1);

        let last_token = events
            .iter()
            .rposition(|event| matches!(event, Event::Deleted(path) if path.starts_with(&token_prefix)))
            .unwrap();
        let first_next = events
            .iter()
            .position(|event| matches!(event, Event::Created(path) if path.starts_with(&next_data)));

        assert_eq!(
            events
                .iter()
                .filter(|event| matches!(event, Event::Deleted(path) if path.starts_with(&token_prefix)))
                .count(),
            barriers.len()
        );
        if let Some(first_next) = first_next {
            assert!(
                last_token < first_next,
                "iteration {} started before barrier {iteration} opened",
                iteration + 1
            );
        }
    }
}

fn supervisor(storage: &SharedStorage) -> Supervisor {
    Supervisor::new(
        Arc::clone(storage),
        SupervisorPaths::render(&SupervisorTemplates::default(), "Iterate", 2, "node-a"),
    )
}

#[test]
pub fn supervisor_paths() {
    let paths = SupervisorPaths::render(&SupervisorTemplates::default(), "Iterate", 2, "node-a");

    assert_eq!(paths.ready, "/dperf/supervisor/Iterate-2@node-a.ready");
    assert_eq!(paths.success, "/dperf/supervisor/Iterate-2@node-a.success");
    assert_eq!(paths.failed, "/dperf/supervisor/Iterate-2@node-a.failed");
}

#[test]
pub fn supervisor_markers() {
    let storage = memory_storage();
    let supervisor = supervisor(&storage);
    let paths = supervisor.paths().clone();

    supervisor.clear_stale().unwrap();
    supervisor.signal_ready().unwrap();
    assert!(storage.exists(&paths.ready).unwrap());

    supervisor.signal_outcome(true).unwrap();
    assert!(storage.exists(&paths.ready).unwrap());
    assert!(storage.exists(&paths.success).unwrap());
    assert!(!storage.exists(&paths.failed).unwrap());

    // a later failing outcome replaces the success marker
    supervisor.signal_outcome(false).unwrap();
    assert!(!storage.exists(&paths.success).unwrap());
    assert!(storage.exists(&paths.failed).unwrap());

    supervisor.clear_stale().unwrap();
    for path in [&paths.ready, &paths.success, &paths.failed] {
        assert!(!storage.exists(path).unwrap());
    }
}
