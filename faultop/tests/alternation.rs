//! End-to-end alternation: window sizes, termination, and ground-truth tags.

use std::time::Duration;

use faultop::{InjectionManager, InjectorEntry, Orchestrator, Probe, ProbeConfig, VecSink};

fn fast_probe() -> Probe {
    Probe::new(ProbeConfig {
        monitor_cpu: true,
        monitor_memory: true,
        times_interval: Duration::from_millis(1),
        usage_interval: Duration::from_millis(1),
    })
}

fn mem_entry(tag: &str) -> InjectorEntry {
    InjectorEntry {
        kind: "Memory".into(),
        tag: tag.into(),
        chunk_items: Some(8),
        core: None,
    }
}

#[tokio::test]
async fn three_two_alternation_with_two_specs_yields_ten_labeled_ticks() {
    let entries = vec![mem_entry("mem_a"), mem_entry("mem_b")];
    let manager =
        InjectionManager::read_injectors(&entries, Duration::from_millis(50), None, false).unwrap();

    let mut orchestrator = Orchestrator::new(
        fast_probe(),
        manager,
        VecSink::default(),
        3,
        2,
        Duration::from_millis(5),
    );

    let total = orchestrator.run().await.unwrap();
    assert_eq!(total, 10, "3 + 2 + 3 + 2 observations before termination");

    let tags: Vec<String> = orchestrator
        .sink()
        .snapshots
        .iter()
        .map(|s| s.injector.clone())
        .collect();
    assert_eq!(tags.len(), 10);

    // ticks 1-3 and 6-8 are normal windows
    for i in [0, 1, 2, 5, 6, 7] {
        assert_eq!(tags[i], "None", "tick {}", i + 1);
    }
    // ticks 4-5 carry the first injector's descriptor, 9-10 the second's
    assert!(tags[3].contains("[mem_a]"), "tick 4: {}", tags[3]);
    assert_eq!(tags[3], tags[4]);
    assert!(tags[8].contains("[mem_b]"), "tick 9: {}", tags[8]);
    assert_eq!(tags[8], tags[9]);
}

#[tokio::test]
async fn normal_window_with_an_empty_queue_halts_before_sampling_again() {
    let entries = vec![mem_entry("only")];
    let manager =
        InjectionManager::read_injectors(&entries, Duration::from_millis(50), None, false).unwrap();

    let mut orchestrator = Orchestrator::new(
        fast_probe(),
        manager,
        VecSink::default(),
        2,
        1,
        Duration::from_millis(5),
    );

    // 2 normal + 1 injected, then the queue is empty at the stop boundary
    let total = orchestrator.run().await.unwrap();
    assert_eq!(total, 3);
    let snaps = &orchestrator.sink().snapshots;
    assert_eq!(snaps[0].injector, "None");
    assert_eq!(snaps[1].injector, "None");
    assert!(snaps[2].injector.contains("[only]"));
}

#[tokio::test]
async fn snapshots_retain_monotonic_timestamps() {
    let entries = vec![mem_entry("t")];
    let manager =
        InjectionManager::read_injectors(&entries, Duration::from_millis(50), None, false).unwrap();
    let mut orchestrator = Orchestrator::new(
        fast_probe(),
        manager,
        VecSink::default(),
        1,
        1,
        Duration::from_millis(5),
    );
    orchestrator.run().await.unwrap();
    let snaps = &orchestrator.sink().snapshots;
    for pair in snaps.windows(2) {
        assert!(pair[1].time_ms >= pair[0].time_ms);
    }
}
