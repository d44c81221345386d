// Integration tests running the built-in scenarios end to end

use reftty::config::SandboxConfig;
use reftty::scenario::{library, Scenario, Session};
use reftty::sandbox::errors::SandboxError;

fn run(name: &str) -> Session {
    let scenario = library::find(name).unwrap_or_else(|| panic!("no scenario named {}", name));
    let mut session = Session::new(scenario, &SandboxConfig::default());
    let result = session.run();
    assert!(result.is_ok(), "scenario {} failed: {:?}", name, result);
    session
}

#[test]
fn test_every_builtin_scenario_completes() {
    for scenario in library::builtin() {
        let name = scenario.name.clone();
        let steps = scenario.len();
        let mut session = Session::new(scenario, &SandboxConfig::default());
        assert!(session.run().is_ok(), "scenario {} failed", name);
        assert!(session.is_finished());
        assert_eq!(session.total_snapshots(), steps + 1);
        // Every scenario cleans up after itself unless it demonstrates a leak
        if name != "strong-cycle" {
            assert_eq!(session.sandbox().heap().live_count(), 0, "{} left nodes", name);
        }
    }
}

#[test]
fn test_smart_pointers_transcript() {
    let session = run("smart-pointers");
    assert_eq!(
        session.transcript(),
        vec![
            "Value of shared pointer: 10",
            "Value of unique pointer: 20",
            "strong count: 2",
            "strong count: 2, weak count: 1",
            "error: Use after move: exclusive handle #2 was moved from",
            "error: Double release of handle #1",
            "~sptr",
            "Weak pointer expired",
            "error: Expired reference: weak handle #4 outlived its target",
            "~uptr",
        ]
    );
}

#[test]
fn test_weak_cycle_reclaims_both() {
    let session = run("weak-cycle");
    assert_eq!(
        session.transcript(),
        vec![
            "A Constructor",
            "B Constructor",
            "strong counts: A = 2, B = 1",
            "A still alive: strong count 1",
            "~B",
            "B Destructor",
            "  ~A",
            "  A Destructor",
            "Weak pointer expired",
            "no leaked nodes",
        ]
    );
}

#[test]
fn test_strong_cycle_leaks_both() {
    let session = run("strong-cycle");
    let transcript = session.transcript();
    assert!(transcript.contains(&"strong counts: A = 2, B = 2".to_string()));
    assert!(!transcript.iter().any(|line| line.trim_start().starts_with('~')));
    assert_eq!(
        transcript.last().map(String::as_str),
        Some("leaked: A, B")
    );
    let last = session.current().unwrap();
    assert_eq!(last.leaked.len(), 2);
}

#[test]
fn test_dispatch_scenarios() {
    assert_eq!(
        run("virtual-dispatch").transcript(),
        vec![
            "Rex barks",
            "I am Rex",
            "Rex barks",
            "Rex makes a sound",
            "Eating...",
            "~my_dog",
            "Dog destructor called",
            "Animal destructor called",
        ]
    );
    assert_eq!(
        run("overloading").transcript(),
        vec![
            "add(int, int)",
            "result = 7",
            "add(float, float)",
            "result2 = 8.0",
            "error: No overload of 'add' accepts (int, float)",
            "~math",
            "examine(&Animal)",
            "Rex barks",
            "examine(&Dog)",
            "Rex barks",
            "~vet",
            "~rex",
            "Dog destructor called",
            "Animal destructor called",
        ]
    );
    assert_eq!(
        run("composition").transcript(),
        vec!["Engine started", "Car started", "~my_car", "  ~engine"]
    );
}

#[test]
fn test_diamond_scenarios() {
    let unshared = run("diamond").transcript();
    assert!(unshared[3].starts_with("error: Ambiguous resolution of 'eat'"));
    assert!(unshared.contains(&"energy via Mammal: 1, via Bird: 0".to_string()));

    let shared = run("shared-diamond").transcript();
    assert_eq!(
        shared,
        vec![
            "Eating...",
            "energy via Mammal: 1, via Bird: 1",
            "energy via Mammal: 5, via Bird: 5",
            "~bat",
            "Bat destructor called",
            "Bird destructor called",
            "Mammal destructor called",
            "Animal destructor called",
        ]
    );

    // Without sharing, each path tears down its own Animal
    assert_eq!(
        &unshared[unshared.len() - 6..],
        [
            "~bat",
            "Bat destructor called",
            "Bird destructor called",
            "Animal destructor called",
            "Mammal destructor called",
            "Animal destructor called",
        ]
    );
}

#[test]
fn test_replay_is_deterministic() {
    for scenario in library::builtin() {
        let name = scenario.name.clone();
        let first = run(&name).transcript();
        let second = run(&name).transcript();
        assert_eq!(first, second, "{} replayed differently", name);
    }
}

#[test]
fn test_stepping_back_restores_earlier_state() {
    let mut session = run("weak-cycle");
    let end = session.history_position();
    assert_eq!(session.current().unwrap().heap.live_count(), 0);

    // Back to the snapshot taken after `release(a);`
    session.step_backward().unwrap();
    session.step_backward().unwrap();
    let snapshot = session.current().unwrap();
    assert_eq!(snapshot.step, Some(6));
    assert_eq!(snapshot.heap.live_count(), 2);
    assert_eq!(snapshot.terminal.len(), 4);

    session.jump_to_end().unwrap();
    assert_eq!(session.history_position(), end);
}

#[test]
fn test_undetected_misuse_halts_the_session() {
    let scenario = Scenario::new("sloppy", "Release that should fail").step(
        "release(nothing);",
        |_, _| {
            Err(SandboxError::ExpectedFailure {
                operation: "release nothing".to_string(),
            })
        },
    );
    let mut session = Session::new(scenario, &SandboxConfig::default());
    assert!(session.run().is_err());
    assert_eq!(session.total_snapshots(), 2);
    assert!(session.current().unwrap().error.is_some());
}

#[test]
fn test_snapshot_limit_stops_the_run() {
    let scenario = library::find("smart-pointers").unwrap();
    let config = SandboxConfig::default().with_snapshot_limit(1);
    let mut session = Session::new(scenario, &config);
    assert!(matches!(
        session.run(),
        Err(SandboxError::SnapshotLimitExceeded { .. })
    ));
    assert!(matches!(
        session.error(),
        Some(SandboxError::SnapshotLimitExceeded { .. })
    ));
    assert!(session.is_finished());
}

#[test]
fn test_history_limit_mid_run_is_reported() {
    // Room for the initial snapshot and a few steps, not the whole run
    let scenario = library::find("smart-pointers").unwrap();
    let config = SandboxConfig::default().with_snapshot_limit(400);
    let mut session = Session::new(scenario, &config);

    assert!(session.run().is_err());
    assert!(session.total_snapshots() >= 1);
    assert!(session.total_snapshots() < 14);
    assert!(matches!(
        session.error(),
        Some(SandboxError::SnapshotLimitExceeded { .. })
    ));
    assert!(session.is_finished());
}
