// Integration tests for handle lifetimes on the sandbox heap

use proptest::prelude::*;
use reftty::memory::handle::SharedHandle;
use reftty::memory::heap::{Heap, TeardownPhase};
use reftty::sandbox::errors::SandboxError;

#[derive(Debug, Clone)]
enum Op {
    Duplicate(usize),
    Release(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..8usize).prop_map(Op::Duplicate),
        (0..8usize).prop_map(Op::Release),
    ]
}

proptest! {
    #[test]
    fn test_duplicate_release_destroys_exactly_once(ops in prop::collection::vec(op(), 0..40)) {
        let mut heap: Heap<i32> = Heap::default();
        let first = heap.create_shared("obj", 1).unwrap();
        let watch = heap.weak_from(&first).unwrap();
        let mut live: Vec<SharedHandle<i32>> = vec![first];
        let mut released: Vec<SharedHandle<i32>> = Vec::new();

        for op in ops {
            if live.is_empty() {
                break;
            }
            match op {
                Op::Duplicate(i) => {
                    let copy = heap.duplicate_shared(&live[i % live.len()]).unwrap();
                    live.push(copy);
                }
                Op::Release(i) => {
                    let handle = live.remove(i % live.len());
                    heap.release_shared(handle).unwrap();
                    released.push(handle);
                }
            }

            let destroyed = heap.destroyed_count();
            if live.is_empty() {
                prop_assert_eq!(destroyed, 1);
                prop_assert!(!heap.is_alive(&watch).unwrap());
            } else {
                prop_assert_eq!(destroyed, 0);
                prop_assert!(heap.is_alive(&watch).unwrap());
                prop_assert_eq!(heap.strong_count(&watch).unwrap(), live.len());
            }
        }

        for handle in released {
            prop_assert_eq!(
                heap.release_shared(handle),
                Err(SandboxError::DoubleRelease { handle: handle.id() })
            );
        }
        prop_assert!(heap.destroyed_count() <= 1);
    }
}

#[test]
fn test_weak_handle_expires_with_target() {
    let mut heap: Heap<i32> = Heap::default();
    let a = heap.create_shared("a", 5).unwrap();
    let weak = heap.weak_from(&a).unwrap();

    assert_eq!(heap.weak_count(&a), Ok(1));
    assert_eq!(heap.get(&weak), Ok(&5));
    let upgraded = heap.resolve_weak(&weak).unwrap().expect("target is alive");
    assert_eq!(heap.strong_count(&a), Ok(2));
    heap.release_shared(upgraded).unwrap();

    heap.release_shared(a).unwrap();
    assert_eq!(heap.is_alive(&weak), Ok(false));
    assert_eq!(heap.resolve_weak(&weak), Ok(None));
    assert_eq!(
        heap.get(&weak),
        Err(SandboxError::ExpiredReference { handle: weak.id() })
    );

    heap.release_weak(weak).unwrap();
    assert_eq!(
        heap.release_weak(weak),
        Err(SandboxError::DoubleRelease { handle: weak.id() })
    );
}

#[test]
fn test_slot_reuse_does_not_revive_weak_handles() {
    let mut heap: Heap<&str> = Heap::default();
    let old = heap.create_shared("old", "first").unwrap();
    let weak = heap.weak_from(&old).unwrap();
    heap.release_shared(old).unwrap();

    let new = heap.create_shared("new", "second").unwrap();
    assert_eq!(new.node().index, old.node().index);
    assert_ne!(new.node().generation, old.node().generation);

    assert_eq!(heap.is_alive(&weak), Ok(false));
    assert_eq!(heap.resolve_weak(&weak), Ok(None));
    assert_eq!(heap.get(&new), Ok(&"second"));
}

#[test]
fn test_exclusive_move_and_drop() {
    let mut heap: Heap<i32> = Heap::default();
    let first = heap.create_exclusive("box", 20).unwrap();
    let second = heap.move_exclusive(first).unwrap();

    assert_eq!(
        heap.get(&first),
        Err(SandboxError::UseAfterMove { handle: first.id() })
    );
    assert_eq!(
        heap.drop_exclusive(first),
        Err(SandboxError::UseAfterMove { handle: first.id() })
    );
    assert_eq!(heap.get(&second), Ok(&20));

    *heap.get_mut(&second).unwrap() += 1;
    assert_eq!(heap.get(&second), Ok(&21));

    heap.drop_exclusive(second).unwrap();
    assert_eq!(heap.live_count(), 0);
    assert_eq!(
        heap.drop_exclusive(second),
        Err(SandboxError::DoubleRelease { handle: second.id() })
    );
}

#[test]
fn test_weak_back_edge_lets_both_nodes_go() {
    let mut heap: Heap<()> = Heap::default();
    let a = heap.create_shared("A", ()).unwrap();
    let b = heap.create_shared("B", ()).unwrap();
    heap.store_weak(&a, "b_ptr", &b).unwrap();
    heap.store_shared(&b, "a_ptr", &a).unwrap();

    heap.release_shared(a).unwrap();
    assert_eq!(heap.live_count(), 2);
    heap.release_shared(b).unwrap();

    assert_eq!(heap.live_count(), 0);
    assert!(heap.leaked_nodes().is_empty());
    let begins: Vec<(String, usize)> = heap
        .teardown_log()
        .iter()
        .filter(|event| event.phase == TeardownPhase::Begin)
        .map(|event| (event.label.clone(), event.depth))
        .collect();
    assert_eq!(begins, vec![("B".to_string(), 0), ("A".to_string(), 1)]);
}

#[test]
fn test_strong_cycle_is_reported_as_leaked() {
    let mut heap: Heap<()> = Heap::default();
    let a = heap.create_shared("A", ()).unwrap();
    let b = heap.create_shared("B", ()).unwrap();
    heap.store_shared(&a, "b_ptr", &b).unwrap();
    heap.store_shared(&b, "a_ptr", &a).unwrap();
    assert!(heap.leaked_nodes().is_empty());

    heap.release_shared(a).unwrap();
    // Still reachable through b
    assert!(heap.leaked_nodes().is_empty());

    heap.release_shared(b).unwrap();
    assert_eq!(heap.live_count(), 2);
    assert_eq!(heap.destroyed_count(), 0);
    assert_eq!(heap.leaked_nodes(), vec![a.node(), b.node()]);
}

#[test]
fn test_clearing_a_field_breaks_the_cycle() {
    let mut heap: Heap<()> = Heap::default();
    let a = heap.create_shared("A", ()).unwrap();
    let b = heap.create_shared("B", ()).unwrap();
    heap.store_shared(&a, "b_ptr", &b).unwrap();
    heap.store_shared(&b, "a_ptr", &a).unwrap();

    assert_eq!(heap.clear_field(&a, "b_ptr"), Ok(true));
    assert_eq!(heap.clear_field(&a, "b_ptr"), Ok(false));
    heap.release_shared(a).unwrap();
    heap.release_shared(b).unwrap();
    assert_eq!(heap.live_count(), 0);
}

#[test]
fn test_errors_name_the_offending_handle() {
    let mut heap: Heap<i32> = Heap::default();
    let a = heap.create_shared("a", 1).unwrap();
    heap.release_shared(a).unwrap();

    assert_eq!(
        heap.get(&a),
        Err(SandboxError::UseAfterRelease { handle: a.id() })
    );
    assert_eq!(heap.strong_count(&a).unwrap_err().handle(), Some(a.id()));
}

#[test]
fn test_capacity_is_configurable() {
    let mut heap: Heap<i32> = Heap::new(1);
    let only = heap.create_shared("only", 1).unwrap();
    assert_eq!(
        heap.create_exclusive("extra", 2),
        Err(SandboxError::CapacityExceeded { limit: 1 })
    );
    heap.release_shared(only).unwrap();
    assert!(heap.create_exclusive("extra", 2).is_ok());
}
