// tests/property_ordering.rs

use std::sync::{Arc, Mutex};

use coopsched::engine::SchedulerCore;
use coopsched::{Priority, TaskContext, WorkDescriptor};
use proptest::prelude::*;

fn priority_strategy() -> impl Strategy<Value = Priority> {
    prop::sample::select(Priority::ALL.to_vec())
}

/// Task `index` that yields `yields` times, then records its index.
fn yielding(
    index: usize,
    priority: Priority,
    yields: usize,
    done: &Arc<Mutex<Vec<usize>>>,
) -> WorkDescriptor<usize> {
    let done = Arc::clone(done);
    WorkDescriptor::new(priority, move |ctx: TaskContext| {
        let done = Arc::clone(&done);
        async move {
            for _ in 0..yields {
                ctx.yield_now().await;
            }
            done.lock().unwrap().push(index);
            Ok(index)
        }
    })
}

/// Drive the core until it has nothing left to do.
fn run_to_idle(core: &mut SchedulerCore) {
    for _ in 0..10_000 {
        let step = core.turn();
        assert!(step.commands.is_empty(), "no task here waits or cleans up");
        if step.idle {
            return;
        }
    }
    panic!("core never went idle");
}

proptest! {
    #[test]
    fn tasks_complete_in_priority_then_submission_order(
        tasks in proptest::collection::vec((priority_strategy(), 0..4usize), 1..24)
    ) {
        let done = Arc::new(Mutex::new(Vec::new()));
        let mut core = SchedulerCore::new();

        let handles: Vec<_> = tasks
            .iter()
            .enumerate()
            .map(|(index, (priority, yields))| {
                core.queue_task(yielding(index, *priority, *yields, &done))
            })
            .collect();

        run_to_idle(&mut core);

        let mut expected: Vec<usize> = (0..tasks.len()).collect();
        expected.sort_by_key(|&index| (tasks[index].0, index));
        prop_assert_eq!(done.lock().unwrap().clone(), expected);

        for (index, handle) in handles.iter().enumerate() {
            prop_assert_eq!(handle.try_result().map(|r| r.ok()), Some(Some(index)));
        }
        prop_assert!(core.is_empty());
        prop_assert_eq!(core.current(), None);
    }

    #[test]
    fn ready_count_only_shrinks_while_nothing_is_submitted(
        priorities in proptest::collection::vec(priority_strategy(), 1..16)
    ) {
        let done = Arc::new(Mutex::new(Vec::new()));
        let mut core = SchedulerCore::new();
        for (index, priority) in priorities.iter().enumerate() {
            core.queue_task(yielding(index, *priority, 1, &done));
        }

        let mut previous = core.ready_len();
        prop_assert_eq!(previous, priorities.len());
        loop {
            let step = core.turn();
            prop_assert!(core.ready_len() <= previous);
            previous = core.ready_len();
            if step.idle {
                break;
            }
        }
        prop_assert_eq!(previous, 0);
    }
}
