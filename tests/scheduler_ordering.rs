// tests/scheduler_ordering.rs

mod common;

use std::time::Duration;

use coopsched::{InterruptPolicy, Priority, TaskContext, TaskError, WorkDescriptor};
use coopsched_test_utils::descriptors::{gated, phased, returning};
use coopsched_test_utils::{Gate, Recorder, stays_pending, with_timeout};

use common::{eventually, interrupted, scheduler};

#[tokio::test]
async fn task_without_suspension_resolves_with_its_value() {
    let mut scheduler = scheduler();
    let answer = scheduler.queue_task(returning(Priority::Normal, 1u32));

    scheduler.start().unwrap();

    assert_eq!(with_timeout(answer).await.unwrap(), 1);
    scheduler.stop().await.unwrap();
}

#[tokio::test]
async fn resume_task_continues_where_it_was_preempted() {
    let recorder = Recorder::new();
    let mut scheduler = scheduler();
    let t1 = scheduler.queue_task(interrupted(
        &recorder,
        Priority::Normal,
        InterruptPolicy::Resume,
        phased(&recorder, "2", Priority::High),
    ));

    scheduler.start().unwrap();
    with_timeout(t1).await.unwrap();

    assert_eq!(
        recorder.lines(),
        Recorder::expect(&["1a", "2a", "2b", "2c", "1b", "1c"])
    );
    scheduler.stop().await.unwrap();
}

#[tokio::test]
async fn restart_task_starts_over_after_preemption() {
    let recorder = Recorder::new();
    let mut scheduler = scheduler();
    let t1 = scheduler.queue_task(interrupted(
        &recorder,
        Priority::Normal,
        InterruptPolicy::Restart,
        phased(&recorder, "2", Priority::High),
    ));

    scheduler.start().unwrap();
    with_timeout(t1).await.unwrap();

    assert_eq!(
        recorder.lines(),
        Recorder::expect(&["1a", "2a", "2b", "2c", "1a", "1b", "1c"])
    );
    scheduler.stop().await.unwrap();
}

#[tokio::test]
async fn forbidden_task_runs_to_completion_first() {
    let recorder = Recorder::new();
    let mut scheduler = scheduler();
    let t1 = scheduler.queue_task(interrupted(
        &recorder,
        Priority::Low,
        InterruptPolicy::Forbidden,
        phased(&recorder, "2", Priority::Highest),
    ));

    scheduler.start().unwrap();
    with_timeout(t1).await.unwrap();
    eventually(|| recorder.lines().len() == 6).await;

    assert_eq!(
        recorder.lines(),
        Recorder::expect(&["1a", "1b", "1c", "2a", "2b", "2c"])
    );
    scheduler.stop().await.unwrap();
}

#[tokio::test]
async fn equal_priority_waits_overlap_and_resume_independently() {
    let recorder = Recorder::new();
    let mut scheduler = scheduler();

    let sleeper = |prefix: &'static str, ms: u64| {
        let recorder = recorder.clone();
        WorkDescriptor::new(Priority::Normal, move |ctx: TaskContext| {
            let recorder = recorder.clone();
            async move {
                recorder.push(format!("{prefix}a"));
                ctx.wait_for(async move {
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    Ok::<_, anyhow::Error>(())
                })
                .await?;
                recorder.push(format!("{prefix}b"));
                Ok(())
            }
        })
    };
    let t1 = scheduler.queue_task(sleeper("1", 50));
    let t2 = scheduler.queue_task(sleeper("2", 100));

    scheduler.start().unwrap();
    with_timeout(async {
        t1.await.unwrap();
        t2.await.unwrap();
    })
    .await;

    assert_eq!(recorder.lines(), Recorder::expect(&["1a", "2a", "1b", "2b"]));
    scheduler.stop().await.unwrap();
}

#[tokio::test]
async fn waiting_task_blocks_less_urgent_work() {
    let recorder = Recorder::new();
    let gate = Gate::new();
    let mut scheduler = scheduler();
    let t1 = scheduler.queue_task(gated(&recorder, "1", Priority::Normal, &gate));
    let t2 = scheduler.queue_task(phased(&recorder, "2", Priority::Idle));

    scheduler.start().unwrap();
    eventually(|| !recorder.lines().is_empty()).await;
    assert!(stays_pending(t2.clone(), 50).await);
    assert_eq!(recorder.lines(), Recorder::expect(&["1a"]));

    gate.open(5u32);
    with_timeout(async {
        assert_eq!(t1.await.unwrap(), 5);
        t2.await.unwrap();
    })
    .await;

    assert_eq!(
        recorder.lines(),
        Recorder::expect(&["1a", "1b", "2a", "2b", "2c"])
    );
    scheduler.stop().await.unwrap();
}

#[tokio::test]
async fn waiting_task_does_not_block_equal_or_more_urgent_work() {
    let recorder = Recorder::new();
    let gate = Gate::new();
    let mut scheduler = scheduler();
    let waiting = scheduler.queue_task(gated(&recorder, "1", Priority::Normal, &gate));
    let same = scheduler.queue_task(phased(&recorder, "2", Priority::Normal));

    scheduler.start().unwrap();
    with_timeout(same).await.unwrap();
    assert!(!waiting.is_settled());

    gate.open(());
    with_timeout(waiting).await.unwrap();
    assert_eq!(
        recorder.lines(),
        Recorder::expect(&["1a", "2a", "2b", "2c", "1b"])
    );
    scheduler.stop().await.unwrap();
}

#[tokio::test]
async fn body_error_rejects_only_its_own_task() {
    let mut scheduler = scheduler();
    let failing = scheduler.queue_task(WorkDescriptor::new(
        Priority::Normal,
        |ctx: TaskContext| async move {
            ctx.yield_now().await;
            if ctx.id() > 0 {
                anyhow::bail!("sensor unplugged");
            }
            Ok(())
        },
    ));
    let fine = scheduler.queue_task(returning(Priority::Normal, 2u32));

    scheduler.start().unwrap();

    match with_timeout(failing).await {
        Err(TaskError::Failed(err)) => assert_eq!(err.to_string(), "sensor unplugged"),
        other => panic!("expected Failed, got {other:?}"),
    }
    assert_eq!(with_timeout(fine).await.unwrap(), 2);
    scheduler.stop().await.unwrap();
}

#[tokio::test]
async fn submissions_before_start_run_by_priority() {
    let recorder = Recorder::new();
    let mut scheduler = scheduler();
    let handles = [
        scheduler.queue_task(phased(&recorder, "idle", Priority::Idle)),
        scheduler.queue_task(phased(&recorder, "low", Priority::Low)),
        scheduler.queue_task(phased(&recorder, "highest", Priority::Highest)),
    ];

    scheduler.start().unwrap();
    for handle in handles {
        with_timeout(handle).await.unwrap();
    }

    let firsts: Vec<_> = recorder
        .lines()
        .into_iter()
        .filter(|line| line.ends_with('a'))
        .collect();
    assert_eq!(firsts, Recorder::expect(&["highesta", "lowa", "idlea"]));
    scheduler.stop().await.unwrap();
}

#[tokio::test]
async fn waiting_restart_task_yields_to_an_equal_priority_newcomer() {
    let recorder = Recorder::new();
    let gate: Gate<u32> = Gate::new();
    let cleanup_recorder = recorder.clone();
    let mut scheduler = scheduler();
    let t1 = scheduler.queue_task(
        gated(&recorder, "1", Priority::Normal, &gate)
            .interrupt(InterruptPolicy::Restart)
            .cleanup(move || {
                cleanup_recorder.push("cleanup");
                async { Ok(()) }
            }),
    );

    scheduler.start().unwrap();
    eventually(|| recorder.lines().len() == 1).await;

    let t2 = scheduler.queue_task(phased(&recorder, "2", Priority::Normal));
    with_timeout(t2).await.unwrap();
    assert!(!t1.is_settled());

    gate.open(8);
    assert_eq!(with_timeout(t1).await.unwrap(), 8);

    let lines = recorder.lines();
    let cleanups = lines.iter().filter(|line| *line == "cleanup").count();
    let runs = lines.iter().filter(|line| *line == "1a").count();
    assert!(cleanups >= 1);
    assert_eq!(runs, cleanups + 1, "each abandoned run is cleaned up once");
    assert_eq!(lines.last().map(String::as_str), Some("1b"));
    scheduler.stop().await.unwrap();
}
