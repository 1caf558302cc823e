// Fail-fast traversal

use aura_effect::{
    from_throwing, kleisli, lift_func, lift_predicate, sequence, traverse, Cause, Config,
    Effect, EffectError, Env, InternalFailure, Outcome, Stage, Tag,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn delayed(value: u32, delay_ms: u64) -> Effect<u32, String> {
    Effect::from_async(move |_: Env| async move {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        Ok(value)
    })
}

#[tokio::test]
async fn test_empty_input_is_empty_success() {
    let effect = traverse(Vec::<u32>::new(), Effect::<u32, String>::pure);
    assert_eq!(effect.tag(), Tag::Success);
    assert_eq!(effect.run(&Config::default()).await, Outcome::Success(vec![]));
}

#[tokio::test]
async fn test_steps_after_first_failure_are_never_invoked() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let effect = traverse(vec![1, 2, 3], move |n: i32| {
        counter.fetch_add(1, Ordering::SeqCst);
        lift_predicate(n, |n| *n != 2, |n| format!("{n} rejected"))
    });

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(effect.tag(), Tag::Failure);
    assert_eq!(
        effect.run(&Config::default()).await,
        Outcome::Failure(EffectError::Domain("2 rejected".to_string()))
    );
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_prefix_effects_run_but_later_ones_do_not() {
    let ran = Arc::new(AtomicUsize::new(0));
    let effects = (0..4u32).map(|n| {
        let ran = Arc::clone(&ran);
        if n == 2 {
            Effect::failure(format!("stop at {n}"))
        } else {
            Effect::from_async(move |_: Env| async move {
                ran.fetch_add(1, Ordering::SeqCst);
                Ok(n)
            })
        }
    });

    let effect = sequence(effects);
    assert_eq!(
        effect.run(&Config::default()).await,
        Outcome::Failure(EffectError::Domain("stop at 2".to_string()))
    );
    // Items 0 and 1 ran, item 3 was never built into the chain.
    assert_eq!(ran.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_order_is_input_order_under_concurrency() {
    let effect = sequence(vec![delayed(1, 60), delayed(2, 5), delayed(3, 30)]);
    assert_eq!(
        effect.run(&Config::default()).await,
        Outcome::Success(vec![1, 2, 3])
    );
}

#[tokio::test]
async fn test_units_run_concurrently() {
    let effect = sequence((0..5).map(|n| delayed(n, 100)));
    let started = std::time::Instant::now();
    let settled = effect.run(&Config::default()).await;

    assert_eq!(settled, Outcome::Success(vec![0, 1, 2, 3, 4]));
    assert!(started.elapsed() < Duration::from_millis(400));
}

#[tokio::test]
async fn test_deferred_failure_does_not_short_circuit() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    // The second step decides inside its thunk, so the tag stays success-shaped
    // and the third step is still built.
    let effect = traverse(vec![1u32, 2, 3], move |n| {
        counter.fetch_add(1, Ordering::SeqCst);
        Effect::from_async(move |_: Env| async move {
            if n == 2 {
                Err(format!("{n} failed late"))
            } else {
                Ok(n)
            }
        })
    });

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(effect.tag(), Tag::Success);
    assert_eq!(
        effect.run(&Config::default()).await,
        Outcome::Failure(EffectError::Domain("2 failed late".to_string()))
    );
}

#[tokio::test]
async fn test_first_runtime_failure_in_input_order_wins() {
    let late = |n: u32, delay_ms: u64| {
        Effect::<u32, String>::from_async(move |_: Env| async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            Err(format!("{n} failed"))
        })
    };
    let effect = sequence(vec![delayed(0, 1), late(1, 50), late(2, 1)]);
    assert_eq!(
        effect.run(&Config::default()).await,
        Outcome::Failure(EffectError::Domain("1 failed".to_string()))
    );
}

#[tokio::test]
async fn test_traverse_with_kleisli_step() {
    let parse = kleisli::<&str, u32, String, _, _>(|raw: &str| raw.parse::<u32>().map_err(|error| error.to_string()));

    let parsed = traverse(vec!["1", "22", "333"], parse);
    assert_eq!(
        parsed.run(&Config::default()).await,
        Outcome::Success(vec![1, 22, 333])
    );

    let parse = kleisli::<&str, u32, String, _, _>(|raw: &str| raw.parse::<u32>().map_err(|error| error.to_string()));
    let rejected = traverse(vec!["1", "x", "3"], parse);
    assert_eq!(rejected.tag(), Tag::Failure);
    assert!(matches!(
        rejected.run(&Config::default()).await,
        Outcome::Failure(EffectError::Domain(_))
    ));
}

#[tokio::test]
async fn test_traverse_with_panicking_step() {
    let step = from_throwing(|n: u32| -> u32 {
        if n == 0 {
            panic!("division by zero");
        }
        100 / n
    });

    let effect: Effect<Vec<u32>, String> = traverse(vec![5, 0, 2], step);
    assert_eq!(effect.tag(), Tag::Failure);
    assert_eq!(
        effect.run(&Config::default()).await,
        Outcome::Failure(EffectError::Internal(InternalFailure::new(
            Stage::FromThrowing,
            Cause::Panicked("division by zero".to_string()),
        )))
    );
}

#[test]
fn test_traverse_context_is_derived() {
    let effect = sequence(vec![
        Effect::<u32, String>::pure(1).with_timeout(Duration::from_millis(250)),
        Effect::pure(2),
    ]);
    assert_eq!(effect.context().span_name(), "effect/traverse");
    assert_eq!(effect.context().timeout(), Some(Duration::from_millis(250)));
    assert!(effect.context().parent_trace_id().is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocking_steps_run_concurrently() {
    let effect = traverse(0..4u32, |n| {
        lift_func::<u32, String, _>(move || {
            std::thread::sleep(Duration::from_millis(200));
            n * 10
        })
    });

    let started = Instant::now();
    let settled = effect.run(&Config::default()).await;
    assert!(started.elapsed() < Duration::from_millis(600));
    assert_eq!(settled, Outcome::Success(vec![0, 10, 20, 30]));
}

#[tokio::test]
async fn test_long_input_does_not_exhaust_the_stack() {
    let effect = sequence((0..50_000u32).map(Effect::<u32, String>::pure));
    let values = match effect.run(&Config::default()).await {
        Outcome::Success(values) => values,
        other => panic!("expected success, got {:?}", other.failure()),
    };
    assert_eq!(values.len(), 50_000);
    assert!(values.iter().copied().eq(0..50_000));
}
