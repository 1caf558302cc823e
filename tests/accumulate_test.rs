// All-branches accumulation and validation

use aura_effect::{
    lift_func, lift_predicate, sequence_accumulate, sequence_accumulate_with,
    traverse_accumulate, validate_with, Aggregation, Cause, Config, Effect, EffectError, Env,
    InternalFailure, Outcome, Stage, Tag,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn after(delay_ms: u64, outcome: Result<u32, String>) -> Effect<u32, String> {
    Effect::from_async(move |_: Env| async move {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        outcome
    })
}

#[tokio::test]
async fn test_every_step_is_invoked_and_failures_are_ordered() {
    let invoked = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&invoked);

    // The first failure resolves last.
    let effect = traverse_accumulate(vec![1u32, 2, 3], move |n| {
        counter.fetch_add(1, Ordering::SeqCst);
        match n {
            1 => after(80, Err("f1".to_string())),
            2 => after(10, Ok(2)),
            _ => after(1, Err("f3".to_string())),
        }
    });

    assert_eq!(invoked.load(Ordering::SeqCst), 3);
    assert_eq!(
        effect.run(&Config::default()).await,
        Outcome::Failure(EffectError::Domain(vec!["f1".to_string(), "f3".to_string()]))
    );
}

#[tokio::test]
async fn test_success_values_keep_input_order() {
    let effect = sequence_accumulate(vec![
        after(60, Ok(1)),
        after(30, Ok(2)),
        after(1, Ok(3)),
    ]);
    assert_eq!(
        effect.run(&Config::default()).await,
        Outcome::Success(vec![1, 2, 3])
    );
}

#[tokio::test]
async fn test_empty_input_is_empty_success() {
    let effect = sequence_accumulate(Vec::<Effect<u32, String>>::new());
    assert_eq!(effect.tag(), Tag::Success);
    assert_eq!(effect.run(&Config::default()).await, Outcome::Success(vec![]));
}

#[tokio::test]
async fn test_failure_shaped_child_makes_combined_failure_shaped() {
    let effect = sequence_accumulate(vec![Effect::pure(1), Effect::failure("no")]);
    assert_eq!(effect.tag(), Tag::Failure);
    assert_eq!(
        effect.run(&Config::default()).await,
        Outcome::Failure(EffectError::Domain(vec!["no"]))
    );
}

#[tokio::test]
async fn test_every_branch_runs_even_after_a_failure() {
    let ran = Arc::new(AtomicUsize::new(0));
    let effects = (0..5u32)
        .map(|n| {
            let ran = Arc::clone(&ran);
            Effect::<u32, String>::from_async(move |_: Env| async move {
                ran.fetch_add(1, Ordering::SeqCst);
                if n % 2 == 0 {
                    Ok(n)
                } else {
                    Err(format!("{n} is odd"))
                }
            })
        })
        .collect::<Vec<_>>();

    let settled = sequence_accumulate(effects).run(&Config::default()).await;
    assert_eq!(ran.load(Ordering::SeqCst), 5);
    assert_eq!(
        settled,
        Outcome::Failure(EffectError::Domain(vec![
            "1 is odd".to_string(),
            "3 is odd".to_string(),
        ]))
    );
}

#[tokio::test]
async fn test_custom_aggregation() {
    let joined = Aggregation::new(
        |error: String| error,
        |acc: String, next: String| format!("{acc}; {next}"),
    );
    let effect = sequence_accumulate_with(
        vec![
            Effect::<u32, String>::failure("a".to_string()),
            Effect::pure(1),
            Effect::failure("b".to_string()),
            Effect::failure("c".to_string()),
        ],
        joined,
    );
    assert_eq!(
        effect.run(&Config::default()).await,
        Outcome::Failure(EffectError::Domain("a; b; c".to_string()))
    );
}

#[tokio::test]
async fn test_validate_with_custom_aggregation_counts_failures() {
    let count = Aggregation::new(|_: String| 1usize, |acc: usize, next: usize| acc + next);
    let validators: Vec<Box<dyn FnOnce(&String) -> Effect<(), String>>> = vec![
        Box::new(|name: &String| {
            lift_predicate((), |_| !name.is_empty(), |_| "empty".to_string())
        }),
        Box::new(|name: &String| {
            lift_predicate((), |_| name.len() <= 3, |_| "too long".to_string())
        }),
        Box::new(|name: &String| {
            lift_predicate((), |_| name.chars().all(char::is_alphabetic), |_| {
                "not alphabetic".to_string()
            })
        }),
    ];

    let effect = validate_with("ada-lovelace".to_string(), validators, count);
    assert_eq!(effect.context().span_name(), "effect/validate");
    assert_eq!(
        effect.run(&Config::default()).await,
        Outcome::Failure(EffectError::Domain(2))
    );
}

#[tokio::test]
async fn test_internal_branch_failures_are_reported_by_index() {
    let effect = sequence_accumulate(vec![
        Effect::<u32, String>::failure("domain".to_string()),
        lift_func(|| -> u32 { panic!("branch one") }),
        Effect::pure(2),
        Effect::<u32, String>::from_async(|_: Env| async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            let empty: Vec<u32> = Vec::new();
            Ok(empty[1])
        }),
    ]);

    let settled = effect.run(&Config::default()).await;
    let failure = match settled {
        Outcome::Failure(EffectError::Internal(failure)) => failure,
        other => panic!("expected an internal failure, got {other:?}"),
    };
    assert_eq!(failure.stage, Stage::Accumulate);
    let branches = match failure.cause {
        Cause::Branches(branches) => branches,
        other => panic!("expected branches, got {other:?}"),
    };
    assert_eq!(branches.len(), 2);
    assert_eq!(
        branches[0],
        (
            1,
            InternalFailure::new(Stage::LiftFunc, Cause::Panicked("branch one".to_string()))
        )
    );
    assert_eq!(branches[1].0, 3);
    assert_eq!(branches[1].1.stage, Stage::Accumulate);
    assert!(matches!(branches[1].1.cause, Cause::Panicked(_)));
}

#[tokio::test]
async fn test_branches_share_the_environment() {
    let env = Env::new().with("base", 10u32);
    let effect = traverse_accumulate(vec![1u32, 2, 3], |n| {
        Effect::<u32, String>::asks(move |env: &Env| {
            env.get::<u32>("base").copied().unwrap_or_default() + n
        })
    });
    assert_eq!(
        effect.run_in(env, &Config::default()).await,
        Outcome::Success(vec![11, 12, 13])
    );
}

#[test]
fn test_child_contexts_fold_into_the_root() {
    let effect = sequence_accumulate(vec![
        Effect::<u32, String>::pure(1).with_timeout(Duration::from_millis(100)),
        Effect::pure(2).with_timeout(Duration::from_millis(300)),
        Effect::pure(3).with_telemetry(true),
    ]);
    let context = effect.context();
    assert_eq!(context.span_name(), "effect/accumulate");
    assert_eq!(context.timeout(), Some(Duration::from_millis(300)));
    assert_eq!(context.telemetry(), Some(true));
}
