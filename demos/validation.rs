// Demonstration of fail-fast sequencing versus accumulating validation
// A signup form is checked two ways: stopping at the first problem, and
// collecting every problem. Runs report through telemetry sinks.

use aura_effect::{
    lift_predicate, sequence_accumulate, traverse, validate, Config, Effect, Env, Fanout,
    MetricsTelemetry, Outcome, RecordingTelemetry, RunOptions, TaskSupervisor, TracingTelemetry,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug)]
struct Signup {
    name: String,
    age: u32,
    email: String,
}

fn has_name(signup: &Signup) -> Effect<(), String> {
    lift_predicate((), |_| !signup.name.trim().is_empty(), |_| {
        "name must not be blank".to_string()
    })
}

fn adult(signup: &Signup) -> Effect<(), String> {
    let age = signup.age;
    lift_predicate((), |_| age >= 18, |_| format!("age {age} is under 18"))
}

fn reachable(signup: &Signup) -> Effect<(), String> {
    let email = signup.email.clone();
    lift_predicate((), |_| email.contains('@'), |_| format!("{email} is not an email"))
}

// Looks up a reserved-name list from the environment, like a remote check.
fn not_reserved(name: String) -> Effect<String, String> {
    Effect::from_async(move |env: Env| async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let reserved = env
            .get::<Vec<String>>("reserved")
            .is_some_and(|reserved| reserved.contains(&name));
        if reserved {
            Err(format!("{name} is reserved"))
        } else {
            Ok(name)
        }
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let recorder = RecordingTelemetry::new();
    let metrics = Arc::new(MetricsTelemetry::new());
    let config = Config::default()
        .with_default_timeout(Duration::from_secs(2))
        .with_telemetry_enabled(true)
        .with_telemetry(Arc::new(
            Fanout::new()
                .with(Arc::new(TracingTelemetry))
                .with(Arc::new(recorder.clone()))
                .with(metrics.clone()),
        ));

    let signups = vec![
        Signup {
            name: "ada".into(),
            age: 36,
            email: "ada@example.com".into(),
        },
        Signup {
            name: " ".into(),
            age: 12,
            email: "nobody".into(),
        },
    ];

    println!("=== Accumulating validation ===");
    for signup in &signups {
        let validators: [fn(&Signup) -> Effect<(), String>; 3] = [has_name, adult, reachable];
        match validate(signup.clone(), validators).named("signup").run(&config).await {
            Outcome::Success(valid) => println!("accepted {}", valid.name),
            Outcome::Failure(error) => println!("rejected: {error:?}"),
        }
    }

    println!("\n=== Fail-fast sequencing ===");
    let ages = traverse(signups.iter().map(|signup| signup.age), |age| {
        lift_predicate(age, |age| *age >= 18, |age| format!("age {age} is under 18"))
    });
    println!("ages: {:?}", ages.run(&config).await);

    println!("\n=== Concurrent checks against the environment ===");
    let env = Env::new().with("reserved", vec!["root".to_string(), "admin".to_string()]);
    let names = ["ada", "root", "grace", "admin"]
        .into_iter()
        .map(|name| not_reserved(name.to_string()));
    let supervisor = Arc::new(TaskSupervisor::current()?);
    let checked = sequence_accumulate(names)
        .run_with(
            env,
            &config,
            RunOptions::new()
                .named("reserved-names")
                .supervised_by(supervisor.clone()),
        )
        .await;
    println!("names: {checked:?}");

    println!("\nTelemetry:");
    println!("  runs started: {}", metrics.started_count());
    println!("  ok: {}", metrics.ok_count());
    println!("  error: {}", metrics.error_count());
    println!("  recorded stops: {}", recorder.stops().len());
    println!("  supervised units: {}", supervisor.spawned_count());

    Ok(())
}
