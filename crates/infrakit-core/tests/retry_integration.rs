//! End-to-end behavior of the retry controller, observed through its log
//! output.

use std::cell::Cell;
use std::fmt;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use infrakit_core::error::{Error, Failure};
use infrakit_core::retry::{BackoffMode, FailureKind, RecordingSleeper, Retry, retry};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

/// Collects the level and message of every event.
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<(Level, String)>>>);

impl Captured {
    fn events(&self) -> Vec<(Level, String)> {
        self.0.lock().unwrap().clone()
    }

    fn warnings(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|(level, _)| *level == Level::WARN)
            .map(|(_, message)| message)
            .collect()
    }
}

struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

impl<S: Subscriber> Layer<S> for Captured {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor(String::new());
        event.record(&mut visitor);
        self.0
            .lock()
            .unwrap()
            .push((*event.metadata().level(), visitor.0));
    }
}

fn capture<T>(f: impl FnOnce() -> T) -> (T, Captured) {
    let captured = Captured::default();
    let subscriber = tracing_subscriber::registry().with(captured.clone());
    let value = tracing::subscriber::with_default(subscriber, f);
    (value, captured)
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct ApiError(String);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err.to_string())
    }
}

#[test]
fn test_exhausted_tries_log_every_retry() {
    let calls = Cell::new(0);
    let sleeper = RecordingSleeper::new();

    let (result, log) = capture(|| {
        Retry::builder()
            .sleeper(sleeper.clone())
            .build()
            .wrap_named("checks.poll", |_: &()| {
                calls.set(calls.get() + 1);
                Err::<(), _>(Error::failure(format!("attempt {}", calls.get())))
            })
            .call(())
    });

    assert_eq!(calls.get(), 3);
    assert_eq!(result.unwrap_err().to_string(), "attempt 3");
    assert_eq!(
        sleeper.sleeps(),
        vec![Duration::from_secs(3), Duration::from_secs(9)]
    );
    assert_eq!(
        log.warnings(),
        vec![
            "[1/3, retrying in 3.00s] Attempt to run 'checks.poll' raised: attempt 1",
            "[2/3, retrying in 9.00s] Attempt to run 'checks.poll' raised: attempt 2",
        ]
    );
}

#[test]
fn test_success_after_failures() {
    let calls = Cell::new(0);
    let sleeper = RecordingSleeper::new();

    let (result, log) = capture(|| {
        Retry::builder()
            .tries(5)
            .delay(Duration::from_millis(500))
            .backoff_mode(BackoffMode::Linear)
            .sleeper(sleeper.clone())
            .build()
            .wrap(|value: &u32| {
                calls.set(calls.get() + 1);
                if calls.get() < 3 {
                    Err(Error::failure("not yet"))
                } else {
                    Ok(value * 2)
                }
            })
            .call(21)
    });

    assert_eq!(result.unwrap(), 42);
    assert_eq!(calls.get(), 3);
    assert_eq!(
        sleeper.sleeps(),
        vec![Duration::from_millis(500), Duration::from_secs(1)]
    );
    assert_eq!(log.warnings().len(), 2);
}

#[test]
fn test_non_retryable_failure_is_silent() {
    let calls = Cell::new(0);
    let sleeper = RecordingSleeper::new();

    let (result, log) = capture(|| {
        Retry::builder()
            .sleeper(sleeper.clone())
            .build()
            .wrap(|_: &()| {
                calls.set(calls.get() + 1);
                Err::<(), _>(ApiError("permission denied".into()))
            })
            .call(())
    });

    assert_eq!(result.unwrap_err().0, "permission denied");
    assert_eq!(calls.get(), 1);
    assert_eq!(sleeper.count(), 0);
    assert!(log.events().is_empty());
}

#[test]
fn test_custom_kinds_and_message() {
    let calls = Cell::new(0);
    let sleeper = RecordingSleeper::new();

    let (result, log) = capture(|| {
        Retry::builder()
            .tries(2)
            .delay(Duration::from_secs(1))
            .backoff_mode(BackoffMode::Constant)
            .retry_on(FailureKind::new("timeout", |err: &ApiError| {
                err.0.contains("timeout")
            }))
            .failure_message("Unable to reach the API")
            .sleeper(sleeper.clone())
            .build()
            .wrap(|_: &()| {
                calls.set(calls.get() + 1);
                Err::<(), _>(ApiError("read timeout".into()))
            })
            .call(())
    });

    assert!(result.is_err());
    assert_eq!(calls.get(), 2);
    assert_eq!(
        log.warnings(),
        vec!["[1/2, retrying in 1.00s] Unable to reach the API: read timeout"]
    );
}

#[test]
fn test_default_message_names_the_operation() {
    let sleeper = RecordingSleeper::new();

    let (_, log) = capture(|| {
        Retry::builder()
            .tries(2)
            .sleeper(sleeper.clone())
            .build()
            .wrap(|_: &()| Err::<(), _>(Error::failure("boom")))
            .call(())
    });

    let warnings = log.warnings();
    assert_eq!(warnings.len(), 1);
    let warning = &warnings[0];
    assert!(warning.starts_with("[1/2, retrying in 3.00s] Attempt to run '"));
    assert!(warning.contains("test_default_message_names_the_operation"));
    assert!(warning.ends_with("' raised: boom"));
}

#[test]
fn test_chained_failures_are_logged_in_full() {
    let sleeper = RecordingSleeper::new();

    let (_, log) = capture(|| {
        Retry::builder()
            .tries(2)
            .failure_message("Sync failed")
            .sleeper(sleeper.clone())
            .build()
            .wrap(|_: &()| {
                Err::<(), _>(Failure::new("error1").while_handling(
                    Failure::new("error2").caused_by(Failure::new("error3")),
                ))
            })
            .call(())
    });

    assert_eq!(
        log.warnings(),
        vec![
            "[1/2, retrying in 3.00s] Sync failed: error1\n\
             Raised while handling: error2\n\
             Caused by: error3"
        ]
    );
}

#[test]
fn test_explicit_cause_wins_over_context() {
    let sleeper = RecordingSleeper::new();

    let (_, log) = capture(|| {
        Retry::builder()
            .tries(2)
            .failure_message("Sync failed")
            .sleeper(sleeper.clone())
            .build()
            .wrap(|_: &()| {
                Err::<(), _>(
                    Failure::new("outer")
                        .while_handling(Failure::new("ignored"))
                        .caused_by(Failure::new("root")),
                )
            })
            .call(())
    });

    assert_eq!(
        log.warnings(),
        vec!["[1/2, retrying in 3.00s] Sync failed: outer\nCaused by: root"]
    );
}

#[test]
fn test_chain_inside_io_error_keeps_link_kinds() {
    let sleeper = RecordingSleeper::new();

    let (_, log) = capture(|| {
        Retry::builder()
            .tries(2)
            .retry_on(FailureKind::any())
            .failure_message("Sync failed")
            .sleeper(sleeper.clone())
            .build()
            .wrap(|_: &()| {
                let failure = Failure::new("outer").while_handling(Failure::new("handled"));
                Err::<(), _>(io::Error::other(failure))
            })
            .call(())
    });

    assert_eq!(
        log.warnings(),
        vec!["[1/2, retrying in 3.00s] Sync failed: outer\nRaised while handling: handled"]
    );
}

#[test]
fn test_adjuster_changes_tries_per_call() {
    let calls = Cell::new(0);
    let sleeper = RecordingSleeper::new();

    let flaky = Retry::builder()
        .tries(1)
        .adjust_with(|mut policy, _op, patient: &bool| {
            if *patient {
                policy.tries = 2;
            }
            policy
        })
        .sleeper(sleeper.clone())
        .build()
        .wrap(|_: &bool| {
            calls.set(calls.get() + 1);
            Err::<(), _>(Error::failure("flaky"))
        });

    assert!(flaky.call(false).is_err());
    assert_eq!(calls.get(), 1);

    calls.set(0);
    assert!(flaky.call(true).is_err());
    assert_eq!(calls.get(), 2);
    assert_eq!(sleeper.count(), 1);
}

#[test]
fn test_invalid_policy_stops_before_first_attempt() {
    let calls = Cell::new(0);

    let (result, log) = capture(|| {
        Retry::builder()
            .backoff_mode_name("invalid")
            .sleeper(RecordingSleeper::new())
            .build()
            .wrap(|_: &()| {
                calls.set(calls.get() + 1);
                Ok::<_, Error>(())
            })
            .call(())
    });

    let err = result.unwrap_err();
    assert!(err.is_configuration());
    assert_eq!(
        err.to_string(),
        "Invalid retry policy: Invalid backoff_mode: invalid"
    );
    assert_eq!(calls.get(), 0);
    assert!(log.events().is_empty());
}

#[test]
fn test_bare_wrapper_uses_defaults() {
    let poll = retry(|value: &String| Ok::<_, Error>(value.to_uppercase()));
    assert_eq!(poll.call("db1001".to_string()).unwrap(), "DB1001");
}
