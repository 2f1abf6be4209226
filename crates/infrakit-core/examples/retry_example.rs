//! Example: Using the retry controller.
//!
//! This example demonstrates:
//! - The bare `retry` wrapper with its defaults
//! - Choosing backoff curves and retryable failure kinds
//! - Chained failures in the retry log
//! - Adjusting the policy per call
//!
//! Run with: cargo run --example retry_example -p infrakit-core

use infrakit_core::prelude::*;
use std::cell::Cell;
use std::error::Error as StdError;
use std::io;
use std::time::{Duration, Instant};

/// Simulates a service that becomes ready after a number of polls.
struct FlakyService {
    ready_after: u32,
    polls: Cell<u32>,
}

impl FlakyService {
    fn new(ready_after: u32) -> Self {
        Self {
            ready_after,
            polls: Cell::new(0),
        }
    }

    fn poll(&self) -> Result<&'static str, Error> {
        self.polls.set(self.polls.get() + 1);
        if self.polls.get() <= self.ready_after {
            Err(Error::failure(format!("not ready (poll {})", self.polls.get())))
        } else {
            Ok("ready")
        }
    }
}

/// Example 1: Backoff curves side by side
fn example_backoff_curves() {
    println!("\n=== Example 1: Backoff Curves (base delay 1s) ===\n");

    for mode in BackoffMode::ALL {
        let sleeps: Vec<String> = (1..=5)
            .map(|attempt| mode.sleep(Duration::from_secs(1), attempt))
            .map(|sleep| format!("{}s", sleep.as_secs()))
            .collect();
        println!("  {:<12} {}", mode.as_str(), sleeps.join(", "));
    }
}

/// Example 2: Short real sleeps with a custom failure message
fn example_short_sleeps() -> Result<(), Box<dyn StdError>> {
    println!("\n=== Example 2: Linear Backoff with Real Sleeps ===\n");

    let service = FlakyService::new(2);
    let wait_ready = Retry::builder()
        .tries(4)
        .delay(Duration::from_millis(100))
        .backoff_mode(BackoffMode::Linear)
        .failure_message("Service is not ready yet")
        .build()
        .wrap(|service: &&FlakyService| service.poll());

    let start = Instant::now();
    let status = wait_ready.call(&service)?;

    println!("Result: {}", status);
    println!("Total polls: {}", service.polls.get());
    println!("Total time: {:?}", start.elapsed());
    println!("Expected delays: 100ms + 200ms = ~300ms");

    Ok(())
}

/// Example 3: Only some failures are retried
fn example_failure_kinds() {
    println!("\n=== Example 3: Retry Only Timeouts ===\n");

    let sleeper = RecordingSleeper::new();
    let attempts = Cell::new(0);
    let read = Retry::builder()
        .tries(3)
        .retry_on(FailureKind::new("timed out", |err: &io::Error| {
            err.kind() == io::ErrorKind::TimedOut
        }))
        .sleeper(sleeper.clone())
        .build()
        .wrap_named("example.read", |kind: &io::ErrorKind| {
            attempts.set(attempts.get() + 1);
            Err::<(), _>(io::Error::from(*kind))
        });

    let _ = read.call(io::ErrorKind::PermissionDenied);
    println!(
        "PermissionDenied: {} attempt(s), {} sleep(s)",
        attempts.get(),
        sleeper.count()
    );

    attempts.set(0);
    let _ = read.call(io::ErrorKind::TimedOut);
    println!(
        "TimedOut: {} attempt(s), sleeps {:?}",
        attempts.get(),
        sleeper.sleeps()
    );
}

/// Example 4: Chained failures show up in the log
fn example_failure_chain() {
    println!("\n=== Example 4: Chained Failures ===\n");

    let sync = Retry::builder()
        .tries(2)
        .failure_message("Unable to sync the inventory")
        .sleeper(RecordingSleeper::new())
        .build()
        .wrap_named("example.sync", |_: &()| {
            Err::<(), _>(
                Failure::new("inventory sync failed")
                    .caused_by(Failure::new("connection reset by peer")),
            )
        });

    if let Err(err) = sync.call(()) {
        println!("Final error:\n{}", failure_chain(&err));
    }
}

/// Example 5: Per-call adjustment of the policy
fn example_adjuster() {
    println!("\n=== Example 5: Per-Call Adjustment ===\n");

    struct Deploy {
        hosts: u32,
    }

    let sleeper = RecordingSleeper::new();
    let deploy = Retry::builder()
        .tries(2)
        .delay(Duration::from_secs(5))
        .backoff_mode(BackoffMode::Constant)
        .adjust_with(|mut policy, _op, deploy: &Deploy| {
            policy.tries += deploy.hosts / 10;
            policy
        })
        .sleeper(sleeper.clone())
        .build()
        .wrap_named("example.deploy", |_: &Deploy| {
            Err::<(), _>(Error::failure("hosts still converging"))
        });

    let _ = deploy.call(Deploy { hosts: 30 });
    println!("30 hosts: {} sleep(s) of 5s", sleeper.count());
}

fn main() -> Result<(), Box<dyn StdError>> {
    tracing_subscriber::fmt().with_target(false).init();

    println!("==============================================");
    println!("   Infrakit Core: Retry Controller Examples");
    println!("==============================================");

    example_backoff_curves();
    example_short_sleeps()?;
    example_failure_kinds();
    example_failure_chain();
    example_adjuster();

    println!("\n==============================================");
    println!("   All examples completed successfully!");
    println!("==============================================\n");

    Ok(())
}
