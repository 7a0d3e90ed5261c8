//! pushseq-tail - echo stdin through a pushable sequence
//!
//! A reader thread pushes each stdin line; the async side prints lines as
//! the consumer receives them. The sequence, and the program, end when stdin
//! closes or nothing arrives within the idle timeout.

use pushseq::{channel, IdleTimerPolicy, SequenceConfig, UnobservedError};
use std::io::BufRead;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_TIMEOUT_MS: u64 = 5000;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so stdout carries only the echoed lines
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pushseq=info,pushseq_tail=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // Configuration
    // Read errors must reach the consumer even between requests
    let defaults = SequenceConfig::new(DEFAULT_TIMEOUT_MS)?
        .with_timer(IdleTimerPolicy::IdleReset)
        .with_unobserved_error(UnobservedError::Deliver);
    let config = SequenceConfig::from_env(defaults)?;
    tracing::info!(
        timeout_ms = %config.timeout().as_millis(),
        timer = ?config.timer(),
        "Tailing stdin"
    );

    let (pusher, mut sequence) = channel::<String, std::io::Error>(&config);

    // Blocking reads stay off the runtime. The thread is not joined: on an
    // idle timeout it may still be parked in read() when main returns.
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if !pusher.push(line) {
                        break;
                    }
                }
                Err(e) => {
                    pusher.throw(e);
                    return;
                }
            }
        }
        pusher.end();
    });

    let mut count: u64 = 0;
    while let Some(line) = sequence.next_step().await?.into_value() {
        println!("{line}");
        count += 1;
    }

    tracing::info!(lines = count, "Sequence ended");
    Ok(())
}
