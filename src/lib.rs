//! pushseq - pushable timed async sequences
//!
//! Bridges an imperative push/end/throw producer API onto a consumer that
//! pulls one value at a time, either through [`Sequence::next_step`] or as a
//! [`futures::Stream`]. A sequence closes itself when its idle timer fires.
//!
//! ```no_run
//! # async fn demo() -> Result<(), pushseq::ConfigError> {
//! use pushseq::{channel, SequenceConfig, Step};
//!
//! let config = SequenceConfig::new(50)?;
//! let (pusher, mut sequence) = channel::<u32, std::io::Error>(&config);
//! pusher.push(1);
//! pusher.push(2);
//! pusher.end();
//!
//! while let Ok(Step::Value(v)) = sequence.next_step().await {
//!     println!("{v}");
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod forward;
mod sequence;

pub use config::{ConfigError, IdleTimerPolicy, SequenceConfig, UnobservedError};
pub use forward::forward;
pub use sequence::{channel, Pusher, Sequence, Step};
