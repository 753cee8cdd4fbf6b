//! modes-core: Mode S / ADS-B decode and tracking library.
//!
//! Takes pre-framed 56/112-bit messages, validates and repairs them, and
//! folds them into an aircraft table. No sockets, no terminal. The only I/O
//! is the optional config file read.

pub mod cache;
pub mod config;
pub mod cpr;
pub mod crc;
pub mod decode;
pub mod pipeline;
pub mod tracker;
pub mod types;

// Re-export commonly used types at crate root
pub use cache::IcaoCache;
pub use config::Config;
pub use decode::Decoder;
pub use pipeline::{handoff, FrameSource, Pipeline, PipelineStats, ReceivedFrame};
pub use tracker::{Aircraft, Tracker};
pub use types::*;
