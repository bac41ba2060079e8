#![doc = include_str!("../README.md")]

mod error;

pub mod capture;
pub mod config;
pub mod dada;
pub mod heap;
pub mod pipeline;
pub mod ringbuffer;
pub mod spead;

pub use config::ObservationConfig;
pub use error::{Error, Result};
pub use pipeline::{stream_to_buffers, DecodeMode, RunSummary, StreamOptions};
pub use ringbuffer::{FileOutput, OutputFactory, RingBufferManager, StreamKey};
