//! Drive frames from a capture through decoding into the ring buffers.
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};
use typed_builder::TypedBuilder;

use crate::ringbuffer::{OutputFactory, Placement, RingBufferManager, StreamSummary};
use crate::spead::{decode, decode_lite, Packet};
use crate::Result;

#[derive(Serialize, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DecodeMode {
    /// Parse and keep every header layer.
    Full,
    /// Skip the outer headers and read a fixed item count.
    #[default]
    Lite,
}

impl DecodeMode {
    fn decoder(self) -> fn(&[u8]) -> Result<Packet> {
        match self {
            DecodeMode::Full => decode,
            DecodeMode::Lite => decode_lite,
        }
    }
}

#[derive(TypedBuilder, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct StreamOptions {
    /// Stop after this many frames.
    #[builder(default, setter(strip_option))]
    pub max_packets: Option<usize>,
    #[builder(default)]
    pub decode_mode: DecodeMode,
    /// Frames decoded in parallel per batch.
    #[builder(default = 4096)]
    pub batch_size: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        StreamOptions::builder().build()
    }
}

#[derive(Serialize, Debug, Default, Clone, PartialEq)]
pub struct RunSummary {
    pub frames_read: usize,
    pub packets_inserted: usize,
    pub packets_discarded: usize,
    pub streams: Vec<StreamSummary>,
}

/// Feed `frames` into `manager` in order, then close every stream.
///
/// Frames are decoded in batches of [StreamOptions::batch_size] on the rayon pool; packets are
/// placed strictly in capture order.
///
/// # Errors
/// The first error reading a frame, decoding it or placing it, or closing a stream. Packets
/// preceding the failure are placed before returning.
pub fn stream_to_buffers<I, F>(
    frames: I,
    mut manager: RingBufferManager<F>,
    options: &StreamOptions,
) -> Result<RunSummary>
where
    I: IntoIterator<Item = Result<Vec<u8>>>,
    F: OutputFactory,
{
    let decoder = options.decode_mode.decoder();
    let batch_size = options.batch_size.max(1);
    let mut frames = frames
        .into_iter()
        .take(options.max_packets.unwrap_or(usize::MAX));
    let mut summary = RunSummary::default();

    info!(
        decode_mode = ?options.decode_mode,
        max_packets = ?options.max_packets,
        "streaming frames"
    );

    loop {
        let mut batch = Vec::with_capacity(batch_size);
        let mut read_error = None;
        for frame in frames.by_ref().take(batch_size) {
            match frame {
                Ok(frame) => batch.push(frame),
                Err(err) => {
                    read_error = Some(err);
                    break;
                }
            }
        }
        if batch.is_empty() && read_error.is_none() {
            break;
        }
        summary.frames_read += batch.len();

        let packets: Vec<Result<Packet>> = batch.par_iter().map(|frame| decoder(frame)).collect();
        for packet in packets {
            match manager.add(&packet?)? {
                Placement::Inserted { .. } => summary.packets_inserted += 1,
                Placement::Discarded { .. } => summary.packets_discarded += 1,
            }
        }
        debug!(
            frames = summary.frames_read,
            streams = manager.len(),
            "decoded batch"
        );

        if let Some(err) = read_error {
            return Err(err);
        }
    }

    summary.streams = manager.close_all()?;
    info!(
        frames = summary.frames_read,
        inserted = summary.packets_inserted,
        discarded = summary.packets_discarded,
        streams = summary.streams.len(),
        "finished"
    );
    Ok(summary)
}
