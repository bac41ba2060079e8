//! Reassembly of out-of-order packets into time-ordered heaps.
mod manager;

use std::fmt::Display;
use std::io::Write;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::config::ObservationConfig;
use crate::dada::DadaHeader;
use crate::heap::Heap;
use crate::spead::{Packet, TICKS_PER_HEAP};
use crate::{Error, Result};

pub use manager::{FileOutput, OutputFactory, RingBufferManager};

/// Number of heaps buffered per stream.
pub const WINDOW_DEPTH: usize = 3;

/// Identifies one output stream: an F-engine (antenna input) and the first channel of its
/// subband.
#[derive(Serialize, Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamKey {
    pub feng_id: u64,
    pub frequency: u64,
}

impl Display for StreamKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}_{:05}", self.feng_id, self.frequency)
    }
}

/// Where a packet ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Inserted into the heap at logical window `slot`.
    Inserted { timestamp: u64, slot: usize },
    /// Dropped because its timestamp is not one of the window's expected timestamps.
    Discarded { timestamp: u64, window_start: u64 },
}

/// Fixed set of heaps for consecutive expected timestamps.
///
/// Logical slot `i` holds timestamp `base + i * TICKS_PER_HEAP` and lives in physical heap
/// `(first + i) % WINDOW_DEPTH`.
#[derive(Debug)]
pub struct Window {
    base: u64,
    first: usize,
    heaps: [Heap; WINDOW_DEPTH],
}

impl Window {
    #[must_use]
    pub fn new(base: u64, nchan: usize) -> Self {
        Window {
            base,
            first: 0,
            heaps: std::array::from_fn(|_| Heap::new(nchan)),
        }
    }

    /// Expected timestamps, oldest first.
    #[must_use]
    pub fn timestamps(&self) -> [u64; WINDOW_DEPTH] {
        std::array::from_fn(|i| self.base + i as u64 * TICKS_PER_HEAP)
    }

    /// Logical slot for `timestamp`, if it is one of the expected timestamps.
    #[must_use]
    pub fn slot_of(&self, timestamp: u64) -> Option<usize> {
        let delta = timestamp.checked_sub(self.base)?;
        if delta % TICKS_PER_HEAP != 0 {
            return None;
        }
        usize::try_from(delta / TICKS_PER_HEAP)
            .ok()
            .filter(|slot| *slot < WINDOW_DEPTH)
    }

    #[must_use]
    pub fn heap(&self, slot: usize) -> &Heap {
        &self.heaps[(self.first + slot) % WINDOW_DEPTH]
    }

    fn heap_mut(&mut self, slot: usize) -> &mut Heap {
        &mut self.heaps[(self.first + slot) % WINDOW_DEPTH]
    }

    /// Heaps in timestamp order.
    pub fn heaps(&self) -> impl DoubleEndedIterator<Item = &Heap> + ExactSizeIterator {
        (0..WINDOW_DEPTH).map(|slot| self.heap(slot))
    }

    /// Write the oldest heap, reset it for reuse as the newest slot and advance the window by
    /// one heap period. Returns the number of bytes written.
    fn flush_oldest<W: Write>(&mut self, writer: &mut W) -> Result<usize> {
        let heap = &mut self.heaps[self.first];
        heap.write_to(writer)?;
        let len = heap.len_bytes();
        trace!(
            timestamp = self.base,
            packets = heap.num_packets(),
            "flushed heap"
        );
        heap.reset();
        self.first = (self.first + 1) % WINDOW_DEPTH;
        self.base += TICKS_PER_HEAP;
        Ok(len)
    }
}

/// Per stream counters.
#[derive(Serialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct StreamStats {
    pub packets_inserted: usize,
    pub packets_discarded: usize,
    pub heaps_written: usize,
    pub bytes_written: usize,
}

/// Summary of a closed stream.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct StreamSummary {
    pub key: StreamKey,
    pub path: Option<PathBuf>,
    pub nchan: Option<usize>,
    pub stats: StreamStats,
}

enum State {
    Uninitialized,
    Steady(Window),
    Closed,
}

/// Reassembles the packets of a single [StreamKey] into a DADA file.
///
/// The first packet fixes the heap shape, the window start and the file header. Afterwards each
/// packet either lands in one of the [WINDOW_DEPTH] heaps or is discarded. A packet for the
/// newest slot pushes the oldest heap out to the writer, so up to two heap periods of
/// reordering are tolerated.
pub struct AntennaSubbandRingBuffer<W: Write> {
    key: StreamKey,
    config: ObservationConfig,
    writer: W,
    path: Option<PathBuf>,
    state: State,
    stats: StreamStats,
}

impl<W: Write> AntennaSubbandRingBuffer<W> {
    pub fn new(key: StreamKey, config: ObservationConfig, writer: W) -> Self {
        AntennaSubbandRingBuffer {
            key,
            config,
            writer,
            path: None,
            state: State::Uninitialized,
            stats: StreamStats::default(),
        }
    }

    /// Record the output path for reporting.
    #[must_use]
    pub fn with_path(mut self, path: PathBuf) -> Self {
        self.path = Some(path);
        self
    }

    #[must_use]
    pub fn key(&self) -> StreamKey {
        self.key
    }

    #[must_use]
    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    /// The active window, `None` before the first packet and after close.
    #[must_use]
    pub fn window(&self) -> Option<&Window> {
        match &self.state {
            State::Steady(window) => Some(window),
            _ => None,
        }
    }

    /// Consume the buffer returning the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn closed_error(&self) -> Error {
        Error::StreamClosed {
            feng_id: self.key.feng_id,
            frequency: self.key.frequency,
        }
    }

    fn initialize(&mut self, packet: &Packet) -> Result<Window> {
        let nchan = packet.channels_per_heap()?;
        let timestamp = packet.timestamp()?;
        let header = DadaHeader::for_stream(&self.config, packet)?;
        self.writer.write_all(&header.render()?)?;

        info!(
            feng_id = self.key.feng_id,
            frequency = self.key.frequency,
            nchan,
            timestamp,
            freq_mhz = header.freq_mhz,
            "initialized stream"
        );
        Ok(Window::new(timestamp, nchan))
    }

    /// Place a packet, initializing the stream on the first one.
    ///
    /// Packets outside the window are discarded with a warning and do not modify any state
    /// other than the discard counter.
    ///
    /// # Errors
    /// Fatal conditions only: missing items, inconsistent heap shapes, I/O errors writing the
    /// header or a flushed heap, or adding to a closed stream.
    pub fn add(&mut self, packet: &Packet) -> Result<Placement> {
        match self.state {
            State::Uninitialized => {
                let window = self.initialize(packet)?;
                self.state = State::Steady(window);
            }
            State::Closed => return Err(self.closed_error()),
            State::Steady(_) => {}
        }
        let timestamp = packet.timestamp()?;
        let closed = self.closed_error();
        let State::Steady(window) = &mut self.state else {
            return Err(closed);
        };

        let Some(mut slot) = window.slot_of(timestamp) else {
            warn!(
                feng_id = self.key.feng_id,
                frequency = self.key.frequency,
                timestamp,
                window_start = window.base,
                "packet discarded: out of reassembly window"
            );
            self.stats.packets_discarded += 1;
            return Ok(Placement::Discarded {
                timestamp,
                window_start: window.base,
            });
        };

        if slot == WINDOW_DEPTH - 1 {
            self.stats.bytes_written += window.flush_oldest(&mut self.writer)?;
            self.stats.heaps_written += 1;
            slot -= 1;
        }
        window.heap_mut(slot).add(packet)?;
        self.stats.packets_inserted += 1;

        Ok(Placement::Inserted { timestamp, slot })
    }

    /// Write the remaining heaps in window order and flush the writer.
    ///
    /// Heaps after the newest heap that received any packet are never written; gaps before it
    /// are written as zero-filled heaps. Closing an already closed stream is a no-op.
    ///
    /// # Errors
    /// Any I/O error writing.
    pub fn close(&mut self) -> Result<StreamSummary> {
        let state = std::mem::replace(&mut self.state, State::Closed);
        let nchan = match &state {
            State::Steady(window) => {
                let used = window
                    .heaps()
                    .rposition(|heap| !heap.is_empty())
                    .map_or(0, |idx| idx + 1);
                for heap in window.heaps().take(used) {
                    heap.write_to(&mut self.writer)?;
                    self.stats.heaps_written += 1;
                    self.stats.bytes_written += heap.len_bytes();
                }
                debug!(
                    feng_id = self.key.feng_id,
                    frequency = self.key.frequency,
                    written = used,
                    skipped = WINDOW_DEPTH - used,
                    "flushed remaining heaps"
                );
                Some(window.heap(0).nchan())
            }
            _ => None,
        };
        if !matches!(state, State::Closed) {
            self.writer.flush()?;
            info!(
                feng_id = self.key.feng_id,
                frequency = self.key.frequency,
                heaps = self.stats.heaps_written,
                discarded = self.stats.packets_discarded,
                "closed stream"
            );
        }

        Ok(StreamSummary {
            key: self.key,
            path: self.path.clone(),
            nchan,
            stats: self.stats.clone(),
        })
    }
}
