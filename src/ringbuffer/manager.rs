use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{AntennaSubbandRingBuffer, Placement, StreamKey, StreamSummary};
use crate::config::ObservationConfig;
use crate::spead::Packet;
use crate::Result;

/// Creates the writer for a newly seen stream.
///
/// Implemented for functions and closures, e.g. `|_: StreamKey| Ok(Vec::new())` to capture
/// output in memory.
pub trait OutputFactory {
    type Writer: Write;

    /// # Errors
    /// If the output cannot be created.
    fn create(&mut self, key: StreamKey) -> Result<Self::Writer>;

    /// Path of the output for `key`, if it is a file.
    fn path(&self, _key: StreamKey) -> Option<PathBuf> {
        None
    }
}

impl<W, F> OutputFactory for F
where
    W: Write,
    F: FnMut(StreamKey) -> Result<W>,
{
    type Writer = W;

    fn create(&mut self, key: StreamKey) -> Result<W> {
        self(key)
    }
}

/// Writes each stream to `<dir>/[<prefix>_]<feng_id:02>_<frequency:05>.dada`.
#[derive(Debug, Clone)]
pub struct FileOutput {
    dir: PathBuf,
    prefix: Option<String>,
}

impl FileOutput {
    pub fn new<P: AsRef<Path>>(dir: P, prefix: Option<String>) -> Self {
        FileOutput {
            dir: dir.as_ref().to_path_buf(),
            prefix,
        }
    }

    #[must_use]
    pub fn file_name(&self, key: StreamKey) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}_{key}.dada"),
            None => format!("{key}.dada"),
        }
    }
}

impl Default for FileOutput {
    fn default() -> Self {
        FileOutput::new(".", None)
    }
}

impl OutputFactory for FileOutput {
    type Writer = BufWriter<File>;

    fn create(&mut self, key: StreamKey) -> Result<Self::Writer> {
        let path = self.dir.join(self.file_name(key));
        debug!(path = %path.display(), "creating output");
        Ok(BufWriter::new(File::create(path)?))
    }

    fn path(&self, key: StreamKey) -> Option<PathBuf> {
        Some(self.dir.join(self.file_name(key)))
    }
}

/// Routes packets to one [AntennaSubbandRingBuffer] per [StreamKey], creating them on first
/// sight.
pub struct RingBufferManager<F: OutputFactory> {
    config: ObservationConfig,
    output: F,
    buffers: BTreeMap<StreamKey, AntennaSubbandRingBuffer<F::Writer>>,
}

impl<F: OutputFactory> RingBufferManager<F> {
    pub fn new(config: ObservationConfig, output: F) -> Self {
        RingBufferManager {
            config,
            output,
            buffers: BTreeMap::default(),
        }
    }

    /// Keys of the live streams, in order.
    pub fn keys(&self) -> impl Iterator<Item = &StreamKey> {
        self.buffers.keys()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Dispatch `packet` to its stream.
    ///
    /// # Errors
    /// If the packet is missing its stream items, the output cannot be created, or the stream
    /// fails to place the packet.
    pub fn add(&mut self, packet: &Packet) -> Result<Placement> {
        let key = packet.stream_key()?;
        let buffer = match self.buffers.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let writer = self.output.create(key)?;
                let mut buffer = AntennaSubbandRingBuffer::new(key, self.config.clone(), writer);
                if let Some(path) = self.output.path(key) {
                    buffer = buffer.with_path(path);
                }
                entry.insert(buffer)
            }
        };
        buffer.add(packet)
    }

    /// Close every stream, returning each summary along with its writer.
    ///
    /// # Errors
    /// The first error closing a stream.
    pub fn finish(self) -> Result<Vec<(StreamSummary, F::Writer)>> {
        self.buffers
            .into_values()
            .map(|mut buffer| {
                let summary = buffer.close()?;
                Ok((summary, buffer.into_inner()))
            })
            .collect()
    }

    /// Close every stream.
    ///
    /// # Errors
    /// The first error closing a stream.
    pub fn close_all(self) -> Result<Vec<StreamSummary>> {
        Ok(self
            .finish()?
            .into_iter()
            .map(|(summary, _)| summary)
            .collect())
    }
}
