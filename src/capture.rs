//! Reading Ethernet frames from classic pcap capture files.
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use pcap_file::pcap::PcapReader;
use pcap_file::DataLink;
use tracing::{debug, warn};

use crate::spead::{decode, Packet};
use crate::Result;

/// Iterates the raw frames of a pcap capture.
///
/// Truncated records, where the captured length is less than the original length, are
/// returned as captured; decoding will report them as malformed.
pub struct CaptureReader<R: Read> {
    reader: PcapReader<R>,
    frames_read: usize,
    done: bool,
}

impl<R: Read> CaptureReader<R> {
    /// # Errors
    /// [crate::Error::Capture] if the pcap global header is invalid.
    pub fn new(reader: R) -> Result<Self> {
        let reader = PcapReader::new(reader)?;
        let header = reader.header();
        if header.datalink != DataLink::ETHERNET {
            warn!(datalink = ?header.datalink, "capture link type is not ethernet");
        }
        debug!(
            version = %format!("{}.{}", header.version_major, header.version_minor),
            snaplen = header.snaplen,
            "opened capture"
        );
        Ok(CaptureReader {
            reader,
            frames_read: 0,
            done: false,
        })
    }

    /// Number of frames returned so far.
    #[must_use]
    pub fn frames_read(&self) -> usize {
        self.frames_read
    }
}

impl<R: Read> Iterator for CaptureReader<R> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_packet()? {
            Ok(packet) => {
                if packet.data.len() < packet.orig_len as usize {
                    debug!(
                        frame = self.frames_read,
                        captured = packet.data.len(),
                        orig_len = packet.orig_len,
                        "truncated capture record"
                    );
                }
                self.frames_read += 1;
                Some(Ok(packet.data.into_owned()))
            }
            Err(err) => {
                // the reader cannot resync after a bad record
                self.done = true;
                Some(Err(err.into()))
            }
        }
    }
}

/// Open a capture file for reading.
///
/// # Errors
/// If the file cannot be opened or is not a pcap file.
pub fn open_capture<P: AsRef<Path>>(path: P) -> Result<CaptureReader<BufReader<File>>> {
    let file = File::open(path.as_ref())?;
    CaptureReader::new(BufReader::new(file))
}

/// Decode, with the full decoder, up to `limit` frames from the capture at `path`.
///
/// # Errors
/// If the capture cannot be read or a frame fails to decode.
pub fn read_packets<P: AsRef<Path>>(path: P, limit: Option<usize>) -> Result<Vec<Packet>> {
    open_capture(path)?
        .take(limit.unwrap_or(usize::MAX))
        .map(|frame| decode(&frame?))
        .collect()
}
