//! SPEAD packet decoding.
//!
//! Each captured frame carries one SPEAD packet inside Ethernet II / IPv4 / UDP:
//! ```text
//! | ethernet (14) | ipv4 (20) | udp (8) | spead (8) | num_items * 8 | samples (1024) |
//! ```
//! The sample block holds [NSAMPS_PER_PACKET] samples for a single channel, each with [NPOL]
//! polarisations of signed 8-bit real/imaginary components.
mod descriptor;
mod headers;

use std::collections::BTreeMap;
use std::fmt::Display;

use serde::Serialize;

use crate::ringbuffer::StreamKey;
use crate::{Error, Result};

pub use descriptor::{Descriptor, ItemName};
pub use headers::{EthernetHeader, Ipv4Header, MacAddr, SpeadHeader, UdpHeader};

/// Samples per channel in a single packet.
pub const NSAMPS_PER_PACKET: usize = 256;
/// Polarisations per sample.
pub const NPOL: usize = 2;
/// Components per sample value (real, imaginary).
pub const NDIM: usize = 2;
/// Bits per component.
pub const NBIT: usize = 8;
/// Size of the sample block at the end of every packet.
pub const SAMPLES_LEN: usize = NSAMPS_PER_PACKET * NPOL * NDIM;
/// Timestamp increment between consecutive heaps of a stream.
pub const TICKS_PER_HEAP: u64 = 2_097_152;

/// Offset of the first item pointer when all outer headers have their fixed sizes.
pub const LITE_ITEMS_OFFSET: usize =
    EthernetHeader::LEN + Ipv4Header::LEN + UdpHeader::LEN + SpeadHeader::LEN;
/// Number of item pointers the F-engines put in every packet.
pub const LITE_NUM_ITEMS: usize = 11;

/// A decoded SPEAD packet.
///
/// Outer headers are only available when decoded with [decode]; [decode_lite] skips them.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub ethernet: Option<EthernetHeader>,
    pub ipv4: Option<Ipv4Header>,
    pub udp: Option<UdpHeader>,
    pub spead: Option<SpeadHeader>,
    /// Item pointers in packet order.
    pub descriptors: Vec<Descriptor>,
    /// Sample block, `[sample][pol][re/im]`.
    #[serde(skip)]
    pub samples: Vec<i8>,
}

impl Display for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Packet{{items: {:?}, samples:[len={}]}}",
            self.items(),
            self.samples.len()
        )
    }
}

impl Packet {
    /// A packet with only item pointers and samples, e.g., for synthesizing captures.
    #[must_use]
    pub fn new(descriptors: Vec<Descriptor>, samples: Vec<i8>) -> Self {
        Packet {
            ethernet: None,
            ipv4: None,
            udp: None,
            spead: None,
            descriptors,
            samples,
        }
    }

    /// Item values by name. Later items override earlier ones with the same name, so all
    /// unrecognized ids collapse into a single [ItemName::Unknown] entry.
    #[must_use]
    pub fn items(&self) -> BTreeMap<ItemName, u64> {
        self.descriptors.iter().map(Descriptor::entry).collect()
    }

    /// Value of the named item.
    ///
    /// # Errors
    /// [Error::MissingItem] if the packet does not have the item.
    pub fn item(&self, name: ItemName) -> Result<u64> {
        self.descriptors
            .iter()
            .rev()
            .find(|d| d.name() == name)
            .map(|d| d.value)
            .ok_or(Error::MissingItem(name))
    }

    pub fn timestamp(&self) -> Result<u64> {
        self.item(ItemName::Timestamp)
    }

    pub fn heap_size(&self) -> Result<u64> {
        self.item(ItemName::HeapSize)
    }

    pub fn heap_offset(&self) -> Result<u64> {
        self.item(ItemName::HeapOffset)
    }

    pub fn payload_size(&self) -> Result<u64> {
        self.item(ItemName::PayloadSize)
    }

    pub fn feng_id(&self) -> Result<u64> {
        self.item(ItemName::FengId)
    }

    pub fn frequency(&self) -> Result<u64> {
        self.item(ItemName::Frequency)
    }

    /// Number of channels in the heap this packet belongs to, i.e., `heap_size / payload_size`.
    ///
    /// # Errors
    /// [Error::InvalidHeapShape] if the payload size is zero or larger than the heap size.
    pub fn channels_per_heap(&self) -> Result<usize> {
        let heap_size = self.heap_size()?;
        let payload_size = self.payload_size()?;
        if payload_size == 0 || heap_size < payload_size {
            return Err(Error::InvalidHeapShape {
                heap_size,
                payload_size,
            });
        }
        usize::try_from(heap_size / payload_size).map_err(|_| Error::InvalidHeapShape {
            heap_size,
            payload_size,
        })
    }

    /// Channel within the heap that this packet's samples belong to.
    pub fn channel_index(&self) -> Result<u64> {
        let heap_offset = self.heap_offset()?;
        let payload_size = self.payload_size()?;
        if payload_size == 0 {
            return Err(Error::InvalidHeapShape {
                heap_size: self.heap_size()?,
                payload_size,
            });
        }
        Ok(heap_offset / payload_size)
    }

    pub fn stream_key(&self) -> Result<StreamKey> {
        Ok(StreamKey {
            feng_id: self.feng_id()?,
            frequency: self.frequency()?,
        })
    }

    /// Encode into a full frame accepted by [decode]. Missing outer headers are written with
    /// default values and the SPEAD item count always matches the number of descriptors.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(
            LITE_ITEMS_OFFSET + self.descriptors.len() * Descriptor::LEN + self.samples.len(),
        );
        self.ethernet.unwrap_or_default().encode_into(&mut buf);
        self.ipv4.unwrap_or_default().encode_into(&mut buf);
        self.udp.unwrap_or_default().encode_into(&mut buf);
        let spead = SpeadHeader {
            num_items: self.descriptors.len() as u16,
            ..self.spead.unwrap_or_default()
        };
        spead.encode_into(&mut buf);
        for desc in &self.descriptors {
            buf.extend_from_slice(&desc.encode());
        }
        buf.extend(self.samples.iter().map(|s| *s as u8));
        buf
    }
}

fn read_header<'a, T>(
    buf: &mut &'a [u8],
    len: usize,
    layer: &'static str,
    decode: fn(&[u8]) -> Option<T>,
) -> Result<T> {
    let data: &'a [u8] = *buf;
    let header = decode(data).ok_or(Error::MalformedFrame {
        layer,
        actual: data.len(),
        minimum: len,
    })?;
    *buf = &data[len..];
    Ok(header)
}

fn read_descriptors<'a>(buf: &mut &'a [u8], num_items: usize) -> Result<Vec<Descriptor>> {
    let data: &'a [u8] = *buf;
    let need = num_items * Descriptor::LEN;
    if data.len() < need {
        return Err(Error::MalformedFrame {
            layer: "item pointers",
            actual: data.len(),
            minimum: need,
        });
    }
    let (items, rest) = data.split_at(need);
    *buf = rest;
    Ok(items
        .chunks_exact(Descriptor::LEN)
        .filter_map(Descriptor::decode)
        .collect())
}

fn read_samples(buf: &[u8]) -> Result<Vec<i8>> {
    if buf.len() < SAMPLES_LEN {
        return Err(Error::MalformedFrame {
            layer: "sample block",
            actual: buf.len(),
            minimum: SAMPLES_LEN,
        });
    }
    Ok(buf[..SAMPLES_LEN].iter().map(|b| *b as i8).collect())
}

/// Decode a complete frame, including the Ethernet, IPv4, UDP and SPEAD headers.
///
/// Bytes following the sample block are ignored.
///
/// # Errors
/// [Error::MalformedFrame] if any header, the item pointers or the sample block are truncated.
pub fn decode(frame: &[u8]) -> Result<Packet> {
    let mut buf = frame;
    let ethernet = read_header(
        &mut buf,
        EthernetHeader::LEN,
        "ethernet header",
        EthernetHeader::decode,
    )?;
    let ipv4 = read_header(&mut buf, Ipv4Header::LEN, "ipv4 header", Ipv4Header::decode)?;
    let udp = read_header(&mut buf, UdpHeader::LEN, "udp header", UdpHeader::decode)?;
    let spead = read_header(&mut buf, SpeadHeader::LEN, "spead header", SpeadHeader::decode)?;
    let descriptors = read_descriptors(&mut buf, spead.num_items as usize)?;
    let samples = read_samples(buf)?;

    Ok(Packet {
        ethernet: Some(ethernet),
        ipv4: Some(ipv4),
        udp: Some(udp),
        spead: Some(spead),
        descriptors,
        samples,
    })
}

/// Decode a frame assuming fixed-size outer headers and exactly [LITE_NUM_ITEMS] item
/// pointers, skipping straight to [LITE_ITEMS_OFFSET].
///
/// Item and sample decoding are identical to [decode]; the outer headers are left `None`.
///
/// # Errors
/// [Error::MalformedFrame] if the frame is too short.
pub fn decode_lite(frame: &[u8]) -> Result<Packet> {
    let Some(mut buf) = frame.get(LITE_ITEMS_OFFSET..) else {
        return Err(Error::MalformedFrame {
            layer: "outer headers",
            actual: frame.len(),
            minimum: LITE_ITEMS_OFFSET,
        });
    };
    let descriptors = read_descriptors(&mut buf, LITE_NUM_ITEMS)?;
    let samples = read_samples(buf)?;

    Ok(Packet::new(descriptors, samples))
}
