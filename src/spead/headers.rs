use std::fmt::Display;
use std::net::Ipv4Addr;

use serde::{Serialize, Serializer};

/// Ethernet hardware address.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct MacAddr(pub [u8; 6]);

impl Display for MacAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl Serialize for MacAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Ethernet II header.
#[derive(Serialize, Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct EthernetHeader {
    pub dest: MacAddr,
    pub src: MacAddr,
    /// The 2-byte length/EtherType field.
    pub frame_length: u16,
}

impl EthernetHeader {
    pub const LEN: usize = 14;

    /// Decode from bytes. Returns `None` if there are not enough bytes to construct the
    /// header.
    #[must_use]
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::LEN {
            return None;
        }
        let mut dest = [0u8; 6];
        let mut src = [0u8; 6];
        dest.copy_from_slice(&buf[0..6]);
        src.copy_from_slice(&buf[6..12]);
        Some(EthernetHeader {
            dest: MacAddr(dest),
            src: MacAddr(src),
            frame_length: u16::from_be_bytes([buf[12], buf[13]]),
        })
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.dest.0);
        buf.extend_from_slice(&self.src.0);
        buf.extend_from_slice(&self.frame_length.to_be_bytes());
    }
}

/// The IPv4 header fields we keep. Everything else in the 20 byte header is skipped.
#[derive(Serialize, Debug, Copy, Clone, PartialEq, Eq)]
pub struct Ipv4Header {
    /// Bytes 2..4 of the IPv4 header.
    pub udp_length: u16,
    pub src: Ipv4Addr,
    pub dest: Ipv4Addr,
}

impl Ipv4Header {
    /// Fixed header length; options are not supported.
    pub const LEN: usize = 20;

    #[must_use]
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::LEN {
            return None;
        }
        Some(Ipv4Header {
            udp_length: u16::from_be_bytes([buf[2], buf[3]]),
            src: Ipv4Addr::new(buf[12], buf[13], buf[14], buf[15]),
            dest: Ipv4Addr::new(buf[16], buf[17], buf[18], buf[19]),
        })
    }

    /// Writes a minimal header: version/IHL, length, TTL, protocol UDP and addresses. The
    /// checksum is left zero.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        let mut hdr = [0u8; Self::LEN];
        hdr[0] = 0x45;
        hdr[2..4].copy_from_slice(&self.udp_length.to_be_bytes());
        hdr[8] = 64;
        hdr[9] = 17;
        hdr[12..16].copy_from_slice(&self.src.octets());
        hdr[16..20].copy_from_slice(&self.dest.octets());
        buf.extend_from_slice(&hdr);
    }
}

impl Default for Ipv4Header {
    fn default() -> Self {
        Ipv4Header {
            udp_length: 0,
            src: Ipv4Addr::UNSPECIFIED,
            dest: Ipv4Addr::UNSPECIFIED,
        }
    }
}

#[derive(Serialize, Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct UdpHeader {
    pub src_port: u16,
    pub dest_port: u16,
    pub length: u16,
    pub checksum: u16,
}

impl UdpHeader {
    pub const LEN: usize = 8;

    #[must_use]
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::LEN {
            return None;
        }
        Some(UdpHeader {
            src_port: u16::from_be_bytes([buf[0], buf[1]]),
            dest_port: u16::from_be_bytes([buf[2], buf[3]]),
            length: u16::from_be_bytes([buf[4], buf[5]]),
            checksum: u16::from_be_bytes([buf[6], buf[7]]),
        })
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.src_port.to_be_bytes());
        buf.extend_from_slice(&self.dest_port.to_be_bytes());
        buf.extend_from_slice(&self.length.to_be_bytes());
        buf.extend_from_slice(&self.checksum.to_be_bytes());
    }
}

/// SPEAD packet header.
#[derive(Serialize, Debug, Copy, Clone, PartialEq, Eq)]
pub struct SpeadHeader {
    pub magic: u8,
    pub version: u8,
    pub item_pointer_width: u8,
    pub heap_addr_width: u8,
    pub reserved: u16,
    pub num_items: u16,
}

impl SpeadHeader {
    pub const LEN: usize = 8;
    pub const MAGIC: u8 = 0x53;

    #[must_use]
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::LEN {
            return None;
        }
        Some(SpeadHeader {
            magic: buf[0],
            version: buf[1],
            item_pointer_width: buf[2],
            heap_addr_width: buf[3],
            reserved: u16::from_be_bytes([buf[4], buf[5]]),
            num_items: u16::from_be_bytes([buf[6], buf[7]]),
        })
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&[
            self.magic,
            self.version,
            self.item_pointer_width,
            self.heap_addr_width,
        ]);
        buf.extend_from_slice(&self.reserved.to_be_bytes());
        buf.extend_from_slice(&self.num_items.to_be_bytes());
    }
}

impl Default for SpeadHeader {
    /// SPEAD-64-48 as emitted by the F-engines.
    fn default() -> Self {
        SpeadHeader {
            magic: Self::MAGIC,
            version: 4,
            item_pointer_width: 2,
            heap_addr_width: 6,
            reserved: 0,
            num_items: 0,
        }
    }
}
