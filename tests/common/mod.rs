use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use pcap_file::pcap::{PcapPacket, PcapWriter};
use spead2dada::spead::{
    Descriptor, EthernetHeader, Ipv4Header, ItemName, MacAddr, Packet, SpeadHeader, UdpHeader,
    SAMPLES_LEN, TICKS_PER_HEAP,
};

/// Sample value for `idx` within the packet for `channel` of heap `heap`.
pub fn sample(heap: u64, channel: u64, idx: usize) -> i8 {
    (idx as u64 * 3 + channel * 11 + heap * 5) as u8 as i8
}

/// A packet as the F-engines send it, with 11 item pointers.
pub fn packet(timestamp: u64, feng_id: u64, frequency: u64, channel: u64, nchan: u64) -> Packet {
    let payload_size = SAMPLES_LEN as u64;
    let heap = timestamp / TICKS_PER_HEAP;
    let descriptors = vec![
        Descriptor::item(ItemName::HeapCounter, heap),
        Descriptor::item(ItemName::HeapSize, nchan * payload_size),
        Descriptor::item(ItemName::HeapOffset, channel * payload_size),
        Descriptor::item(ItemName::PayloadSize, payload_size),
        Descriptor::item(ItemName::Timestamp, timestamp),
        Descriptor::item(ItemName::FengId, feng_id),
        Descriptor::item(ItemName::Frequency, frequency),
        Descriptor::new(true, 0x4102, 1),
        Descriptor::new(true, 0x0006, 2),
        Descriptor::new(false, 0x0007, 3),
        Descriptor::item(ItemName::FengRaw, 0),
    ];
    let samples = (0..SAMPLES_LEN).map(|i| sample(heap, channel, i)).collect();

    let mut packet = Packet::new(descriptors, samples);
    packet.ethernet = Some(EthernetHeader {
        dest: MacAddr([0x01, 0x00, 0x5e, 0x0a, 0x00, 0x01]),
        src: MacAddr([0x02, 0x00, 0x0a, 0x64, 0x00, feng_id as u8]),
        frame_length: 0x0800,
    });
    packet.ipv4 = Some(Ipv4Header {
        udp_length: 1146,
        src: [10, 100, 0, feng_id as u8].into(),
        dest: [239, 10, 0, 1].into(),
    });
    packet.udp = Some(UdpHeader {
        src_port: 7148,
        dest_port: 7148,
        length: 1126,
        checksum: 0,
    });
    packet.spead = Some(SpeadHeader::default());
    packet
}

pub fn frame(timestamp: u64, feng_id: u64, frequency: u64, channel: u64, nchan: u64) -> Vec<u8> {
    packet(timestamp, feng_id, frequency, channel, nchan).encode()
}

/// Write `frames` to a capture file `name` in `dir`.
pub fn write_capture(dir: &Path, name: &str, frames: &[Vec<u8>]) -> PathBuf {
    let path = dir.join(name);
    let mut writer = PcapWriter::new(File::create(&path).unwrap()).unwrap();
    for (idx, frame) in frames.iter().enumerate() {
        let ts = Duration::from_micros(idx as u64);
        writer
            .write_packet(&PcapPacket::new(ts, frame.len() as u32, frame))
            .unwrap();
    }
    path
}
