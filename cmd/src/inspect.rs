use std::collections::BTreeMap;
use std::io::{stdout, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use spead2dada::capture::read_packets;
use spead2dada::spead::{ItemName, Packet};

#[derive(Serialize)]
struct Line<'a> {
    index: usize,
    packet: &'a Packet,
    items: BTreeMap<ItemName, u64>,
}

pub fn inspect(input: &Path, npackets: usize) -> Result<()> {
    let packets = read_packets(input, Some(npackets))
        .with_context(|| format!("decoding packets from {input:?}"))?;

    let mut out = BufWriter::new(stdout().lock());
    for (index, packet) in packets.iter().enumerate() {
        let line = Line {
            index,
            packet,
            items: packet.items(),
        };
        serde_json::to_writer(&mut out, &line).context("serializing to json")?;
        writeln!(out).context("writing to stdout")?;
    }
    out.flush().context("writing to stdout")
}
