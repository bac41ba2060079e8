mod common;

use std::fs;
use std::path::Path;

use common::{frame, sample, write_capture};
use spead2dada::capture::open_capture;
use spead2dada::dada::{parse_header, HEADER_LEN};
use spead2dada::spead::{NDIM, NPOL, NSAMPS_PER_PACKET, SAMPLES_LEN, TICKS_PER_HEAP};
use spead2dada::{
    stream_to_buffers, DecodeMode, FileOutput, ObservationConfig, RingBufferManager, RunSummary,
    StreamOptions,
};

const T0: u64 = 500 * TICKS_PER_HEAP;
const NCHAN: u64 = 8;

fn config() -> ObservationConfig {
    ObservationConfig::builder()
        .feng_nchan(4096)
        .sync_epoch(1_554_000_000.0)
        .obs_id("test-obs")
        .build()
}

fn run(capture: &Path, out: &Path, mode: DecodeMode) -> RunSummary {
    let frames = open_capture(capture).unwrap();
    let manager = RingBufferManager::new(config(), FileOutput::new(out, Some("obs".to_string())));
    let options = StreamOptions::builder().decode_mode(mode).batch_size(5).build();
    stream_to_buffers(frames, manager, &options).unwrap()
}

/// Expected output bytes for the heap at `T0 + heap * TICKS_PER_HEAP` of an `NCHAN` channel
/// stream.
fn heap_bytes(heap: u64) -> Vec<u8> {
    let heap = T0 / TICKS_PER_HEAP + heap;
    let stride = NPOL * NDIM;
    let mut out = Vec::with_capacity(NCHAN as usize * SAMPLES_LEN);
    for samp in 0..NSAMPS_PER_PACKET {
        for chan in 0..NCHAN {
            for k in 0..stride {
                out.push(sample(heap, chan, samp * stride + k) as u8);
            }
        }
    }
    out
}

/// All channels of heaps `0..nheaps`, each heap's last channel sent early, in the middle of
/// the previous heap.
fn reordered_frames(feng_id: u64, frequency: u64, nheaps: u64) -> Vec<Vec<u8>> {
    let mut frames = Vec::new();
    for heap in 0..nheaps {
        for chan in (0..NCHAN).rev() {
            if heap > 0 && chan == NCHAN - 1 {
                continue;
            }
            frames.push(frame(T0 + heap * TICKS_PER_HEAP, feng_id, frequency, chan, NCHAN));
            if chan == 2 && heap + 1 < nheaps {
                let next = T0 + (heap + 1) * TICKS_PER_HEAP;
                frames.push(frame(next, feng_id, frequency, NCHAN - 1, NCHAN));
            }
        }
    }
    frames
}

fn ordered_frames(feng_id: u64, frequency: u64, nheaps: u64) -> Vec<Vec<u8>> {
    (0..nheaps)
        .flat_map(|heap| {
            (0..NCHAN).map(move |chan| {
                frame(T0 + heap * TICKS_PER_HEAP, feng_id, frequency, chan, NCHAN)
            })
        })
        .collect()
}

#[test]
fn test_end_to_end_single_stream() {
    let dir = tempfile::tempdir().unwrap();
    let frames = ordered_frames(4, 2, 3);
    let capture = write_capture(dir.path(), "input.pcap", &frames);

    let summary = run(&capture, dir.path(), DecodeMode::Lite);

    assert_eq!(summary.frames_read, 24);
    assert_eq!(summary.packets_inserted, 24);
    assert_eq!(summary.packets_discarded, 0);
    assert_eq!(summary.streams.len(), 1);
    let stream = &summary.streams[0];
    assert_eq!(stream.stats.heaps_written, 3);
    assert_eq!(stream.nchan, Some(NCHAN as usize));

    let path = dir.path().join("obs_04_00002.dada");
    assert_eq!(stream.path.as_deref(), Some(path.as_path()));
    let data = fs::read(&path).unwrap();
    assert_eq!(data.len(), HEADER_LEN + 3 * 8 * 256 * 2 * 2);

    let header = parse_header(&data).unwrap();
    assert_eq!(header["OBS_ID"], "test-obs");
    assert_eq!(header["NCHAN"], "8");
    assert_eq!(header["UTC_START"], "2019-03-31-02:40:00.000000000");

    let heap_len = NCHAN as usize * SAMPLES_LEN;
    for heap in 0..3 {
        let start = HEADER_LEN + heap * heap_len;
        assert_eq!(
            data[start..start + heap_len],
            heap_bytes(heap as u64)[..],
            "heap {heap}"
        );
    }
}

#[test]
fn test_reordered_packets_match_ordered() {
    let dir = tempfile::tempdir().unwrap();
    let ordered_dir = dir.path().join("ordered");
    let reordered_dir = dir.path().join("reordered");
    fs::create_dir_all(&ordered_dir).unwrap();
    fs::create_dir_all(&reordered_dir).unwrap();

    let ordered = ordered_frames(1, 0, 4);
    let reordered = reordered_frames(1, 0, 4);
    assert_eq!(reordered.len(), ordered.len());

    run(
        &write_capture(dir.path(), "ordered.pcap", &ordered),
        &ordered_dir,
        DecodeMode::Full,
    );
    let summary = run(
        &write_capture(dir.path(), "reordered.pcap", &reordered),
        &reordered_dir,
        DecodeMode::Lite,
    );

    assert_eq!(summary.packets_discarded, 0);
    let a = fs::read(ordered_dir.join("obs_01_00000.dada")).unwrap();
    let b = fs::read(reordered_dir.join("obs_01_00000.dada")).unwrap();
    assert_eq!(a.len(), HEADER_LEN + 4 * NCHAN as usize * SAMPLES_LEN);
    assert_eq!(a, b);
}

#[test]
fn test_late_packet_is_discarded() {
    let dir = tempfile::tempdir().unwrap();
    let clean_dir = dir.path().join("clean");
    let late_dir = dir.path().join("late");
    fs::create_dir_all(&clean_dir).unwrap();
    fs::create_dir_all(&late_dir).unwrap();

    let clean = ordered_frames(4, 2, 4);
    // mid-stream, a packet one heap period before the first timestamp
    let mut late = clean.clone();
    late.insert(20, frame(T0 - TICKS_PER_HEAP, 4, 2, 0, NCHAN));

    run(&write_capture(dir.path(), "clean.pcap", &clean), &clean_dir, DecodeMode::Lite);
    let summary = run(&write_capture(dir.path(), "late.pcap", &late), &late_dir, DecodeMode::Lite);

    assert_eq!(summary.packets_discarded, 1);
    assert_eq!(summary.streams[0].stats.packets_discarded, 1);
    assert_eq!(
        fs::read(clean_dir.join("obs_04_00002.dada")).unwrap(),
        fs::read(late_dir.join("obs_04_00002.dada")).unwrap()
    );
}

#[test]
fn test_multiple_streams() {
    let dir = tempfile::tempdir().unwrap();
    let mut frames = Vec::new();
    for heap in 0..2 {
        for chan in 0..NCHAN {
            for feng_id in [0, 63] {
                for frequency in [0, 2048] {
                    frames.push(frame(T0 + heap * TICKS_PER_HEAP, feng_id, frequency, chan, NCHAN));
                }
            }
        }
    }
    let capture = write_capture(dir.path(), "input.pcap", &frames);

    let summary = run(&capture, dir.path(), DecodeMode::Lite);

    assert_eq!(summary.streams.len(), 4);
    for name in [
        "obs_00_00000.dada",
        "obs_00_02048.dada",
        "obs_63_00000.dada",
        "obs_63_02048.dada",
    ] {
        let data = fs::read(dir.path().join(name)).unwrap();
        assert_eq!(data.len(), HEADER_LEN + 2 * NCHAN as usize * SAMPLES_LEN, "{name}");
    }

    let low = parse_header(&fs::read(dir.path().join("obs_00_00000.dada")).unwrap()).unwrap();
    let high = parse_header(&fs::read(dir.path().join("obs_00_02048.dada")).unwrap()).unwrap();
    let low: f64 = low["FREQ"].parse().unwrap();
    let high: f64 = high["FREQ"].parse().unwrap();
    assert!((high - low - 2048.0 * 856.0 / 4096.0).abs() < 1e-9);
}

#[test]
fn test_frame_cap() {
    let dir = tempfile::tempdir().unwrap();
    let frames = ordered_frames(4, 2, 3);
    let capture = write_capture(dir.path(), "input.pcap", &frames);

    let manager = RingBufferManager::new(config(), FileOutput::new(dir.path(), None));
    let options = StreamOptions::builder().max_packets(NCHAN as usize).build();
    let summary = stream_to_buffers(open_capture(&capture).unwrap(), manager, &options).unwrap();

    assert_eq!(summary.frames_read, NCHAN as usize);
    let data = fs::read(dir.path().join("04_00002.dada")).unwrap();
    assert_eq!(data.len(), HEADER_LEN + NCHAN as usize * SAMPLES_LEN);
    assert_eq!(data[HEADER_LEN..], heap_bytes(0)[..]);
}
