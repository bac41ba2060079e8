use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;

use spead2dada::heap::Heap;
use spead2dada::spead::{decode, decode_lite, Descriptor, ItemName, Packet, SAMPLES_LEN};

// A packet with random samples for channel `channel` of an `nchan` channel heap.
fn random_packet(channel: u64, nchan: u64) -> Packet {
    let mut rng = rand::thread_rng();
    let payload_size = SAMPLES_LEN as u64;
    let descriptors = vec![
        Descriptor::item(ItemName::HeapCounter, 1),
        Descriptor::item(ItemName::HeapSize, nchan * payload_size),
        Descriptor::item(ItemName::HeapOffset, channel * payload_size),
        Descriptor::item(ItemName::PayloadSize, payload_size),
        Descriptor::item(ItemName::Timestamp, 2_097_152),
        Descriptor::item(ItemName::FengId, 3),
        Descriptor::item(ItemName::Frequency, 1024),
        Descriptor::new(true, 0x4102, 0),
        Descriptor::new(true, 0x0006, 0),
        Descriptor::new(false, 0x0007, 0),
        Descriptor::item(ItemName::FengRaw, 0),
    ];
    let samples = (0..SAMPLES_LEN).map(|_| rng.gen::<i8>()).collect();
    Packet::new(descriptors, samples)
}

fn bench_decode(c: &mut Criterion) {
    let frame = random_packet(0, 1).encode();

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(frame.len() as u64));
    group.bench_function("full", |b| {
        b.iter(|| decode(&frame).unwrap());
    });
    group.bench_function("lite", |b| {
        b.iter(|| decode_lite(&frame).unwrap());
    });
    group.finish();
}

fn bench_heap(c: &mut Criterion) {
    let mut group = c.benchmark_group("heap");
    for nchan in [8u64, 64] {
        let packets: Vec<Packet> = (0..nchan).map(|chan| random_packet(chan, nchan)).collect();
        let mut heap = Heap::new(nchan as usize);
        group.throughput(Throughput::Bytes(nchan * SAMPLES_LEN as u64));

        group.bench_with_input(BenchmarkId::new("add", nchan), &packets, |b, packets| {
            b.iter(|| {
                heap.reset();
                for packet in packets {
                    heap.add(packet).unwrap();
                }
            });
        });
        group.bench_with_input(BenchmarkId::new("to_bytes", nchan), &heap, |b, heap| {
            b.iter(|| heap.to_bytes());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_decode, bench_heap);
criterion_main!(benches);
