use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use sealnote_core::{KeyChunks, Keypair, ResourceId, ResourceRef, SymmetricKey};
use sealnote_escrow::{cipher, EncryptedInput, NetworkSecret};

fn chunk_codec(c: &mut Criterion) {
    let key = SymmetricKey::generate();
    c.bench_function("chunks/split_join", |b| {
        b.iter(|| KeyChunks::split(black_box(&key)).join())
    });
}

fn payload_cipher(c: &mut Criterion) {
    let key = SymmetricKey::generate();
    let mut group = c.benchmark_group("cipher/encrypt");
    for size in [64usize, 4096, 65536] {
        let plaintext = vec![0x5Au8; size];
        group.bench_with_input(BenchmarkId::from_parameter(size), &plaintext, |b, p| {
            b.iter(|| cipher::encrypt(black_box(p), &key))
        });
    }
    group.finish();
}

fn seal_and_open(c: &mut Criterion) {
    let owner = Keypair::from_seed(&[1; 32]);
    let network = NetworkSecret::from_bytes([2; 32]);
    let public = network.public_key();
    let resource = ResourceRef::new(owner.principal(), ResourceId(0));
    let chunks = KeyChunks::split(&SymmetricKey::generate());

    c.bench_function("escrow/seal_key", |b| {
        b.iter(|| EncryptedInput::seal_key(&owner, resource, owner.principal(), &chunks, &public))
    });

    let input = EncryptedInput::seal_key(&owner, resource, owner.principal(), &chunks, &public)
        .unwrap();
    c.bench_function("escrow/open_handle", |b| {
        b.iter(|| input.handles[0].open(black_box(&network)))
    });
}

criterion_group!(benches, chunk_codec, payload_cipher, seal_and_open);
criterion_main!(benches);
