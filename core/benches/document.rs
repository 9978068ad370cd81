use std::io::Cursor;

use axcrypt_core::prelude::*;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::OsRng;
use rand::RngCore;

fn config() -> DocumentConfig {
    DocumentConfig { v2_wrap_iterations: 1000, ..DocumentConfig::default() }
}

fn encrypt(version: DocumentVersion, data: &[u8], options: EncryptOptions) -> Vec<u8> {
    let mut doc = Document::create(version, &Passphrase::new("bench"), config(), &mut OsRng).unwrap();
    let mut out = Cursor::new(Vec::with_capacity(data.len() + 1024));
    doc.encrypt_to(&mut Cursor::new(data), OutputSink::Seekable(&mut out), options, &mut ProgressContext::new())
        .unwrap();
    out.into_inner()
}

fn bench_documents(c: &mut Criterion) {
    let mut group = c.benchmark_group("document");
    let sizes = [("4KB", 4 * 1024usize), ("256KB", 256 * 1024), ("4MB", 4 * 1024 * 1024)];

    for (label, size) in sizes {
        let mut data = vec![0u8; size];
        OsRng.fill_bytes(&mut data);
        group.throughput(Throughput::Bytes(size as u64));

        for (name, version) in [("v1", DocumentVersion::V1), ("v2", DocumentVersion::V2)] {
            group.bench_with_input(BenchmarkId::new(format!("encrypt_{name}"), label), &data, |b, d| {
                b.iter(|| encrypt(version, d, EncryptOptions::NO_COMPRESS));
            });

            let file = encrypt(version, &data, EncryptOptions::NO_COMPRESS);
            group.bench_with_input(BenchmarkId::new(format!("decrypt_{name}"), label), &file, |b, f| {
                b.iter(|| {
                    let mut doc =
                        open_document(&Passphrase::new("bench"), InputSource::Memory(f.clone()), &config()).unwrap();
                    let mut out = Vec::with_capacity(size);
                    doc.decrypt_to(&mut out, &mut ProgressContext::new()).unwrap();
                    out
                });
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_documents);
criterion_main!(benches);
