//! Benchmarks for veil-crypto

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use veil_crypto::{
    obscure::{obscure, reveal},
    KeyMaterial, NameCipher, NameEncoding, NameMode, Signer,
};

fn bench_key_derivation(c: &mut Criterion) {
    let mut group = c.benchmark_group("key_derivation");
    group.sample_size(10);

    group.bench_function("scrypt-default-salt", |b| {
        b.iter(|| KeyMaterial::derive("secret", "").unwrap())
    });
    group.bench_function("scrypt-custom-salt", |b| {
        b.iter(|| KeyMaterial::derive("secret", "pepper").unwrap())
    });

    group.finish();
}

fn bench_names(c: &mut Criterion) {
    let mut group = c.benchmark_group("names");
    let material = KeyMaterial::derive("secret", "").unwrap();

    for len in [8usize, 64, 255].iter() {
        let name = "n".repeat(*len);
        group.throughput(Throughput::Bytes(*len as u64));

        for (label, mode, encoding) in [
            ("standard-base32", NameMode::Standard, NameEncoding::Base32),
            ("standard-base64", NameMode::Standard, NameEncoding::Base64),
            ("obfuscate", NameMode::Obfuscate, NameEncoding::Base32),
        ] {
            let cipher = NameCipher::new(&material, mode, encoding, true, ".bin");
            group.bench_with_input(
                BenchmarkId::new(format!("{label}-encrypt"), len),
                &name,
                |b, name| b.iter(|| cipher.encrypt_file_name(name).unwrap()),
            );

            let encrypted = cipher.encrypt_file_name(&name).unwrap();
            group.bench_with_input(
                BenchmarkId::new(format!("{label}-decrypt"), len),
                &encrypted,
                |b, encrypted| b.iter(|| cipher.decrypt_file_name(encrypted).unwrap()),
            );
        }
    }

    group.finish();
}

fn bench_secrets(c: &mut Criterion) {
    let mut group = c.benchmark_group("secrets");

    let obscured = obscure("correct horse battery staple").unwrap();
    group.bench_function("reveal", |b| b.iter(|| reveal(&obscured).unwrap()));

    let signer = Signer::new("token", None);
    let token = signer.sign("/encrypted-mount/docs/report.pdf");
    group.bench_function("sign", |b| {
        b.iter(|| signer.sign("/encrypted-mount/docs/report.pdf"))
    });
    group.bench_function("verify", |b| {
        b.iter(|| signer.verify("/encrypted-mount/docs/report.pdf", &token).unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_key_derivation, bench_names, bench_secrets);
criterion_main!(benches);
