#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::time::Duration;

    use axcrypt_core::prelude::*;
    use axcrypt_core::telemetry::{Stage, TelemetryCounters, TelemetryTimer};
    use rand::rngs::OsRng;

    #[test]
    fn counters_accumulate() {
        let mut a = TelemetryCounters::default();
        a.add_header(100);
        a.add_chunk(1024, 512, 512);
        a.add_tail(0, 10, 16);

        let mut b = TelemetryCounters::default();
        b.add_chunk(10, 10, 16);
        a += b;

        assert_eq!(a.chunks, 2);
        assert_eq!(a.bytes_plaintext, 1034);
        assert_eq!(a.bytes_compressed, 532);
        assert_eq!(a.total_output_bytes(), 100 + 544);
    }

    #[test]
    fn snapshot_ratio_and_json() {
        let mut counters = TelemetryCounters::default();
        counters.add_chunk(1000, 250, 256);
        let mut timer = TelemetryTimer::new();
        timer.stage_times.add(Stage::Encrypt, Duration::from_millis(3));
        timer.finish();

        let snap = TelemetrySnapshot::from(&counters, &timer);
        assert!((snap.compression_ratio - 0.25).abs() < f64::EPSILON);
        assert_eq!(snap.stage_times.get(Stage::Encrypt), Duration::from_millis(3));
        assert!(snap.to_json().unwrap().contains("\"bytes_plaintext\":1000"));

        let empty = TelemetrySnapshot::from(&TelemetryCounters::default(), &timer);
        assert_eq!(empty.compression_ratio, 0.0);
    }

    #[test]
    fn encrypt_pass_counts_chunks() {
        let config = DocumentConfig { chunk_size: 1024, v2_wrap_iterations: 1000, ..DocumentConfig::default() };
        for version in [DocumentVersion::V1, DocumentVersion::V2] {
            let mut doc = Document::create(version, &Passphrase::new("t"), config.clone(), &mut OsRng).unwrap();
            let mut out = Cursor::new(Vec::new());
            let snap = doc
                .encrypt_to(
                    &mut Cursor::new(vec![7u8; 5000]),
                    OutputSink::Seekable(&mut out),
                    EncryptOptions::NO_COMPRESS,
                    &mut ProgressContext::new(),
                )
                .unwrap();
            assert_eq!(snap.chunks, 5);
            assert_eq!(snap.bytes_plaintext, 5000);
            assert_eq!(snap.bytes_ciphertext, 5008);
            assert_eq!(snap.output_bytes(), out.into_inner().len() as u64);
        }
    }
}
