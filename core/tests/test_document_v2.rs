// V2 documents: streaming output, data parts, trailer and HMAC-SHA512.

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use axcrypt_core::prelude::*;
    use axcrypt_core::constants::BLOCK_PREFIX_LEN;
    use proptest::prelude::*;
    use rand::rngs::OsRng;

    // PlaintextLengths (5 + 16) and V2Hmac (5 + 64)
    const TRAILER_LEN: usize = 21 + 69;

    fn config() -> DocumentConfig {
        DocumentConfig { chunk_size: 1024, v2_wrap_iterations: 1000, ..DocumentConfig::default() }
    }

    fn encrypt(plain: &[u8], pass: &str, options: EncryptOptions) -> Vec<u8> {
        let mut doc = V2Document::create(&Passphrase::new(pass), config(), &mut OsRng).unwrap();
        let mut out = Vec::new();
        doc.encrypt_to(
            &mut Cursor::new(plain.to_vec()),
            OutputSink::Stream(&mut out),
            options,
            &mut ProgressContext::new(),
        )
        .unwrap();
        out
    }

    fn load(bytes: Vec<u8>, pass: &str) -> (V2Document, bool) {
        let mut doc = V2Document::new(config()).unwrap();
        let ok = doc.load(&Passphrase::new(pass), InputSource::Memory(bytes)).unwrap();
        (doc, ok)
    }

    fn decrypt(bytes: Vec<u8>, pass: &str) -> Result<Vec<u8>, DocumentError> {
        let (mut doc, ok) = load(bytes, pass);
        assert!(ok);
        let mut out = Vec::new();
        doc.decrypt_to(&mut out, &mut ProgressContext::new())?;
        Ok(out)
    }

    #[test]
    fn hello_world_round_trip() {
        let file = encrypt(b"HelloWorld", "a", EncryptOptions::NO_COMPRESS);
        let (mut doc, ok) = load(file, "a");
        assert!(ok);
        assert_eq!(doc.headers().unwrap().file_version().file_major, 4);
        // Lengths live in the trailer.
        assert_eq!(doc.headers().unwrap().plaintext_length(), None);

        let mut out = Vec::new();
        doc.decrypt_to(&mut out, &mut ProgressContext::new()).unwrap();
        assert_eq!(out, b"HelloWorld");
        assert_eq!(doc.headers().unwrap().plaintext_length(), Some(10));
    }

    #[test]
    fn wrong_passphrase_returns_false() {
        let file = encrypt(b"HelloWorld", "a", EncryptOptions::NO_COMPRESS);
        let (doc, ok) = load(file, "b");
        assert!(!ok);
        assert_eq!(doc.state(), LoadState::Invalid);
        assert!(doc.headers().is_none());
    }

    #[test]
    fn seekable_sink_is_accepted_too() {
        let mut doc = V2Document::create(&Passphrase::new("s"), config(), &mut OsRng).unwrap();
        let mut out = Cursor::new(Vec::new());
        let snap = doc
            .encrypt_to(&mut Cursor::new(vec![9u8; 4000]), OutputSink::Seekable(&mut out), EncryptOptions::COMPRESS, &mut ProgressContext::new())
            .unwrap();
        let bytes = out.into_inner();
        assert_eq!(snap.output_bytes(), bytes.len() as u64);
        assert_eq!(decrypt(bytes, "s").unwrap(), vec![9u8; 4000]);
    }

    #[test]
    fn data_is_split_into_parts() {
        let data: Vec<u8> = (0..5000u32).map(|i| (i % 256) as u8).collect();
        let file = encrypt(&data, "p", EncryptOptions::NO_COMPRESS);
        let (mut doc, _) = load(file.clone(), "p");
        let offset = doc.ciphertext_offset().unwrap() as usize;

        // 5008 ciphertext bytes in 1024-byte parts: 4 full parts and one of 912.
        let region = file.len() - offset - TRAILER_LEN;
        assert_eq!(region, 5008 + 5 * BLOCK_PREFIX_LEN);
        assert_eq!(file[offset], 81);

        let mut out = Vec::new();
        doc.decrypt_to(&mut out, &mut ProgressContext::new()).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn compressed_lengths_come_from_trailer() {
        let text = "lorem ipsum dolor sit amet ".repeat(1500);
        let file = encrypt(text.as_bytes(), "c", EncryptOptions::COMPRESS);
        let (mut doc, _) = load(file, "c");
        let mut out = Vec::new();
        doc.decrypt_to(&mut out, &mut ProgressContext::new()).unwrap();
        assert_eq!(out, text.as_bytes());

        let headers = doc.headers().unwrap();
        assert!(headers.is_compressed());
        assert_eq!(headers.plaintext_length(), Some(text.len() as u64));
        assert!(headers.compressed_length().unwrap() < text.len() as u64);
    }

    #[test]
    fn tampered_tag_fails_integrity() {
        let mut file = encrypt(b"HelloWorld", "a", EncryptOptions::NO_COMPRESS);
        let last = file.len() - 1;
        file[last] ^= 0x01;
        assert!(matches!(decrypt(file, "a"), Err(DocumentError::Integrity)));
    }

    #[test]
    fn tampered_lengths_trailer_fails_integrity() {
        let mut file = encrypt(b"HelloWorld", "a", EncryptOptions::NO_COMPRESS);
        let pos = file.len() - 69 - 8;
        file[pos] ^= 0x01;
        assert!(matches!(decrypt(file, "a"), Err(DocumentError::Integrity)));
    }

    #[test]
    fn tampered_header_fails_integrity() {
        let mut file = encrypt(b"HelloWorld", "a", EncryptOptions::NO_COMPRESS);
        // Random preamble bytes are covered by the HMAC.
        file[21] ^= 0x01;
        assert!(matches!(decrypt(file, "a"), Err(DocumentError::Integrity)));
    }

    #[test]
    fn data_part_framing_flips_fail_integrity() {
        let file = encrypt(&vec![0x33u8; 3000], "frame", EncryptOptions::NO_COMPRESS);
        let (doc, _) = load(file.clone(), "frame");
        let first = doc.ciphertext_offset().unwrap() as usize;
        // Fourth part: 3008 bytes in 1024-byte parts leaves 960 bytes at the end.
        let last = first + 3 * (BLOCK_PREFIX_LEN + 1024);
        assert_eq!(file[last], 81);

        for part in [first, last] {
            for i in 0..BLOCK_PREFIX_LEN {
                for mask in [0x01u8, 0x02, 0x80, 0xFF] {
                    let mut tampered = file.clone();
                    tampered[part + i] ^= mask;
                    let err = decrypt(tampered, "frame").unwrap_err();
                    assert_eq!(err.kind(), ErrorKind::Integrity, "byte {} mask {:#x}", part + i, mask);
                }
            }
        }
    }

    #[test]
    fn truncated_data_region_fails_integrity() {
        let file = encrypt(&vec![0x44u8; 3000], "cut", EncryptOptions::NO_COMPRESS);
        let (doc, _) = load(file.clone(), "cut");
        let offset = doc.ciphertext_offset().unwrap() as usize;
        // Inside a part, right after the lengths trailer, and inside the HMAC block.
        for end in [offset + 700, file.len() - 69, file.len() - 10] {
            let err = decrypt(file[..end].to_vec(), "cut").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Integrity, "cut at {}", end);
        }
    }

    #[test]
    fn rewrap_of_a_reframed_file_fails_integrity() {
        let file = encrypt(&vec![0x55u8; 2000], "old", EncryptOptions::NO_COMPRESS);
        let (doc, _) = load(file.clone(), "old");
        let offset = doc.ciphertext_offset().unwrap() as usize;
        let mut tampered = file;
        tampered[offset] = 0xEE;

        let (mut doc, _) = load(tampered, "old");
        let mut out = Vec::new();
        let err = doc
            .rewrap_to(
                &Passphrase::new("old"),
                &Passphrase::new("new"),
                OutputSink::Stream(&mut out),
                &mut ProgressContext::new(),
                &mut OsRng,
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity);
    }

    #[test]
    fn rewrap_to_requires_the_current_passphrase() {
        let file = encrypt(b"V2 wrong current passphrase", "old", EncryptOptions::COMPRESS);
        let (mut doc, _) = load(file, "old");
        let mut out = Vec::new();
        let err = doc
            .rewrap_to(
                &Passphrase::new("new"),
                &Passphrase::new("newer"),
                OutputSink::Stream(&mut out),
                &mut ProgressContext::new(),
                &mut OsRng,
            )
            .unwrap_err();
        assert!(matches!(err, DocumentError::WrongPassphrase));
        assert!(out.is_empty());
    }

    #[test]
    fn rewrap_to_streams_a_new_key_wrap() {
        let data = b"V2 rewrap keeps the data intact".repeat(100);
        let file = encrypt(&data, "old", EncryptOptions::COMPRESS);
        let (mut doc, _) = load(file.clone(), "old");
        let mut out = Vec::new();
        doc.rewrap_to(
            &Passphrase::new("old"),
            &Passphrase::new("new"),
            OutputSink::Stream(&mut out),
            &mut ProgressContext::new(),
            &mut OsRng,
        )
        .unwrap();
        assert_eq!(out.len(), file.len());

        let (_, old_ok) = load(out.clone(), "old");
        assert!(!old_ok);
        assert_eq!(decrypt(out, "new").unwrap(), data);
    }

    #[test]
    fn v1_suite_is_rejected() {
        let err = V2Document::with_suite(CryptoSuite::V1, config()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_round_trip(data in proptest::collection::vec(any::<u8>(), 0..4096), compress in any::<bool>()) {
            let options = if compress { EncryptOptions::COMPRESS } else { EncryptOptions::NO_COMPRESS };
            let file = encrypt(&data, "prop", options);
            prop_assert_eq!(decrypt(file, "prop").unwrap(), data);
        }

        #[test]
        fn prop_any_ciphertext_flip_fails_integrity(seed in any::<u64>(), bit in 0u8..8) {
            let data = vec![0x5Au8; 700];
            let file = encrypt(&data, "flip", EncryptOptions::NO_COMPRESS);
            let (doc, _) = load(file.clone(), "flip");
            let start = doc.ciphertext_offset().unwrap() as usize + BLOCK_PREFIX_LEN;
            let end = file.len() - TRAILER_LEN;
            let pos = start + (seed as usize % (end - start));

            let mut tampered = file;
            tampered[pos] ^= 1 << bit;
            let err = decrypt(tampered, "flip").unwrap_err();
            prop_assert_eq!(err.kind(), ErrorKind::Integrity);
        }
    }
}
