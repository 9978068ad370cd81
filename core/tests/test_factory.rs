// Version dispatch, cross-generation gates and file helpers.

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use axcrypt_core::prelude::*;
    use axcrypt_core::constants::{BLOCK_PREFIX_LEN, MAGIC_GUID};
    use chrono::{DateTime, Utc};
    use rand::rngs::OsRng;

    fn config() -> DocumentConfig {
        DocumentConfig { chunk_size: 1024, v2_wrap_iterations: 1000, ..DocumentConfig::default() }
    }

    fn encrypt(version: DocumentVersion, plain: &[u8], pass: &str) -> Vec<u8> {
        let mut doc = Document::create(version, &Passphrase::new(pass), config(), &mut OsRng).unwrap();
        let mut out = Cursor::new(Vec::new());
        doc.encrypt_to(
            &mut Cursor::new(plain.to_vec()),
            OutputSink::Seekable(&mut out),
            EncryptOptions::COMPRESS,
            &mut ProgressContext::new(),
        )
        .unwrap();
        out.into_inner()
    }

    /// Offset of the file-major byte inside the Version block.
    fn version_major_offset() -> usize {
        MAGIC_GUID.len() + BLOCK_PREFIX_LEN + 16 + BLOCK_PREFIX_LEN
    }

    /// Copy of `file` with the first header block of type `tag` cut out.
    fn without_block(file: &[u8], tag: u8) -> Vec<u8> {
        let mut at = MAGIC_GUID.len();
        loop {
            let len = u32::from_le_bytes(file[at + 1..at + 5].try_into().unwrap()) as usize;
            let end = at + BLOCK_PREFIX_LEN + len;
            if file[at] == tag {
                return [&file[..at], &file[end..]].concat();
            }
            at = end;
        }
    }

    #[test]
    fn dispatches_by_major_version() {
        for version in [DocumentVersion::V1, DocumentVersion::V2] {
            let file = encrypt(version, b"dispatch me", "k");
            let mut doc = open_document(&Passphrase::new("k"), InputSource::Memory(file), &config()).unwrap();
            assert_eq!(doc.version(), version);
            assert!(doc.passphrase_is_valid());

            let mut out = Vec::new();
            doc.decrypt_to(&mut out, &mut ProgressContext::new()).unwrap();
            assert_eq!(out, b"dispatch me");
            assert_eq!(doc.plaintext_length(), Some(11));
            assert_eq!(doc.is_compressed(), Some(true));
        }
    }

    #[test]
    fn loading_twice_reports_identical_headers() {
        for version in [DocumentVersion::V1, DocumentVersion::V2] {
            let file = encrypt(version, b"same headers every time", "k");
            // 67 is the FileInfo block.
            for bytes in [file.clone(), without_block(&file, 67)] {
                let open = || open_document(&Passphrase::new("k"), InputSource::Memory(bytes.clone()), &config()).unwrap();
                let (a, b) = (open(), open());
                assert!(a.passphrase_is_valid() && b.passphrase_is_valid());
                assert_eq!(a.file_version(), b.file_version());
                assert_eq!(a.file_name(), b.file_name());
                assert_eq!(a.creation_time(), b.creation_time());
                assert_eq!(a.last_access_time(), b.last_access_time());
                assert_eq!(a.last_write_time(), b.last_write_time());
                assert_eq!(a.is_compressed(), b.is_compressed());
                assert_eq!(a.plaintext_length(), b.plaintext_length());
                assert_eq!(a.ciphertext_offset(), b.ciphertext_offset());
            }

            let stripped = open_document(&Passphrase::new("k"), InputSource::Memory(without_block(&file, 67)), &config())
                .unwrap();
            assert_eq!(stripped.creation_time(), Some(DateTime::<Utc>::UNIX_EPOCH));
            assert_eq!(stripped.last_write_time(), Some(DateTime::<Utc>::UNIX_EPOCH));
        }
    }

    #[test]
    fn wrong_passphrase_yields_invalid_document() {
        let file = encrypt(DocumentVersion::V2, b"x", "right");
        let doc = open_document(&Passphrase::new("wrong"), InputSource::Memory(file), &config()).unwrap();
        assert!(!doc.passphrase_is_valid());
        assert_eq!(doc.file_name(), None);
    }

    #[test]
    fn detect_version_reads_prologue_only() {
        let v1 = encrypt(DocumentVersion::V1, b"a", "p");
        let v2 = encrypt(DocumentVersion::V2, b"a", "p");
        assert_eq!(detect_version(&mut Cursor::new(&v1[..])).unwrap().file_major, 3);
        assert_eq!(detect_version(&mut Cursor::new(&v2[..])).unwrap().file_major, 4);

        let prologue_len = version_major_offset() + 5;
        assert_eq!(detect_version(&mut &v2[..prologue_len]).unwrap().file_minor, 0);
    }

    #[test]
    fn bad_magic_is_format_error() {
        let mut file = encrypt(DocumentVersion::V1, b"a", "p");
        file[0] ^= 0xFF;
        let err = open_document(&Passphrase::new("p"), InputSource::Memory(file), &config()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn future_major_requires_upgrade() {
        let mut file = encrypt(DocumentVersion::V2, b"a", "p");
        file[version_major_offset()] = 5;
        let err = open_document(&Passphrase::new("p"), InputSource::Memory(file), &config()).unwrap_err();
        assert!(matches!(err, DocumentError::UpgradeRequired { major: 5 }));
    }

    #[test]
    fn major_zero_is_unsupported() {
        let mut file = encrypt(DocumentVersion::V1, b"a", "p");
        file[version_major_offset()] = 0;
        let err = open_document(&Passphrase::new("p"), InputSource::Memory(file), &config()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn v1_loader_rejects_v2_file() {
        let file = encrypt(DocumentVersion::V2, b"a", "p");
        let mut doc = V1Document::new(config()).unwrap();
        let err = doc.load(&Passphrase::new("p"), InputSource::Memory(file)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpgradeRequired);
        assert_eq!(doc.state(), LoadState::Failed);
    }

    #[test]
    fn v2_loader_rejects_v1_file() {
        let file = encrypt(DocumentVersion::V1, b"a", "p");
        let mut doc = V2Document::new(config()).unwrap();
        let err = doc.load(&Passphrase::new("p"), InputSource::Memory(file)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert_eq!(doc.state(), LoadState::Failed);
    }

    #[test]
    fn excessive_wrap_rounds_are_format_errors() {
        // Iterations close the key wrap payload: 24 + 16 bytes before them in V1, 40 + 32 in V2.
        let key_wrap = version_major_offset() + 5 + BLOCK_PREFIX_LEN;
        for (version, at) in [(DocumentVersion::V1, key_wrap + 40), (DocumentVersion::V2, key_wrap + 72)] {
            let mut file = encrypt(version, b"a", "p");
            file[at..at + 4].copy_from_slice(&u32::MAX.to_le_bytes());
            let err = open_document(&Passphrase::new("p"), InputSource::Memory(file), &config()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Format, "{version:?}");
        }
    }

    #[test]
    fn truncated_headers_are_format_errors() {
        let file = encrypt(DocumentVersion::V1, b"a", "p");
        for cut in [8, 20, 60] {
            let err = open_document(&Passphrase::new("p"), InputSource::Memory(file[..cut].to_vec()), &config())
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Format, "cut at {cut}");
        }
    }

    #[test]
    fn file_helpers_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("notes.txt");
        let enc = dir.path().join("notes.txt.axx");
        let dec = dir.path().join("notes.out");
        std::fs::write(&src, b"file helper contents".repeat(50)).unwrap();

        for version in [DocumentVersion::V1, DocumentVersion::V2] {
            let pass = Passphrase::new("files");
            encrypt_file(&pass, &src, &enc, version, EncryptOptions::COMPRESS, &config()).unwrap();

            let doc = open_document(&pass, InputSource::File(enc.clone()), &config()).unwrap();
            assert_eq!(doc.file_name(), Some("notes.txt"));

            decrypt_file(&pass, &enc, &dec, &config()).unwrap();
            assert_eq!(std::fs::read(&dec).unwrap(), std::fs::read(&src).unwrap());

            let err = decrypt_file(&Passphrase::new("nope"), &enc, &dec, &config()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::WrongKey);
        }
    }

    #[test]
    fn document_rewrap_through_enum() {
        let file = encrypt(DocumentVersion::V1, b"enum rewrap", "one");
        let mut doc = open_document(&Passphrase::new("one"), InputSource::Memory(file), &config()).unwrap();
        let mut out = Cursor::new(Vec::new());
        doc.rewrap_to(
            &Passphrase::new("one"),
            &Passphrase::new("two"),
            OutputSink::Seekable(&mut out),
            &mut ProgressContext::new(),
            &mut OsRng,
        )
        .unwrap();

        let mut doc = open_document(&Passphrase::new("two"), InputSource::Memory(out.into_inner()), &config()).unwrap();
        let mut plain = Vec::new();
        doc.decrypt_to(&mut plain, &mut ProgressContext::new()).unwrap();
        assert_eq!(plain, b"enum rewrap");
    }
}
