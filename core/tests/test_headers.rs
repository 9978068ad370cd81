// Structural header parsing and typed payloads.

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use axcrypt_core::config::CipherKind;
    use axcrypt_core::constants::{MAGIC_GUID, MAX_KEY_WRAP_ITERATIONS, MAX_V2_WRAP_ITERATIONS};
    use axcrypt_core::crypto::SymmetricKey;
    use axcrypt_core::headers::{
        encode_document_prefix, BlockPayload, BlockType, CompressionFlag, Encrypted, HeaderBlock,
        HeaderCrypto, HeaderError, KeyWrap1, KeyWrap2, KeyWrapParams, LoadState, Preamble, RawHeaders,
        UnicodeFileNameInfo, V1DataInfo, V1EncryptionInfo, VersionInfo,
    };

    fn preamble() -> HeaderBlock {
        Preamble { bytes: [0u8; 16] }.to_block()
    }

    fn version() -> HeaderBlock {
        VersionInfo::new((3, 2), (0, 1, 0)).to_block()
    }

    fn data() -> HeaderBlock {
        V1DataInfo { cipher_len: 0 }.to_block()
    }

    fn parse(blocks: &[HeaderBlock]) -> Result<RawHeaders, HeaderError> {
        RawHeaders::parse(&mut Cursor::new(encode_document_prefix(blocks)), 1024)
    }

    #[test]
    fn minimal_header_reaches_data() {
        let raw = parse(&[preamble(), version(), data()]).unwrap();
        assert_eq!(raw.state(), LoadState::DataReached);
        assert_eq!(raw.blocks().len(), 3);
        assert_eq!(raw.version().unwrap().file_major, 3);
        assert_eq!(raw.encoded_len(), (16 + 21 + 10 + 13) as u64);
    }

    #[test]
    fn parser_stops_at_data() {
        let mut bytes = encode_document_prefix(&[preamble(), version(), data()]);
        bytes.extend_from_slice(b"ciphertext follows");
        let mut cur = Cursor::new(bytes);
        let raw = RawHeaders::parse(&mut cur, 1024).unwrap();
        assert_eq!(cur.position(), raw.encoded_len());
    }

    #[test]
    fn version_before_preamble_is_out_of_order() {
        let err = parse(&[version(), preamble(), data()]).unwrap_err();
        assert!(matches!(err, HeaderError::OutOfOrder { block_type: 3, expected: 2 }));
    }

    #[test]
    fn duplicate_block_is_rejected() {
        let flag = HeaderBlock::new(BlockType::CompressionFlag, vec![0; 16]);
        let err = parse(&[preamble(), version(), flag.clone(), flag, data()]).unwrap_err();
        assert!(matches!(err, HeaderError::DuplicateBlock { block_type: 66 }));
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let mut bytes = encode_document_prefix(&[preamble(), version()]);
        bytes.extend_from_slice(&[99, 0, 0, 0, 0]);
        let err = RawHeaders::parse(&mut Cursor::new(bytes), 1024).unwrap_err();
        assert!(matches!(err, HeaderError::UnknownBlockType { raw: 99 }));
    }

    #[test]
    fn trailer_tags_before_data_are_rejected() {
        for tag in [BlockType::EncryptedDataPart, BlockType::PlaintextLengths, BlockType::V2Hmac] {
            let err = parse(&[preamble(), version(), HeaderBlock::new(tag, vec![]), data()]).unwrap_err();
            assert!(matches!(err, HeaderError::TrailingBeforeData { .. }));
        }
    }

    #[test]
    fn oversized_block_is_rejected() {
        let big = HeaderBlock::new(BlockType::FileNameInfo, vec![0; 2048]);
        let err = parse(&[preamble(), version(), big, data()]).unwrap_err();
        assert!(matches!(err, HeaderError::BlockTooLarge { len: 2048, max: 1024, .. }));
    }

    #[test]
    fn bad_magic_and_truncation() {
        let mut bytes = encode_document_prefix(&[preamble(), version(), data()]);
        let truncated = bytes[..bytes.len() - 3].to_vec();
        bytes[3] ^= 0x01;
        let err = RawHeaders::parse(&mut Cursor::new(bytes), 1024).unwrap_err();
        assert!(matches!(err, HeaderError::InvalidMagic { .. }));

        let err = RawHeaders::parse(&mut Cursor::new(truncated), 1024).unwrap_err();
        assert!(matches!(err, HeaderError::Truncated { .. }));
    }

    #[test]
    fn missing_data_block_is_truncation() {
        let bytes = encode_document_prefix(&[preamble(), version()]);
        let err = RawHeaders::parse(&mut Cursor::new(bytes), 1024).unwrap_err();
        assert!(matches!(err, HeaderError::Truncated { .. }));
    }

    #[test]
    fn block_flags() {
        assert!(BlockType::EncryptionInfo.is_encrypted());
        assert!(BlockType::PlaintextLengths.is_encrypted());
        assert!(!BlockType::KeyWrap2.is_encrypted());
        assert!(BlockType::V2Hmac.is_trailing());
        assert!(!BlockType::Data.is_trailing());
        assert!(BlockType::verify(63).is_ok());
        assert!(BlockType::verify(5).is_err());
    }

    #[test]
    fn block_framing_is_little_endian() {
        let block = HeaderBlock::new(BlockType::Data, vec![1, 2, 3]);
        assert_eq!(block.to_bytes(), vec![63, 3, 0, 0, 0, 1, 2, 3]);
        let prefix = encode_document_prefix(&[block]);
        assert_eq!(&prefix[..16], &MAGIC_GUID);
    }

    #[test]
    fn encrypted_payloads_are_padded_and_reversible() {
        let crypto = HeaderCrypto::new(CipherKind::Aes128Cbc, &SymmetricKey::from_slice(&[5u8; 16])).unwrap();
        let info = V1EncryptionInfo { plaintext_len: 1234, iv: [9u8; 16] };
        let sealed = Encrypted::seal(&info, &crypto).unwrap();
        assert_eq!(sealed.block().payload().len(), 32);
        assert_ne!(&sealed.block().payload()[..8], &1234u64.to_le_bytes());
        assert_eq!(sealed.open(&crypto).unwrap(), info);

        let flag = Encrypted::seal(&CompressionFlag { compressed: true }, &crypto).unwrap();
        assert_eq!(flag.block().payload().len(), 16);
        assert!(flag.open(&crypto).unwrap().compressed);
    }

    #[test]
    fn encrypted_wrapper_checks_type() {
        let err = Encrypted::<CompressionFlag>::from_block(data()).unwrap_err();
        assert!(matches!(err, HeaderError::UnexpectedBlock { block_type: 63, .. }));

        let unaligned = HeaderBlock::new(BlockType::CompressionFlag, vec![0; 5]);
        assert!(Encrypted::<CompressionFlag>::from_block(unaligned).is_err());
    }

    #[test]
    fn unicode_name_rejects_odd_length() {
        let mut payload = 3u32.to_le_bytes().to_vec();
        payload.extend_from_slice(&[0x41, 0x00, 0x42]);
        assert!(matches!(
            UnicodeFileNameInfo::decode(&payload),
            Err(HeaderError::InvalidPayload { block_type: 69, .. })
        ));
        let name = UnicodeFileNameInfo { name: "naïve 文件.txt".into() };
        assert_eq!(UnicodeFileNameInfo::decode(&name.encode()).unwrap(), name);
    }

    #[test]
    fn compression_flag_is_an_i32() {
        assert_eq!(CompressionFlag { compressed: true }.encode(), [1, 0, 0, 0]);
        assert_eq!(CompressionFlag { compressed: false }.encode(), [0, 0, 0, 0]);
        // Any nonzero value reads as compressed; trailing padding is ignored.
        assert!(CompressionFlag::decode(&[2, 0, 0, 0, 0, 0]).unwrap().compressed);
        assert!(CompressionFlag::decode(&[1, 0]).is_err());
    }

    #[test]
    fn key_wrap1_enforces_minimum_rounds() {
        let params = KeyWrapParams { wrapped: vec![0; 24], salt: vec![0; 16], iterations: 5 };
        let block = KeyWrap1(params).to_block();
        assert!(matches!(KeyWrap1::from_block(&block), Err(HeaderError::InvalidPayload { .. })));

        let short = HeaderBlock::new(BlockType::KeyWrap1, vec![0; 10]);
        assert!(KeyWrap1::from_block(&short).is_err());
    }

    #[test]
    fn key_wrap_rounds_are_bounded_above() {
        let v1 = |iterations| KeyWrap1(KeyWrapParams { wrapped: vec![0; 24], salt: vec![0; 16], iterations });
        assert!(KeyWrap1::from_block(&v1(MAX_KEY_WRAP_ITERATIONS).to_block()).is_ok());
        for iterations in [MAX_KEY_WRAP_ITERATIONS + 1, u32::MAX] {
            let err = KeyWrap1::from_block(&v1(iterations).to_block()).unwrap_err();
            assert!(matches!(err, HeaderError::InvalidPayload { .. }), "{iterations}");
        }

        let v2 = |iterations| KeyWrap2(KeyWrapParams { wrapped: vec![0; 40], salt: vec![0; 32], iterations });
        assert!(KeyWrap2::from_block(&v2(MAX_V2_WRAP_ITERATIONS).to_block()).is_ok());
        for iterations in [0, MAX_V2_WRAP_ITERATIONS + 1, u32::MAX] {
            let err = KeyWrap2::from_block(&v2(iterations).to_block()).unwrap_err();
            assert!(matches!(err, HeaderError::InvalidPayload { .. }), "{iterations}");
        }
    }
}
