#[cfg(test)]
mod tests {
    use axcrypt_core::compression::{create_compressor, create_decompressor, CompressionError};
    use axcrypt_core::config::CodecKind;

    fn compress_all(chunks: &[&[u8]], level: u32) -> Vec<u8> {
        let mut c = create_compressor(CodecKind::Deflate, level).unwrap();
        let mut out = Vec::new();
        for chunk in chunks {
            c.compress_chunk(chunk, &mut out).unwrap();
        }
        c.finish(&mut out).unwrap();
        out
    }

    #[test]
    fn chunked_stream_inflates_in_any_split() {
        let text = b"the quick brown fox jumps over the lazy dog. ".repeat(200);
        let (a, b) = text.split_at(1000);
        let packed = compress_all(&[a, b], 6);
        assert!(packed.len() < text.len() / 4);

        // Decompress with boundaries that differ from the compress side.
        let mut d = create_decompressor(CodecKind::Deflate).unwrap();
        let mut out = Vec::new();
        for piece in packed.chunks(7) {
            d.decompress_chunk(piece, &mut out).unwrap();
        }
        d.finish(&mut out).unwrap();
        assert_eq!(out, text);
    }

    #[test]
    fn sync_flush_emits_bytes_per_chunk() {
        let mut c = create_compressor(CodecKind::Deflate, 6).unwrap();
        let mut out = Vec::new();
        c.compress_chunk(b"first chunk", &mut out).unwrap();
        assert!(!out.is_empty());
    }

    #[test]
    fn level_above_nine_is_rejected() {
        assert!(matches!(
            create_compressor(CodecKind::Deflate, 10),
            Err(CompressionError::InvalidLevel { level: 10 })
        ));
    }

    #[test]
    fn finishing_twice_is_a_state_error() {
        let mut c = create_compressor(CodecKind::Deflate, 1).unwrap();
        let mut out = Vec::new();
        c.finish(&mut out).unwrap();
        assert!(matches!(c.finish(&mut out), Err(CompressionError::StateError(_))));
        assert!(matches!(c.compress_chunk(b"x", &mut out), Err(CompressionError::StateError(_))));
    }

    #[test]
    fn corrupt_stream_fails() {
        let mut d = create_decompressor(CodecKind::Deflate).unwrap();
        let mut out = Vec::new();
        let res = d
            .decompress_chunk(&[0xFF; 64], &mut out)
            .and_then(|_| d.finish(&mut out));
        assert!(res.is_err());
    }
}
