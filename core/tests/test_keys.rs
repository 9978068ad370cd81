#[cfg(test)]
mod tests {
    use axcrypt_core::config::{CryptoSuite, KekKdfKind, SubkeyKdfKind};
    use axcrypt_core::crypto::{
        derive_subkey, passphrase_kek, unwrap_key, wrap_key, AesCipher, SubkeyPurpose, SymmetricKey,
    };
    use axcrypt_core::document::KeySession;
    use axcrypt_core::keys::{KeyHierarchy, MasterKey, Passphrase};
    use axcrypt_core::types::DocumentError;
    use rand::rngs::OsRng;

    // RFC 3394 section 4.1: 128-bit key data, 128-bit KEK
    #[test]
    fn rfc3394_aes128_vector() {
        let kek = AesCipher::from_bytes(&hex::decode("000102030405060708090A0B0C0D0E0F").unwrap()).unwrap();
        let key = hex::decode("00112233445566778899AABBCCDDEEFF").unwrap();
        let wrapped = wrap_key(&kek, &key, 6).unwrap();
        assert_eq!(hex::encode_upper(&wrapped), "1FA68B0A8112B447AEF34BD8FB5A7B829D3E862371D2CFE5");
        assert_eq!(unwrap_key(&kek, &wrapped, 6).unwrap(), Some(key));
    }

    // RFC 3394 section 4.6: 256-bit key data, 256-bit KEK
    #[test]
    fn rfc3394_aes256_vector() {
        let kek = AesCipher::from_bytes(
            &hex::decode("000102030405060708090A0B0C0D0E0F101112131415161718191A1B1C1D1E1F").unwrap(),
        )
        .unwrap();
        let key = hex::decode("00112233445566778899AABBCCDDEEFF000102030405060708090A0B0C0D0E0F").unwrap();
        let wrapped = wrap_key(&kek, &key, 6).unwrap();
        assert_eq!(
            hex::encode_upper(&wrapped),
            "28C9F404C4B810F4CBCCB35CFB87F8263F5786E2D80ED326CBC7F0E71A99F43BFB988B9B7A02DD21"
        );
    }

    #[test]
    fn unwrap_with_wrong_kek_is_none() {
        let kek = AesCipher::from_bytes(&[1u8; 16]).unwrap();
        let other = AesCipher::from_bytes(&[2u8; 16]).unwrap();
        let wrapped = wrap_key(&kek, &[7u8; 16], 10).unwrap();
        assert_eq!(unwrap_key(&other, &wrapped, 10).unwrap(), None);
        // Rounds are part of the key: a different count does not unwrap.
        assert_eq!(unwrap_key(&kek, &wrapped, 6).unwrap(), None);
    }

    #[test]
    fn v1_kek_is_truncated_sha1() {
        let kek = passphrase_kek(KekKdfKind::Sha1Truncated, b"a");
        assert_eq!(hex::encode(kek.as_bytes()), "86f7e437faa5a7fce15d1ddcb9eaeaea");
    }

    #[test]
    fn v2_kek_is_32_bytes() {
        let kek = passphrase_kek(KekKdfKind::Pbkdf2Sha512, b"a");
        assert_eq!(kek.len(), 32);
    }

    #[test]
    fn subkeys_are_distinct_per_purpose() {
        for (kdf, len) in [(SubkeyKdfKind::AesPrf, 16), (SubkeyKdfKind::HkdfSha512, 32)] {
            let master = SymmetricKey::from_vec(vec![0x33; len]);
            let keys: Vec<SymmetricKey> = [SubkeyPurpose::Hmac, SubkeyPurpose::Headers, SubkeyPurpose::Data]
                .into_iter()
                .map(|p| derive_subkey(kdf, &master, p).unwrap())
                .collect();
            for i in 0..keys.len() {
                assert_eq!(keys[i].len(), len);
                for j in i + 1..keys.len() {
                    assert_ne!(keys[i], keys[j]);
                }
            }
            assert_eq!(keys[0], derive_subkey(kdf, &master, SubkeyPurpose::Hmac).unwrap());
        }
    }

    #[test]
    fn aes_prf_subkey_encrypts_purpose_block() {
        let master = SymmetricKey::from_slice(&[0x44; 16]);
        let mut block = [0u8; 16];
        block[0] = SubkeyPurpose::Data as u8;
        AesCipher::new(&master).unwrap().encrypt_block(&mut block);
        let data = derive_subkey(SubkeyKdfKind::AesPrf, &master, SubkeyPurpose::Data).unwrap();
        assert_eq!(data.as_bytes(), &block);
    }

    #[test]
    fn hierarchy_wrap_round_trip_both_suites() {
        for (suite, iterations, major) in [(CryptoSuite::V1, 6, 3), (CryptoSuite::V1, 6, 1), (CryptoSuite::V2, 1000, 4)] {
            let h = KeyHierarchy::new(suite);
            let kek = h.kek_from_passphrase(&Passphrase::new("wrap me"));
            let master = h.generate_master_key(&mut OsRng);
            let params = h.wrap_master_key(&master, &kek, iterations, major, &mut OsRng).unwrap();
            assert_eq!(params.iterations, iterations);
            assert_eq!(params.salt.len(), h.salt_len());

            let back = h.unwrap_master_key(&params, &kek, major).unwrap();
            assert_eq!(back, Some(master));

            let wrong = h.kek_from_passphrase(&Passphrase::new("not me"));
            assert_eq!(h.unwrap_master_key(&params, &wrong, major).unwrap(), None);
        }
    }

    #[test]
    fn v2_iterations_come_from_stored_params() {
        let h = KeyHierarchy::new(CryptoSuite::V2);
        let kek = h.kek_from_passphrase(&Passphrase::new("p"));
        let master = h.generate_master_key(&mut OsRng);
        let mut params = h.wrap_master_key(&master, &kek, 1000, 4, &mut OsRng).unwrap();
        params.iterations = 1001;
        assert_eq!(h.unwrap_master_key(&params, &kek, 4).unwrap(), None);
    }

    #[test]
    fn wrong_length_master_key_is_rejected() {
        let h = KeyHierarchy::new(CryptoSuite::V2);
        let kek = h.kek_from_passphrase(&Passphrase::new("p"));
        let short = MasterKey::from_key(SymmetricKey::from_slice(&[1u8; 16]));
        assert!(h.wrap_master_key(&short, &kek, 1000, 4, &mut OsRng).is_err());
    }

    #[test]
    fn session_rewrap_keeps_master_key() {
        for (suite, iterations, major) in [(CryptoSuite::V1, 6, 3), (CryptoSuite::V2, 1000, 4)] {
            let session = KeySession::create(suite, &Passphrase::new("old"), iterations, major, &mut OsRng).unwrap();
            let rewrapped = session.rewrap(&Passphrase::new("old"), &Passphrase::new("new"), &mut OsRng).unwrap();
            assert_eq!(rewrapped.key_wrap().iterations, iterations);
            assert_ne!(rewrapped.key_wrap().wrapped, session.key_wrap().wrapped);

            let reopened = KeySession::open(suite, &Passphrase::new("new"), rewrapped.key_wrap().clone(), major)
                .unwrap()
                .unwrap();
            assert_eq!(reopened.master_key(), session.master_key());

            let stale = KeySession::open(suite, &Passphrase::new("old"), rewrapped.key_wrap().clone(), major).unwrap();
            assert!(stale.is_none());

            let err = session.rewrap(&Passphrase::new("new"), &Passphrase::new("newer"), &mut OsRng).unwrap_err();
            assert!(matches!(err, DocumentError::WrongPassphrase));
        }
    }

    #[test]
    fn passphrase_debug_is_redacted() {
        let p = Passphrase::new("hunter2");
        assert!(!format!("{p:?}").contains("hunter2"));
        let k = SymmetricKey::from_slice(&[0xAB; 16]);
        assert!(!format!("{k:?}").to_lowercase().contains("abab"));
    }
}
