#![no_main]

use libfuzzer_sys::fuzz_target;
use stackid_core::EncryptedSecret;

fuzz_target!(|data: &[u8]| {
    // Parsing must reject hostile KDF parameters without deriving anything
    if let Ok(secret) = EncryptedSecret::from_bytes(data) {
        let bytes = secret.to_bytes();
        let reparsed = EncryptedSecret::from_bytes(&bytes).expect("re-parse of valid envelope");
        assert_eq!(reparsed.to_bytes(), bytes);
    }
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = EncryptedSecret::from_hex(s);
    }
});
