#![no_main]

use libfuzzer_sys::fuzz_target;
use stackid_core::{mnemonic_from_bytes, parse_mnemonic};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = parse_mnemonic(s);
    }
    // Decrypted secrets go through this path
    let _ = mnemonic_from_bytes(data);
});
