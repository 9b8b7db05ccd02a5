#![no_main]

use libfuzzer_sys::fuzz_target;
use stackid_registry::{extract_profile, verify_token};

const OWNER: &str = "1BoatSLRHtKNngkdXEeobR76b53LETtpyT";

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = verify_token(s, Some(OWNER));
        let _ = verify_token(s, None);
    }
    if let Ok(document) = serde_json::from_slice::<serde_json::Value>(data) {
        let _ = extract_profile(&document, Some(OWNER));
    }
});
