#![no_main]

use libfuzzer_sys::fuzz_target;
use stackid_registry::parse_zone_file;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(zone) = parse_zone_file(s) {
            let _ = zone.profile_url();
        }
    }
});
