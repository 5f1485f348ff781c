#![no_main]

use faultline_core::config::FaultlineConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(toml_str) = std::str::from_utf8(data) {
        if let Ok(config) = FaultlineConfig::parse(toml_str) {
            let _ = config.validate();
        }
    }
});
