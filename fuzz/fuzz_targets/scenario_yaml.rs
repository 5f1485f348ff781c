#![no_main]

use faultline_core::scenario::Scenario;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(yaml_str) = std::str::from_utf8(data) {
        if let Ok(scenario) = Scenario::parse_yaml(yaml_str, "fuzz-input.yaml") {
            // Anything the loader accepts has a valid requirements block.
            assert!(scenario.requirements.control_planes >= 1);
        }
    }
});
