//! Fuzz harness for reporter configuration files.
//!
//! Both formats go through `parse_config`; an accepted config must also
//! compile its output rules without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use storyline_config::{ConfigFormat, parse_config};
use storyline_output_layout::compile_rules;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };

    for format in [ConfigFormat::Yaml, ConfigFormat::Json] {
        if let Ok(config) = parse_config(input, format) {
            // Bad globs are an Err, which is fine; only a panic is a finding.
            let _ = compile_rules(&config.rules());
        }
    }
});
