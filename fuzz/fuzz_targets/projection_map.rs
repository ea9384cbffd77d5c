#![no_main]

use libfuzzer_sys::fuzz_target;
use webforms::{ParseOptions, parse};

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(parsed) = parse(source, &ParseOptions::default()) else {
        return;
    };
    let combined = parsed.combined_projection();
    let mut last_projected = None;
    for offset in combined.span.start..combined.span.end {
        let Some(projected) = combined.to_projected(offset) else {
            continue;
        };
        if let Some(last) = last_projected {
            assert!(
                projected > last,
                "projected offsets must increase with original offsets"
            );
        }
        last_projected = Some(projected);
        assert_eq!(
            combined.to_original(projected),
            Some(offset),
            "offset {offset} does not round-trip through the projection"
        );
    }
});
