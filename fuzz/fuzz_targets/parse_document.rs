#![no_main]

use libfuzzer_sys::fuzz_target;
use webforms::{ParseOptions, check_tree, parse};

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(parsed) = parse(source, &ParseOptions::default()) else {
        return;
    };
    if let Err(err) = check_tree(&parsed.document) {
        panic!("tree invariant violated: {err}");
    }
});
