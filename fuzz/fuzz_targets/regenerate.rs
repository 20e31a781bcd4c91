#![no_main]

use fasthtml::Scanner;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let input = String::from_utf8_lossy(data);
    let first: Vec<_> = Scanner::with_defaults(&input).collect();
    let mut html = String::new();
    for token in &first {
        token.write_html(&mut html);
    }
    // Regenerated output must scan again without panicking.
    let again = Scanner::with_defaults(&html).count();
    assert!(again <= html.len() + 1);
});
