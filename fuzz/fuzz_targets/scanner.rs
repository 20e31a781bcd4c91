#![no_main]

use fasthtml::{Scanner, ScannerConfig, Vocabulary};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&knobs, rest)) = data.split_first() else {
        return;
    };
    let input = String::from_utf8_lossy(rest);
    let config = ScannerConfig {
        decode_entities: knobs & 1 != 0,
        keep_raw: true,
        strict_encoding: knobs & 2 != 0,
        encoding: if knobs & 4 != 0 {
            encoding_rs::WINDOWS_1252
        } else {
            encoding_rs::UTF_8
        },
        text_limit: (knobs & 8 != 0).then_some(usize::from(knobs >> 4)),
    };

    let mut scanner = Scanner::new(&input, Vocabulary::html(), config);
    let mut covered = 0usize;
    let mut steps = 0usize;
    while let Some(token) = scanner.next_token() {
        steps += 1;
        assert!(steps <= input.len() + 1, "scanner did not terminate");
        let span = token.raw.expect("raw capture is on");
        assert_eq!(span.start, covered, "gap or overlap before {span:?}");
        assert!(span.end > span.start, "empty span");
        covered = span.end;
    }
    assert_eq!(covered, input.len(), "spans do not cover the input");
    assert_eq!(scanner.position(), input.len());
});
