#![no_main]

use libfuzzer_sys::fuzz_target;

/// Keep regex compilation bounded.
const MAX_INPUT_BYTES: usize = 4 * 1024;

fuzz_target!(|data: &[u8]| {
    let data = &data[..data.len().min(MAX_INPUT_BYTES)];
    let input = String::from_utf8_lossy(data);

    // `subject \0 pattern`; without a separator the input is matched against itself.
    let (subject, pattern) = match input.split_once('\0') {
        Some((subject, pattern)) => (subject, pattern),
        None => (input.as_ref(), input.as_ref()),
    };

    let matched = query_vm::like(subject, pattern).expect("translated patterns always compile");

    // Without wildcards a pattern matches exactly its own text.
    if !pattern.contains(&['%', '_'][..]) {
        assert_eq!(matched, subject == pattern);
    }
});
