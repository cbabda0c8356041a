#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let args: Vec<String> = String::from_utf8_lossy(data)
        .split(['\0', ' ', '\n'])
        .filter(|s| !s.is_empty())
        .take(32)
        .map(str::to_owned)
        .collect();
    chunkdelta::cli::fuzz_try_parse_args(&args);
});
