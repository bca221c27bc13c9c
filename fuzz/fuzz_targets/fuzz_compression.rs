#![no_main]

use duplex_rpc::utils::compression::{compress, decompress, decompress_with_limit};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // GZip roundtrip
    if let Ok(compressed) = compress(data) {
        let restored = decompress(&compressed).expect("own output decompresses");
        assert_eq!(restored, data);
    }

    // Raw decompression of hostile input respects the size limit
    if let Ok(out) = decompress_with_limit(data, 64 * 1024) {
        assert!(out.len() <= 64 * 1024);
    }
});
