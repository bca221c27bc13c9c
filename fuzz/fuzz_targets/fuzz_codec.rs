#![no_main]

use duplex_rpc::core::codec::{decode_from_slice, encode_to_vec, CompressionPolicy};
use duplex_rpc::core::PassthroughResolver;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Decoding arbitrary bytes must fail cleanly, never panic or over-allocate
    let decoded = futures::executor::block_on(decode_from_slice(data.to_vec(), &PassthroughResolver));

    // Whatever decodes must re-encode and decode to the same values
    if let Ok(values) = decoded {
        let Ok(encoded) = encode_to_vec(&values, CompressionPolicy::DISABLED) else {
            return;
        };
        let again = futures::executor::block_on(decode_from_slice(encoded, &PassthroughResolver))
            .expect("re-encoded values decode");
        // NaN payloads compare unequal; compare the debug form instead
        assert_eq!(format!("{values:?}"), format!("{again:?}"));
    }
});
