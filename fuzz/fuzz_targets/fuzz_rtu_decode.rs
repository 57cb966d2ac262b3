#![no_main]

use epever_bridge::codec::decode_rtu_frame;
use libfuzzer_sys::fuzz_target;

// Arbitrary bytes from the serial line must never panic the decoder.
fuzz_target!(|data: &[u8]| {
    if let Ok(pdu) = decode_rtu_frame(data, 1) {
        for quantity in [3u16, 18, 20] {
            if let Ok(registers) = pdu.parse_registers(0x04, quantity) {
                assert_eq!(registers.len(), usize::from(quantity));
            }
        }
    }
});
