#![no_main]

use arbitrary::Arbitrary;
use epever_bridge::decode;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Blocks {
    realtime: [u16; 18],
    status: [u16; 3],
    statistics: [u16; 20],
}

fuzz_target!(|blocks: Blocks| {
    let snapshot = decode(&blocks.realtime, &blocks.status, &blocks.statistics);
    assert!(snapshot.pv_voltage >= 0.01);
    assert!(snapshot.pv_current().is_finite());
    assert_eq!(snapshot.error_code, 0);
});
