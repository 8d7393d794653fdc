//! Property tests for record framing.

use link_protocol::{read_records, write_record, MAX_RECORDS};
use proptest::prelude::*;

fn payload() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(any::<u8>().prop_filter("no terminator", |b| *b != b'\n'), 0..256)
}

fn run<F: std::future::Future>(fut: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime")
        .block_on(fut)
}

proptest! {
    #[test]
    fn written_records_are_read_back_in_order(records in proptest::collection::vec(payload(), 0..32)) {
        let decoded = run(async {
            let mut wire = Vec::new();
            for record in &records {
                write_record(&mut wire, record).await.expect("write");
            }
            read_records(wire.as_slice(), MAX_RECORDS).await.expect("read")
        });
        prop_assert_eq!(decoded, records);
    }

    #[test]
    fn truncated_stream_never_yields_partial_record(
        records in proptest::collection::vec(payload().prop_filter("non-empty", |p| !p.is_empty()), 1..8),
    ) {
        let mut wire = Vec::new();
        for record in &records {
            wire.extend_from_slice(record);
            wire.push(b'\n');
        }
        // Drop the final terminator.
        wire.pop();
        let result = run(read_records(wire.as_slice(), MAX_RECORDS));
        prop_assert!(result.is_err());
    }
}
