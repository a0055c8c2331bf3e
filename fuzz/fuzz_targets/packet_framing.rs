//! Fuzz target for packet framing.
//!
//! Feeds arbitrary bytes into the packet reader in arbitrary slices.
//! The reader must never panic and must fail with a `NetworkError` (or
//! keep waiting) on malformed streams.

#![no_main]

use libfuzzer_sys::fuzz_target;
use supla_proto::PacketReader;

fuzz_target!(|data: &[u8]| {
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime");
    rt.block_on(async {
        let (mut ours, mut theirs) = tokio::io::duplex(data.len().max(1));
        use tokio::io::AsyncWriteExt;
        let _ = theirs.write_all(data).await;
        drop(theirs);

        let mut reader = PacketReader::new(&mut ours);
        // drain packets until error or clean eof
        while reader.recv().await.is_ok() {}
    });
});
