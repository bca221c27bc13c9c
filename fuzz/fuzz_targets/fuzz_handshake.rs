#![no_main]

use duplex_rpc::core::{PassthroughResolver, SliceReader};
use duplex_rpc::protocol::handshake::{ZkChallenge, ZkConfirmation, ZkInitiate, ZkProof, ZkSessionState};
use duplex_rpc::protocol::message::{read_invocation, read_message_type, Payload};
use duplex_rpc::protocol::MemoryZkRepository;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    futures::executor::block_on(async {
        // Host side: message type followed by a handshake or invocation body
        let mut reader = SliceReader::new(data.to_vec());
        if read_message_type(&mut reader).await.is_ok() {
            let _ = read_invocation(&mut reader, Payload::Clear, &PassthroughResolver).await;
        }

        let mut reader = SliceReader::new(data.to_vec());
        let repository = MemoryZkRepository::new();
        repository.add_user("fuzz", "fuzz");
        let mut session = ZkSessionState::new();
        if let Ok(initiate) = ZkInitiate::read(&mut reader).await {
            let _ = session.on_initiate(&repository, &initiate);
        }
        if let Ok(proof) = ZkProof::read(&mut reader).await {
            // Arbitrary proofs must never establish a session
            assert!(session.on_proof(&proof).is_err());
        }

        // Client side: host replies
        let mut reader = SliceReader::new(data.to_vec());
        let _ = ZkChallenge::read(&mut reader).await;
        let _ = ZkConfirmation::read(&mut reader).await;
    });
});
