// test-only module included via protocol/mod.rs
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use crate::core::reader::{SliceReader, WireRead};
use crate::error::ProtocolError;
use crate::protocol::handshake::*;
use crate::protocol::message::{read_message_type, MessageType};
use crate::protocol::zk_repository::{MemoryZkRepository, ZkPasswordHash, ZkRepository};
use crate::utils::crypto::Crypto;

fn repository() -> MemoryZkRepository {
    let repo = MemoryZkRepository::new();
    repo.add_user("alice", "correct horse");
    repo
}

#[test]
fn test_zk_handshake_flow() {
    let repo = repository();

    // =================== Step 1: Client initiates ===================
    let (client_state, initiate) = client_zk_initiate("alice", "correct horse");
    assert_eq!(initiate.username, "alice");

    // =================== Step 2: Server challenges ===================
    let (server_state, challenge) =
        server_zk_respond(&repo, &initiate).expect("Known user should get a challenge");
    assert_eq!(challenge.salt, repo.password_hash("alice").unwrap().salt);

    // =================== Step 3: Client proves ===================
    let (client_state, proof) =
        client_zk_proof(client_state, &challenge).expect("Client proof should succeed");

    // =================== Step 4: Server verifies ===================
    let (confirmation, server_key) =
        server_zk_verify(server_state, &proof).expect("Server should accept the proof");

    // =================== Step 5: Client checks the server ===================
    let client_key =
        client_zk_finalize(client_state, &confirmation).expect("Client should accept the server");

    assert_eq!(*server_key, *client_key, "Both sides must derive the same session key");
}

#[test]
fn test_wrong_password_rejected() {
    let repo = repository();

    let (client_state, initiate) = client_zk_initiate("alice", "battery staple");
    let (server_state, challenge) = server_zk_respond(&repo, &initiate).unwrap();
    let (_client_state, proof) = client_zk_proof(client_state, &challenge).unwrap();

    match server_zk_verify(server_state, &proof) {
        Err(ProtocolError::AuthenticationFailed(_)) => {}
        other => panic!("Expected AuthenticationFailed, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_unknown_user_rejected() {
    let repo = repository();
    let (_state, initiate) = client_zk_initiate("mallory", "anything");
    assert!(matches!(
        server_zk_respond(&repo, &initiate),
        Err(ProtocolError::AuthenticationFailed(_))
    ));
}

#[test]
fn test_tampered_proof_rejected() {
    let repo = repository();

    let (client_state, initiate) = client_zk_initiate("alice", "correct horse");
    let (server_state, challenge) = server_zk_respond(&repo, &initiate).unwrap();
    let (_client_state, mut proof) = client_zk_proof(client_state, &challenge).unwrap();

    proof.proof[0] ^= 0x01;
    assert!(server_zk_verify(server_state, &proof).is_err());
}

#[test]
fn test_impostor_host_rejected() {
    // A host holding a verifier for a different password cannot produce M2.
    let real = repository();
    let impostor = MemoryZkRepository::new();
    let real_salt = real.password_hash("alice").unwrap().salt;
    impostor.insert("alice", ZkPasswordHash::with_salt("alice", "guess", real_salt));

    let (client_state, initiate) = client_zk_initiate("alice", "correct horse");
    let (server_state, challenge) = server_zk_respond(&impostor, &initiate).unwrap();
    let (client_state, proof) = client_zk_proof(client_state, &challenge).unwrap();

    // The impostor's own check fails as well; forge a confirmation instead.
    assert!(server_zk_verify(server_state, &proof).is_err());
    let forged = ZkConfirmation {
        server_proof: [0x42; 32],
    };
    assert!(matches!(
        client_zk_finalize(client_state, &forged),
        Err(ProtocolError::AuthenticationFailed(_))
    ));
}

#[test]
fn test_low_order_client_key_rejected() {
    let repo = repository();
    let (_client_state, initiate) = client_zk_initiate("alice", "correct horse");
    let (server_state, _challenge) = server_zk_respond(&repo, &initiate).unwrap();

    // The identity point makes every shared secret zero.
    let proof = ZkProof {
        client_public: [0u8; 32],
        proof: [0u8; 32],
    };
    assert!(matches!(
        server_zk_verify(server_state, &proof),
        Err(ProtocolError::AuthenticationFailed(_))
    ));
}

#[test]
fn test_per_session_state_isolation() {
    let repo = repository();

    let (c1, i1) = client_zk_initiate("alice", "correct horse");
    let (c2, i2) = client_zk_initiate("alice", "correct horse");
    let (s1, ch1) = server_zk_respond(&repo, &i1).unwrap();
    let (s2, ch2) = server_zk_respond(&repo, &i2).unwrap();
    assert_ne!(ch1.server_public, ch2.server_public);

    let (c1, p1) = client_zk_proof(c1, &ch1).unwrap();
    let (c2, p2) = client_zk_proof(c2, &ch2).unwrap();
    assert_ne!(p1.client_public, p2.client_public);

    let (conf1, k1_server) = server_zk_verify(s1, &p1).unwrap();
    let (conf2, k2_server) = server_zk_verify(s2, &p2).unwrap();
    let k1_client = client_zk_finalize(c1, &conf1).unwrap();
    let k2_client = client_zk_finalize(c2, &conf2).unwrap();

    assert_eq!(*k1_server, *k1_client);
    assert_eq!(*k2_server, *k2_client);
    assert_ne!(*k1_server, *k2_server);
}

#[test]
fn test_session_state_phases() {
    let repo = repository();
    let mut session = ZkSessionState::new();
    assert_eq!(session.phase(), ZkPhase::AwaitingInitiate);

    let (client_state, initiate) = client_zk_initiate("alice", "correct horse");
    let challenge = session.on_initiate(&repo, &initiate).unwrap();
    assert_eq!(session.phase(), ZkPhase::AwaitingProof);
    assert!(session.on_initiate(&repo, &initiate).is_err());

    let (client_state, proof) = client_zk_proof(client_state, &challenge).unwrap();
    let confirmation = session.on_proof(&proof).unwrap();
    assert_eq!(session.phase(), ZkPhase::Established);

    let key = client_zk_finalize(client_state, &confirmation).unwrap();
    let client_cipher = Crypto::new(&key);
    let sealed = client_cipher.seal(b"ping").unwrap();
    assert_eq!(session.cipher().unwrap().open(&sealed).unwrap(), b"ping");

    // A second proof after establishment is out of order.
    assert!(session.on_proof(&proof).is_err());
}

#[tokio::test]
async fn test_handshake_messages_on_the_wire() {
    let repo = repository();
    let (client_state, initiate) = client_zk_initiate("alice", "correct horse");

    let mut out = Vec::new();
    initiate.encode(&mut out).unwrap();
    let mut reader = SliceReader::new(out);
    assert_eq!(read_message_type(&mut reader).await.unwrap(), MessageType::ZkInitiate);
    let received = ZkInitiate::read(&mut reader).await.unwrap();
    assert_eq!(received, initiate);

    let (_server_state, challenge) = server_zk_respond(&repo, &received).unwrap();
    let mut out = Vec::new();
    challenge.encode(&mut out);
    assert_eq!(out.len(), 4 + 32 + 32);
    let mut reader = SliceReader::new(out);
    assert_eq!(ZkChallenge::read(&mut reader).await.unwrap(), challenge);

    let (_client_state, proof) = client_zk_proof(client_state, &challenge).unwrap();
    let mut out = Vec::new();
    proof.encode(&mut out);
    let mut reader = SliceReader::new(out);
    assert_eq!(reader.read_i32_le().await.unwrap(), MessageType::ZkProof.as_i32());
    assert_eq!(ZkProof::read(&mut reader).await.unwrap(), proof);
}

#[tokio::test]
async fn test_rejection_status_is_authentication_failure() {
    let mut out = Vec::new();
    encode_rejection(&mut out);
    assert_eq!(out, vec![0, 0, 0, 0]);

    let mut reader = SliceReader::new(out);
    assert!(matches!(
        ZkChallenge::read(&mut reader).await,
        Err(ProtocolError::AuthenticationFailed(_))
    ));
}
