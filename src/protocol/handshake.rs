//! Zero-knowledge password handshake over X25519 and SHA-256.
//!
//! The host stores only a salt and a public verifier `v = x·G` per user
//! (see [`zk_repository`](crate::protocol::zk_repository)). Neither the
//! password nor `x` ever crosses the wire.
//!
//! ```text
//! client                                      host
//!   ZkInitiate { username }          ──▶
//!                                    ◀──   status, salt, B = b·G
//!   ZkProof { A = a·G, M1 }          ──▶
//!                                    ◀──   status, M2
//! ```
//!
//! Both sides compute `S1 = a·B = b·A` and `S2 = x·B = b·v`, then
//! `K = H(label ‖ S1 ‖ S2 ‖ A ‖ B ‖ salt ‖ username)`. The proofs are
//! `M1 = H("client-proof" ‖ K ‖ A ‖ B)` and `M2 = H("server-proof" ‖ K ‖ A ‖ M1)`;
//! the session key is `H("session-key" ‖ K)`.
//!
//! **Per-Session State**
//! Handshake state lives in per-connection structures that are consumed as
//! the flow advances and zeroized on drop.

use crate::core::codec::put_string;
use crate::core::reader::WireRead;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::message::MessageType;
use crate::protocol::zk_repository::{password_secret, ZkRepository, SALT_LEN};
use crate::utils::crypto::Crypto;
use rand_core::OsRng;
use sha2::{Digest, Sha256};
use x25519_dalek::{EphemeralSecret, PublicKey, SharedSecret, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use tracing::{debug, instrument, warn};

const KEY_LABEL: &[u8] = b"duplex-rpc zk v1";

pub const ZK_ACCEPTED: i32 = 1;
pub const ZK_REJECTED: i32 = 0;

/// Step 1, client to host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZkInitiate {
    pub username: String,
}

/// Step 1 reply: the user's salt and the host's ephemeral public key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZkChallenge {
    pub salt: [u8; SALT_LEN],
    pub server_public: [u8; 32],
}

/// Step 2, client to host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZkProof {
    pub client_public: [u8; 32],
    pub proof: [u8; 32],
}

/// Step 2 reply: the host's proof that it holds the verifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZkConfirmation {
    pub server_proof: [u8; 32],
}

impl ZkInitiate {
    pub fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(&MessageType::ZkInitiate.to_le_bytes());
        put_string(out, &self.username)
    }

    /// Read the body that follows the message type
    pub async fn read<R: WireRead + ?Sized>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            username: reader.read_string().await?,
        })
    }
}

impl ZkChallenge {
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&ZK_ACCEPTED.to_le_bytes());
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.server_public);
    }

    pub async fn read<R: WireRead + ?Sized>(reader: &mut R) -> Result<Self> {
        read_status(reader).await?;
        Ok(Self {
            salt: read_key(reader).await?,
            server_public: read_key(reader).await?,
        })
    }
}

impl ZkProof {
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&MessageType::ZkProof.to_le_bytes());
        out.extend_from_slice(&self.client_public);
        out.extend_from_slice(&self.proof);
    }

    pub async fn read<R: WireRead + ?Sized>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            client_public: read_key(reader).await?,
            proof: read_key(reader).await?,
        })
    }
}

impl ZkConfirmation {
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&ZK_ACCEPTED.to_le_bytes());
        out.extend_from_slice(&self.server_proof);
    }

    pub async fn read<R: WireRead + ?Sized>(reader: &mut R) -> Result<Self> {
        read_status(reader).await?;
        Ok(Self {
            server_proof: read_key(reader).await?,
        })
    }
}

/// The host's reply to any handshake step it refuses
pub fn encode_rejection(out: &mut Vec<u8>) {
    out.extend_from_slice(&ZK_REJECTED.to_le_bytes());
}

async fn read_status<R: WireRead + ?Sized>(reader: &mut R) -> Result<()> {
    match reader.read_i32_le().await? {
        ZK_ACCEPTED => Ok(()),
        _ => Err(ProtocolError::AuthenticationFailed(
            constants::ERR_HANDSHAKE_REJECTED.into(),
        )),
    }
}

async fn read_key<R: WireRead + ?Sized>(reader: &mut R) -> Result<[u8; 32]> {
    let bytes = reader.read_bytes(32).await?;
    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes);
    Ok(key)
}

fn auth_failed(msg: &str) -> ProtocolError {
    ProtocolError::AuthenticationFailed(msg.into())
}

/// Reject low-order points that would make a shared secret predictable
fn contributory(shared: SharedSecret) -> Result<SharedSecret> {
    if shared.was_contributory() {
        Ok(shared)
    } else {
        Err(auth_failed(constants::ERR_WEAK_PUBLIC_KEY))
    }
}

fn constant_time_eq(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

struct Transcript<'a> {
    username: &'a str,
    salt: &'a [u8; SALT_LEN],
    client_public: &'a [u8; 32],
    server_public: &'a [u8; 32],
}

impl Transcript<'_> {
    fn shared_key(&self, s1: &SharedSecret, s2: &SharedSecret) -> Zeroizing<[u8; 32]> {
        let mut hasher = Sha256::new();
        hasher.update(KEY_LABEL);
        hasher.update(s1.as_bytes());
        hasher.update(s2.as_bytes());
        hasher.update(self.client_public);
        hasher.update(self.server_public);
        hasher.update(self.salt);
        hasher.update(self.username.as_bytes());
        Zeroizing::new(hasher.finalize().into())
    }

    fn client_proof(&self, key: &[u8; 32]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"client-proof");
        hasher.update(key);
        hasher.update(self.client_public);
        hasher.update(self.server_public);
        hasher.finalize().into()
    }

    fn server_proof(&self, key: &[u8; 32], client_proof: &[u8; 32]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"server-proof");
        hasher.update(key);
        hasher.update(self.client_public);
        hasher.update(client_proof);
        hasher.finalize().into()
    }
}

fn session_key(key: &[u8; 32]) -> Zeroizing<[u8; 32]> {
    let mut hasher = Sha256::new();
    hasher.update(b"session-key");
    hasher.update(key);
    Zeroizing::new(hasher.finalize().into())
}

/// Client-side handshake state
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ClientZkState {
    username: String,
    password: String,
    expected_server_proof: Option<[u8; 32]>,
    session_key: Option<[u8; 32]>,
}

impl ClientZkState {
    pub fn username(&self) -> &str {
        &self.username
    }
}

/// Server-side state between the challenge and the proof
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ServerZkState {
    username: String,
    salt: [u8; SALT_LEN],
    verifier: [u8; 32],
    secret: Option<StaticSecret>,
    server_public: [u8; 32],
}

impl ServerZkState {
    pub fn username(&self) -> &str {
        &self.username
    }
}

/// Starts the handshake on the client side.
#[instrument(skip(password))]
pub fn client_zk_initiate(username: &str, password: &str) -> (ClientZkState, ZkInitiate) {
    debug!("Client initiating zk handshake");
    let state = ClientZkState {
        username: username.to_string(),
        password: password.to_string(),
        expected_server_proof: None,
        session_key: None,
    };
    let msg = ZkInitiate {
        username: username.to_string(),
    };
    (state, msg)
}

/// Looks up the user and answers with salt and an ephemeral public key.
///
/// # Errors
/// `AuthenticationFailed` when the repository has no verifier for the user.
#[instrument(skip(repository, initiate), fields(username = %initiate.username))]
pub fn server_zk_respond(
    repository: &dyn ZkRepository,
    initiate: &ZkInitiate,
) -> Result<(ServerZkState, ZkChallenge)> {
    let hash = repository.password_hash(&initiate.username).ok_or_else(|| {
        warn!("Handshake for unknown user");
        auth_failed(constants::ERR_UNKNOWN_USER)
    })?;

    // Static rather than ephemeral: the host uses b twice (with A and with v).
    let secret = StaticSecret::random_from_rng(OsRng);
    let server_public = PublicKey::from(&secret).to_bytes();

    debug!("Server issuing zk challenge");

    let challenge = ZkChallenge {
        salt: hash.salt,
        server_public,
    };
    let state = ServerZkState {
        username: initiate.username.clone(),
        salt: hash.salt,
        verifier: hash.verifier,
        secret: Some(secret),
        server_public,
    };
    Ok((state, challenge))
}

/// Computes the client proof from the host's challenge.
///
/// # Errors
/// `AuthenticationFailed` if the host's public key is not contributory.
#[instrument(skip(state, challenge), fields(username = %state.username))]
pub fn client_zk_proof(mut state: ClientZkState, challenge: &ZkChallenge) -> Result<(ClientZkState, ZkProof)> {
    let ephemeral = EphemeralSecret::random_from_rng(OsRng);
    let client_public = PublicKey::from(&ephemeral).to_bytes();
    let server_public = PublicKey::from(challenge.server_public);

    let x = password_secret(&state.username, &state.password, &challenge.salt);
    state.password.zeroize();

    let s1 = contributory(ephemeral.diffie_hellman(&server_public))?;
    let s2 = contributory(x.diffie_hellman(&server_public))?;

    let transcript = Transcript {
        username: &state.username,
        salt: &challenge.salt,
        client_public: &client_public,
        server_public: &challenge.server_public,
    };
    let key = transcript.shared_key(&s1, &s2);
    let proof = transcript.client_proof(&key);
    let expected_server_proof = transcript.server_proof(&key, &proof);

    state.expected_server_proof = Some(expected_server_proof);
    state.session_key = Some(*session_key(&key));

    debug!("Client sending zk proof");

    Ok((
        state,
        ZkProof {
            client_public,
            proof,
        },
    ))
}

/// Verifies the client proof and derives the session key.
///
/// # Returns
/// The confirmation to send and the 32-byte session key.
///
/// # Errors
/// `AuthenticationFailed` on a proof mismatch or a weak client key.
#[instrument(skip(state, proof), fields(username = %state.username))]
pub fn server_zk_verify(mut state: ServerZkState, proof: &ZkProof) -> Result<(ZkConfirmation, Zeroizing<[u8; 32]>)> {
    let secret = state
        .secret
        .take()
        .ok_or_else(|| auth_failed(constants::ERR_SERVER_SECRET_NOT_FOUND))?;

    let s1 = contributory(secret.diffie_hellman(&PublicKey::from(proof.client_public)))?;
    let s2 = contributory(secret.diffie_hellman(&PublicKey::from(state.verifier)))?;

    let transcript = Transcript {
        username: &state.username,
        salt: &state.salt,
        client_public: &proof.client_public,
        server_public: &state.server_public,
    };
    let key = transcript.shared_key(&s1, &s2);

    if !constant_time_eq(&transcript.client_proof(&key), &proof.proof) {
        warn!("Client proof mismatch");
        return Err(auth_failed(constants::ERR_PROOF_MISMATCH));
    }

    let confirmation = ZkConfirmation {
        server_proof: transcript.server_proof(&key, &proof.proof),
    };

    debug!("Server verified zk proof");

    Ok((confirmation, session_key(&key)))
}

/// Checks the host's proof and releases the session key.
///
/// # Errors
/// `AuthenticationFailed` if the host could not prove knowledge of the verifier.
#[instrument(skip(state, confirmation), fields(username = %state.username))]
pub fn client_zk_finalize(mut state: ClientZkState, confirmation: &ZkConfirmation) -> Result<Zeroizing<[u8; 32]>> {
    let expected = state
        .expected_server_proof
        .take()
        .ok_or_else(|| auth_failed(constants::ERR_HANDSHAKE_OUT_OF_ORDER))?;

    if !constant_time_eq(&expected, &confirmation.server_proof) {
        warn!("Server proof mismatch");
        return Err(auth_failed(constants::ERR_SERVER_PROOF_MISMATCH));
    }

    let key = state
        .session_key
        .take()
        .ok_or_else(|| auth_failed(constants::ERR_CLIENT_SECRET_NOT_FOUND))?;

    debug!("Client established zk session");
    Ok(Zeroizing::new(key))
}

/// Handshake progress of one host connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZkPhase {
    AwaitingInitiate,
    AwaitingProof,
    Established,
}

/// Host-side handshake driver for one connection.
///
/// Advances `AwaitingInitiate → AwaitingProof → Established`; the session
/// cipher exists only in the last phase.
pub struct ZkSessionState {
    pending: Option<ServerZkState>,
    cipher: Option<Crypto>,
}

impl Default for ZkSessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl ZkSessionState {
    pub fn new() -> Self {
        Self {
            pending: None,
            cipher: None,
        }
    }

    pub fn phase(&self) -> ZkPhase {
        match (&self.pending, &self.cipher) {
            (_, Some(_)) => ZkPhase::Established,
            (Some(_), None) => ZkPhase::AwaitingProof,
            (None, None) => ZkPhase::AwaitingInitiate,
        }
    }

    pub fn is_established(&self) -> bool {
        self.cipher.is_some()
    }

    pub fn cipher(&self) -> Option<&Crypto> {
        self.cipher.as_ref()
    }

    pub fn on_initiate(&mut self, repository: &dyn ZkRepository, initiate: &ZkInitiate) -> Result<ZkChallenge> {
        if self.phase() != ZkPhase::AwaitingInitiate {
            return Err(auth_failed(constants::ERR_HANDSHAKE_OUT_OF_ORDER));
        }
        let (state, challenge) = server_zk_respond(repository, initiate)?;
        self.pending = Some(state);
        Ok(challenge)
    }

    pub fn on_proof(&mut self, proof: &ZkProof) -> Result<ZkConfirmation> {
        let state = self
            .pending
            .take()
            .ok_or_else(|| auth_failed(constants::ERR_HANDSHAKE_OUT_OF_ORDER))?;
        let (confirmation, key) = server_zk_verify(state, proof)?;
        self.cipher = Some(Crypto::new(&key));
        Ok(confirmation)
    }
}
