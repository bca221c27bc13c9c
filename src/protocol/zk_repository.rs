//! Password verifier storage for the zero-knowledge handshake.
//!
//! A host never stores passwords. For each user it keeps a random salt and
//! the public verifier `v = X25519(x, G)` where
//! `x = SHA256(salt || SHA256(username ":" password))`.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::RwLock;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

pub const SALT_LEN: usize = 32;

/// Salt and public verifier for one user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZkPasswordHash {
    pub salt: [u8; SALT_LEN],
    pub verifier: [u8; 32],
}

impl ZkPasswordHash {
    /// Derive a verifier for `password` under a fresh random salt
    pub fn generate(username: &str, password: &str) -> Self {
        Self::with_salt(username, password, rand::random())
    }

    pub fn with_salt(username: &str, password: &str, salt: [u8; SALT_LEN]) -> Self {
        let secret = password_secret(username, password, &salt);
        let verifier = PublicKey::from(&secret).to_bytes();
        Self { salt, verifier }
    }
}

/// `x` as an X25519 scalar. Shared by verifier creation and the client proof.
pub(crate) fn password_secret(username: &str, password: &str, salt: &[u8; SALT_LEN]) -> StaticSecret {
    let mut inner = Sha256::new();
    inner.update(username.as_bytes());
    inner.update(b":");
    inner.update(password.as_bytes());
    let mut identity: [u8; 32] = inner.finalize().into();

    let mut outer = Sha256::new();
    outer.update(salt);
    outer.update(identity);
    let mut x: [u8; 32] = outer.finalize().into();
    identity.zeroize();

    let secret = StaticSecret::from(x);
    x.zeroize();
    secret
}

/// Lookup of password verifiers by user name
pub trait ZkRepository: Send + Sync {
    fn password_hash(&self, username: &str) -> Option<ZkPasswordHash>;
}

/// In-memory repository for hosts with a fixed user list
#[derive(Debug, Default)]
pub struct MemoryZkRepository {
    users: RwLock<HashMap<String, ZkPasswordHash>>,
}

impl MemoryZkRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a user; only the derived verifier is kept
    pub fn add_user(&self, username: &str, password: &str) {
        let hash = ZkPasswordHash::generate(username, password);
        self.insert(username, hash);
    }

    pub fn insert(&self, username: &str, hash: ZkPasswordHash) {
        if let Ok(mut users) = self.users.write() {
            users.insert(username.to_string(), hash);
        }
    }

    pub fn remove_user(&self, username: &str) -> bool {
        self.users
            .write()
            .map(|mut users| users.remove(username).is_some())
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.users.read().map(|users| users.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ZkRepository for MemoryZkRepository {
    fn password_hash(&self, username: &str) -> Option<ZkPasswordHash> {
        self.users.read().ok()?.get(username).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verifier_depends_on_salt_and_password() {
        let salt = [9u8; SALT_LEN];
        let a = ZkPasswordHash::with_salt("alice", "pw", salt);
        let b = ZkPasswordHash::with_salt("alice", "pw", salt);
        assert_eq!(a, b);

        assert_ne!(a.verifier, ZkPasswordHash::with_salt("alice", "pw2", salt).verifier);
        assert_ne!(a.verifier, ZkPasswordHash::with_salt("alice", "pw", [1u8; SALT_LEN]).verifier);
        assert_ne!(a.verifier, ZkPasswordHash::with_salt("bob", "pw", salt).verifier);
    }

    #[test]
    fn test_fresh_salt_per_registration() {
        let repo = MemoryZkRepository::new();
        repo.add_user("alice", "pw");
        let first = repo.password_hash("alice");
        repo.add_user("alice", "pw");
        let second = repo.password_hash("alice");
        assert!(first.is_some() && second.is_some());
        assert_ne!(first, second);
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn test_unknown_user() {
        let repo = MemoryZkRepository::new();
        assert!(repo.password_hash("mallory").is_none());
        assert!(repo.is_empty());
        repo.add_user("alice", "pw");
        assert!(repo.remove_user("alice"));
        assert!(!repo.remove_user("alice"));
    }
}
