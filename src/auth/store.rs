//! In-memory user store with salted one-way password hashing.
//!
//! Process-volatile, like the rest of the server: accounts vanish on
//! restart. The relay engine never consults this store; display names
//! on the socket remain caller-supplied strings.

use std::collections::HashMap;
use std::fmt::Write as _;

use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Errors surfaced by the account store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The email already has an account
    #[error("email already registered")]
    EmailTaken,

    /// Generic login failure. Deliberately does not distinguish a
    /// missing user from a wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,
}

/// A stored account. Password material never leaves the store.
#[derive(Debug, Clone)]
struct UserRecord {
    username: String,
    email: String,
    salt: String,
    password_digest: String,
}

/// Public projection of an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub username: String,
    pub email: String,
}

/// In-memory account store keyed by email
#[derive(Default)]
pub struct UserStore {
    users: Mutex<HashMap<String, UserRecord>>,
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an account. Fails if the email is already registered.
    pub async fn signup(
        &self,
        username: String,
        email: String,
        password: &str,
    ) -> Result<(), AuthError> {
        let mut users = self.users.lock().await;
        if users.contains_key(&email) {
            return Err(AuthError::EmailTaken);
        }
        let salt = Uuid::new_v4().simple().to_string();
        let record = UserRecord {
            username,
            email: email.clone(),
            password_digest: hash_password(&salt, password),
            salt,
        };
        users.insert(email.clone(), record);
        tracing::info!("account created for '{}'", email);
        Ok(())
    }

    /// Verify credentials, returning the profile on success
    pub async fn verify_login(&self, email: &str, password: &str) -> Result<UserProfile, AuthError> {
        let users = self.users.lock().await;
        let record = users.get(email).ok_or(AuthError::InvalidCredentials)?;
        if hash_password(&record.salt, password) != record.password_digest {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(UserProfile {
            username: record.username.clone(),
            email: record.email.clone(),
        })
    }

    /// All stored profiles, unfiltered
    pub async fn all_profiles(&self) -> Vec<UserProfile> {
        let users = self.users.lock().await;
        let mut profiles: Vec<UserProfile> = users
            .values()
            .map(|record| UserProfile {
                username: record.username.clone(),
                email: record.email.clone(),
            })
            .collect();
        // Stable output for listing
        profiles.sort_by(|a, b| a.email.cmp(&b.email));
        profiles
    }
}

/// One-way digest of a salted password
fn hash_password(salt: &str, password: &str) -> String {
    let digest = Sha256::digest(format!("{salt}:{password}").as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(out, "{:02x}", byte);
    }
    out
}
