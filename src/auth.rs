//! Username/password check against a small secrets file.
//!
//! Stored secrets are either plaintext or
//! `pbkdf2_sha256$<iterations>$<salt_b64>$<hash_b64>`; the `hash_password` binary
//! produces the latter.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::PredictorError;

pub const HASH_PREFIX: &str = "pbkdf2_sha256";
pub const DEFAULT_ITERATIONS: u32 = 600_000;
const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Guest,
}

impl Role {
    pub fn from_username(username: &str) -> Self {
        if username == "admin" {
            Role::Admin
        } else {
            Role::Guest
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    passwords: HashMap<String, String>,
}

impl Credentials {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).with_context(|| format!("read secrets {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parse secrets {}", path.display()))
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            passwords: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.passwords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passwords.is_empty()
    }

    pub fn authenticate(&self, username: &str, password: &str) -> std::result::Result<User, PredictorError> {
        let Some(stored) = self.passwords.get(username) else {
            return Err(PredictorError::InvalidCredentials);
        };
        if !verify_password(stored, password) {
            return Err(PredictorError::InvalidCredentials);
        }
        Ok(User {
            name: username.to_string(),
            role: Role::from_username(username),
        })
    }
}

pub fn verify_password(stored: &str, candidate: &str) -> bool {
    if !stored.starts_with(HASH_PREFIX) {
        return constant_time_eq(stored.as_bytes(), candidate.as_bytes());
    }
    let Some((iterations, salt, expected)) = parse_hash(stored) else {
        return false;
    };
    let mut derived = vec![0u8; expected.len()];
    pbkdf2_hmac::<Sha256>(candidate.as_bytes(), &salt, iterations, &mut derived);
    constant_time_eq(&derived, &expected)
}

pub fn hash_password(password: &str, iterations: u32) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    hash_password_with_salt(password, &salt, iterations)
}

pub fn hash_password_with_salt(password: &str, salt: &[u8], iterations: u32) -> String {
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key);
    format!(
        "{HASH_PREFIX}${iterations}${}${}",
        BASE64.encode(salt),
        BASE64.encode(key)
    )
}

fn parse_hash(stored: &str) -> Option<(u32, Vec<u8>, Vec<u8>)> {
    let mut parts = stored.split('$');
    if parts.next()? != HASH_PREFIX {
        return None;
    }
    let iterations = parts.next()?.parse::<u32>().ok().filter(|n| *n > 0)?;
    let salt = BASE64.decode(parts.next()?).ok()?;
    let hash = BASE64.decode(parts.next()?).ok()?;
    if parts.next().is_some() || hash.is_empty() {
        return None;
    }
    Some((iterations, salt, hash))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
