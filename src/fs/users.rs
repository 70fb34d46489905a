//! User identities and the in-memory registry.
//!
//! A user is persisted as one ASCII line in `/.users/<username>`:
//! `"<username> <user_id> <sha512_hex(password)>"`. The hash doubles as a
//! shared secret; there is no further authentication.

use crate::errors::{FsError, Result};
use sha2::{Digest, Sha512};
use std::collections::BTreeMap;

/// The super-user created at format time.
pub const ROOT_USER_ID: u16 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub username: String,
    pub user_id: u16,
    pub password_hash: String,
}

impl User {
    pub fn new(username: &str, user_id: u16, password: &str) -> Self {
        User {
            username: username.to_string(),
            user_id,
            password_hash: hash_password(password),
        }
    }

    /// The on-disk line, without a trailing newline.
    pub fn to_line(&self) -> String {
        format!("{} {} {}", self.username, self.user_id, self.password_hash)
    }

    /// Parse a user file line; whitespace-separated, at least three tokens.
    pub fn parse_line(line: &str) -> Result<User> {
        let mut parts = line.split_whitespace();
        let (Some(username), Some(id), Some(hash)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(FsError::CorruptImage(format!(
                "malformed user record: {line:?}"
            )));
        };

        let user_id = id
            .parse::<u16>()
            .map_err(|_| FsError::CorruptImage(format!("malformed user id: {id:?}")))?;

        Ok(User {
            username: username.to_string(),
            user_id,
            password_hash: hash.to_string(),
        })
    }

    /// Parse a line and verify `password` against the stored hash.
    pub fn verify(line: &str, password: &str) -> Result<User> {
        let user = User::parse_line(line)?;
        if hash_password(password) != user.password_hash {
            return Err(FsError::IncorrectPassword);
        }
        Ok(user)
    }
}

/// Hex-encoded SHA-512 of the password.
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Known users (id to name), the next free id, and the logged-in user.
#[derive(Debug, Default)]
pub struct UserRegistry {
    users: BTreeMap<u16, String>,
    next_id: u16,
    current: Option<User>,
}

impl UserRegistry {
    pub fn new() -> Self {
        UserRegistry::default()
    }

    /// Register a new user under the next free id.
    pub fn create(&mut self, username: &str, password: &str) -> User {
        let user = User::new(username, self.next_id, password);
        self.users.insert(user.user_id, user.username.clone());
        self.next_id += 1;
        user
    }

    /// Rebuild the mapping from disk state; ids continue after the largest
    /// one seen.
    pub fn load(&mut self, users: BTreeMap<u16, String>) {
        self.next_id = users.keys().max().map_or(0, |id| id + 1);
        self.users = users;
    }

    pub fn username(&self, user_id: u16) -> Option<&str> {
        self.users.get(&user_id).map(String::as_str)
    }

    pub fn id_of(&self, username: &str) -> Option<u16> {
        self.users
            .iter()
            .find(|(_, name)| name.as_str() == username)
            .map(|(id, _)| *id)
    }

    pub fn delete(&mut self, user_id: u16) {
        self.users.remove(&user_id);
    }

    pub fn current(&self) -> Option<&User> {
        self.current.as_ref()
    }

    pub fn set_current(&mut self, user: User) {
        self.current = Some(user);
    }
}
