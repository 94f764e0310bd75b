//! # Oth (authentication and permission lookup)
//!
//! `oth` authenticates users by email and password, hands out session cookies,
//! and lets other backend services turn a session identifier into the list of
//! permissions held by its user.
//!
//! ## Two surfaces, one store
//!
//! The process runs two HTTP listeners that never call each other:
//!
//! - **Public** (`/login`, `/register`, `/permissions`): browser-facing. Owns the
//!   credential check and is the only writer of sessions.
//! - **Internal** (`/permissions/:sessionId`): server-to-server. Resolves a
//!   session to its user's permissions without re-checking credentials.
//!
//! They are coupled only through the shared session table. The internal
//! listener performs no authentication of its own: whoever can reach it is
//! trusted, so it must be bound to a private network address only.
//!
//! ## Sessions
//!
//! Session tokens are 32 random bytes from the OS CSPRNG, base64url encoded.
//! Only their SHA-256 hash is persisted. Sessions expire a fixed time after
//! creation; expired rows are never resolvable and are swept periodically.
//!
//! ## Permissions
//!
//! Permissions are flat, uniquely named strings attached to users through a
//! join table. A session whose user was deleted resolves to an empty list.

pub mod api;
pub mod cli;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
