//! # murmur_core
//!
//! Session and identity logic for Murmur: identity provider access, token
//! verification caching, revocation, user reconciliation and the per-request
//! session guard.

pub mod auth;
pub mod content;
pub mod migrate;
pub mod models;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
