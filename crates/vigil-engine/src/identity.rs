use sha2::{Digest, Sha256};
use thiserror::Error;
use vigil_types::Role;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("a display name is required")]
    EmptyUsername,
}

/// Maps a self-asserted display name to a role, and checks the shared
/// secret for elevated access. Pure comparisons, no side effects — the
/// caller owns whatever it does with the result.
#[derive(Clone)]
pub struct IdentityResolver {
    admin_username: String,
    access_key_digest: Option<[u8; 32]>,
}

impl IdentityResolver {
    /// No configured access key means the elevated path is permanently
    /// closed: `verify_access_key` never returns true.
    pub fn new(admin_username: String, access_key: Option<&str>) -> Self {
        Self {
            admin_username,
            access_key_digest: access_key.map(digest),
        }
    }

    /// Resolve a display name. An empty name is not resolved; the caller
    /// must not proceed without one.
    pub fn resolve(&self, name: &str) -> Result<Role, IdentityError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(IdentityError::EmptyUsername);
        }
        if name == self.admin_username {
            Ok(Role::Administrator)
        } else {
            Ok(Role::Standard)
        }
    }

    /// Check a candidate secret. Both sides are compared as SHA-256
    /// digests, so the comparison length never depends on the secret.
    pub fn verify_access_key(&self, candidate: &str) -> bool {
        match self.access_key_digest {
            Some(expected) => digest(candidate) == expected,
            None => false,
        }
    }
}

fn digest(key: &str) -> [u8; 32] {
    Sha256::digest(key.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> IdentityResolver {
        IdentityResolver::new("papa".to_string(), Some("hunter2"))
    }

    #[test]
    fn test_resolve_roles() {
        let r = resolver();
        assert_eq!(r.resolve("papa").unwrap(), Role::Administrator);
        assert_eq!(r.resolve("mika").unwrap(), Role::Standard);
        // Exact match only.
        assert_eq!(r.resolve("Papa").unwrap(), Role::Standard);
    }

    #[test]
    fn test_empty_name_is_not_resolved() {
        let r = resolver();
        assert_eq!(r.resolve("").unwrap_err(), IdentityError::EmptyUsername);
        assert_eq!(r.resolve("   ").unwrap_err(), IdentityError::EmptyUsername);
    }

    #[test]
    fn test_access_key_check() {
        let r = resolver();
        assert!(r.verify_access_key("hunter2"));
        assert!(!r.verify_access_key("hunter3"));
        assert!(!r.verify_access_key(""));
    }

    #[test]
    fn test_missing_key_fails_closed() {
        let r = IdentityResolver::new("papa".to_string(), None);
        assert!(!r.verify_access_key("hunter2"));
        assert!(!r.verify_access_key(""));
    }
}
