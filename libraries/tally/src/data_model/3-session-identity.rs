//! # SessionIdentity
//! An opaque token addressing a history record in the remote store. Two formats exist:
//! - `calc_<random>_<timestamp>`, synthesized on the device the first time it is needed;
//! - `b-<server id>`, issued by the document store when it creates a record.

use std::fmt;

use chrono::{DateTime, Utc};

const CLIENT_PREFIX: &str = "calc_";
const LEGACY_CLIENT_PREFIX: &str = "local_";
const SERVER_ISSUED_PREFIX: &str = "b-";
const RANDOM_SUFFIX_LEN: usize = 9;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct SessionIdentity(String);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdentityOrigin {
    ClientGenerated,
    ServerIssued,
    /// Anything else, e.g. a hand-edited link.
    Unknown,
}

impl SessionIdentity {
    /// Returns `None` for empty or whitespace-only tokens.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        let token = token.trim();
        (!token.is_empty()).then(|| Self(token.to_string()))
    }

    /// A fresh client-side identity: random suffix plus a millisecond timestamp, both base 36.
    /// Collisions are improbable, not impossible.
    pub fn synthesize(now: DateTime<Utc>) -> Self {
        let random = to_base36(uuid::Uuid::new_v4().as_u128());
        let random: String = random.chars().take(RANDOM_SUFFIX_LEN).collect();
        let millis = u128::try_from(now.timestamp_millis()).unwrap_or_default();
        Self(format!("{CLIENT_PREFIX}{random}_{}", to_base36(millis)))
    }

    /// Wrap an id handed out by the document store.
    pub fn issued(server_id: &str) -> Self {
        Self(format!("{SERVER_ISSUED_PREFIX}{server_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn origin(&self) -> IdentityOrigin {
        if self.0.starts_with(CLIENT_PREFIX) || self.0.starts_with(LEGACY_CLIENT_PREFIX) {
            IdentityOrigin::ClientGenerated
        } else if self.0.starts_with(SERVER_ISSUED_PREFIX) {
            IdentityOrigin::ServerIssued
        } else {
            IdentityOrigin::Unknown
        }
    }

    pub fn is_client_generated(&self) -> bool {
        self.origin() == IdentityOrigin::ClientGenerated
    }

    /// The id the document store knows this record by, if it issued it.
    pub fn server_id(&self) -> Option<&str> {
        self.0
            .strip_prefix(SERVER_ISSUED_PREFIX)
            .filter(|id| !id.is_empty())
    }
}

impl fmt::Display for SessionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn to_base36(mut value: u128) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(DIGITS[(value % 36) as usize] as char);
        value /= 36;
    }
    digits.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthesized_identity_shape() {
        let now = DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000).unwrap();
        let identity = SessionIdentity::synthesize(now);
        let parts: Vec<_> = identity.as_str().split('_').collect();

        assert_eq!(parts.len(), 3, "{identity}");
        assert_eq!(parts[0], "calc");
        assert_eq!(parts[1].len(), RANDOM_SUFFIX_LEN);
        assert_eq!(parts[2], to_base36(1_700_000_000_000));
        assert!(identity.is_client_generated());
        assert_eq!(identity.server_id(), None);
    }

    #[test]
    fn synthesized_identities_differ() {
        let now = Utc::now();
        assert_ne!(
            SessionIdentity::synthesize(now),
            SessionIdentity::synthesize(now)
        );
    }

    #[test]
    fn classifies_origins() {
        let issued = SessionIdentity::issued("65f1c0ffee");
        assert_eq!(issued.as_str(), "b-65f1c0ffee");
        assert_eq!(issued.origin(), IdentityOrigin::ServerIssued);
        assert_eq!(issued.server_id(), Some("65f1c0ffee"));

        let legacy = SessionIdentity::new("local_abc_123").unwrap();
        assert!(legacy.is_client_generated());

        let other = SessionIdentity::new("someone-elses-id").unwrap();
        assert_eq!(other.origin(), IdentityOrigin::Unknown);
    }

    #[test]
    fn rejects_blank_tokens() {
        assert_eq!(SessionIdentity::new(""), None);
        assert_eq!(SessionIdentity::new("   "), None);
        assert_eq!(
            SessionIdentity::new(" calc_x_1 ").map(|id| id.to_string()),
            Some("calc_x_1".to_string())
        );
    }

    #[test]
    fn base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }
}
