//! Gateway server key wrapper that never prints its value.

use std::fmt;

/// The gateway server key. `Debug` and `Display` are redacted.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ServerKey(String);

impl ServerKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn reveal(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ServerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ServerKey(****)")
    }
}

impl fmt::Display for ServerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_redacted() {
        let key = ServerKey::new("SB-Mid-server-abc");
        assert_eq!(format!("{key}"), "****");
        assert!(!format!("{key:?}").contains("abc"));
        assert_eq!(key.reveal(), "SB-Mid-server-abc");
    }
}
