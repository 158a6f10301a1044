//! Caller identity passed into every dispatcher operation
//!
//! A `UserContext` is a plain data-transfer struct. Hosts build one from
//! whatever identity object they have (see the server's identity adapter)
//! before calling the dispatcher; it has no persistence of its own.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write;

/// Identity and session state of the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    name: String,
    escaped_name: String,
    groups: Vec<String>,
    /// Session-scoped opaque values (tokens, raw claims). Never serialized.
    #[serde(skip)]
    auth_state: HashMap<String, serde_json::Value>,
}

impl UserContext {
    /// Create a user context with no auth state
    pub fn new(name: impl Into<String>, groups: Vec<String>) -> Self {
        let name = name.into();
        let escaped_name = escape_name(&name);
        Self {
            name,
            escaped_name,
            groups,
            auth_state: HashMap::new(),
        }
    }

    /// Attach auth state at construction time
    pub fn with_auth_state(mut self, auth_state: HashMap<String, serde_json::Value>) -> Self {
        self.auth_state = auth_state;
        self
    }

    /// Login name as supplied by the identity provider
    pub fn name(&self) -> &str {
        &self.name
    }

    /// DNS-safe derivative of the name
    pub fn escaped_name(&self) -> &str {
        &self.escaped_name
    }

    /// Group memberships, in provider order
    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    /// Whether the user belongs to `group`
    pub fn is_member_of(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }

    /// Opaque session state
    pub fn auth_state(&self) -> &HashMap<String, serde_json::Value> {
        &self.auth_state
    }

    /// Replace the session state. The only mutation allowed after construction.
    pub fn refresh_auth_state(&mut self, auth_state: HashMap<String, serde_json::Value>) {
        self.auth_state = auth_state;
    }
}

/// Escape a login name into a DNS-label-safe string.
///
/// The name is lowercased; `[a-z0-9]` pass through and every other byte
/// becomes `-` followed by its two-digit lowercase hex value.
pub fn escape_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    let mut escaped = String::with_capacity(lowered.len());
    for byte in lowered.bytes() {
        if byte.is_ascii_lowercase() || byte.is_ascii_digit() {
            escaped.push(byte as char);
        } else {
            // Writing to a String cannot fail
            let _ = write!(escaped, "-{:02x}", byte);
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_escape_plain_name() {
        assert_eq!(escape_name("alice"), "alice");
        assert_eq!(escape_name("Alice42"), "alice42");
    }

    #[test]
    fn test_escape_unsafe_characters() {
        assert_eq!(escape_name("a.b"), "a-2eb");
        assert_eq!(escape_name("jo_smith"), "jo-5fsmith");
        assert_eq!(escape_name("x-y"), "x-2dy");
    }

    #[test]
    fn test_escape_multibyte() {
        // 'é' is 0xc3 0xa9 in UTF-8
        assert_eq!(escape_name("é"), "-c3-a9");
    }

    #[test]
    fn test_user_context_accessors() {
        let user = UserContext::new("Bob.Smith", vec!["lsst".to_string(), "admins".to_string()]);
        assert_eq!(user.name(), "Bob.Smith");
        assert_eq!(user.escaped_name(), "bob-2esmith");
        assert!(user.is_member_of("admins"));
        assert!(!user.is_member_of("guests"));
        assert!(user.auth_state().is_empty());
    }

    #[test]
    fn test_refresh_auth_state() {
        let mut user = UserContext::new("carol", vec![]);
        let mut state = HashMap::new();
        state.insert("access_token".to_string(), json!("t1"));
        user.refresh_auth_state(state);
        assert_eq!(user.auth_state()["access_token"], json!("t1"));
    }

    #[test]
    fn test_auth_state_not_serialized() {
        let mut state = HashMap::new();
        state.insert("access_token".to_string(), json!("secret"));
        let user = UserContext::new("dave", vec!["g".to_string()]).with_auth_state(state);

        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(value["name"], json!("dave"));
        assert!(value.get("auth_state").is_none());
    }
}
