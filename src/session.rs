use std::fmt;
use uuid::Uuid;

/// Conversation key shared with the agent server.
///
/// Generated once per process and never persisted, so every launch talks to
/// a fresh server-side tracker while the local transcript survives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn generate() -> Self {
        let raw = Uuid::new_v4().simple().to_string();
        SessionToken(format!("user_{}", &raw[..9]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionToken {
    fn from(value: &str) -> Self {
        SessionToken(value.to_string())
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
