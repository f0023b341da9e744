use serde::{Deserialize, Serialize};

/// Every user-facing string the chat produces on its own.
/// Overridable from the `[messages]` table of `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Messages {
    pub welcome: String,
    pub fallback: String,
    pub connection_error: String,
    /// `{attempt}` and `{max}` are substituted
    pub retrying: String,
    pub give_up: String,
    pub restart_failed: String,
    pub confirm_clear: String,
    pub confirm_reset: String,
    pub restarting: String,
    pub online: String,
    pub offline: String,
    pub checking: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            welcome: WELCOME.to_string(),
            fallback: "Sorry, I couldn't understand your request. Please try again.".to_string(),
            connection_error: "Sorry, a connection error occurred.".to_string(),
            retrying: "Retrying... ({attempt}/{max})".to_string(),
            give_up: "Please check your connection and try again later.".to_string(),
            restart_failed: "Restarting the conversation failed. Please restart chattr.".to_string(),
            confirm_clear: "Clear all messages?".to_string(),
            confirm_reset: "Restart the whole conversation? Everything will be erased.".to_string(),
            restarting: "Restarting conversation".to_string(),
            online: "online".to_string(),
            offline: "offline".to_string(),
            checking: "checking".to_string(),
        }
    }
}

impl Messages {
    pub fn retry_notice(&self, attempt: u32, max: u32) -> String {
        let status = self
            .retrying
            .replace("{attempt}", &attempt.to_string())
            .replace("{max}", &max.to_string());
        format!("{} {}", self.connection_error, status)
    }

    pub fn give_up_notice(&self) -> String {
        format!("{} {}", self.connection_error, self.give_up)
    }
}

const WELCOME: &str = "Welcome to the smart travel agency! 🌟
How can I help you today?

I can help you with:
  ✈️  booking flights
  🏨 booking hotels
  🎯 planning your trip";
