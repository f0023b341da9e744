pub mod app;
pub mod conversation;
pub mod format;
