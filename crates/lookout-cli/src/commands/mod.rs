//! Command handlers.

pub mod alerts;
pub mod init;
pub mod searches;
pub mod watch;
