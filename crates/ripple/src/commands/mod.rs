//! Command implementations that need more than a single engine call.

pub mod init;
