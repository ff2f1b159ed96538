//! File utilities: migration name sanitization and the directory lock.

pub mod filename;
pub mod lock;
