//! Data models

pub mod listen;

pub use listen::{parse_listened_at, Listen, ListenParseError, LISTEN_DATE_FORMAT};
