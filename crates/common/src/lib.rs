//! Error plumbing shared by the skillhub crates.

pub mod error;

pub use error::{Error, FromMessage, Result, SkillhubError};
