//! Skill marketplace core: discovery across GitHub repositories, manifest
//! parsing, a time-boxed resource cache, and reconciliation with the skills
//! installed on disk.
//!
//! Skills are directories containing a `SKILL.md` file with a `---` delimited
//! header of `key: value` lines followed by markdown instructions.

pub mod aggregate;
pub mod cache;
pub mod catalog;
pub mod error;
pub mod github;
pub mod install;
pub mod installed;
pub mod parse;
pub mod resolve;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};
