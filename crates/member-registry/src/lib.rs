//! `member-registry` - A small web registry of members
//!
//! This library provides the record store, the request-handler core and the
//! HTTP surface for listing, searching, adding, editing and deleting members
//! kept in a local SQLite database.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod member;
pub mod storage;
pub mod web;

pub use config::Config;
pub use error::{Error, Result};
pub use handlers::{Flash, FlashLevel};
pub use logging::init_logging;
pub use member::{EditForm, Member, MemberForm};
pub use storage::{MemberStore, Storage};
