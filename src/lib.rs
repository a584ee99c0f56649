//! A client for an expense-tracking backend. It walks a user through creating a session,
//! uploading a bank statement and an optional product-to-tag mapping, and waiting for the backend
//! to categorize the transactions. It then offers a queryable, editable view of the result.
//!
//! The [`wizard::Wizard`] drives onboarding and the [`editor::Editor`] drives reconciliation.
//! Both talk to the backend through an [`api::Gateway`].

pub mod api;
pub mod args;
pub mod commands;
mod config;
pub mod editor;
mod error;
pub mod model;
mod utils;
pub mod wizard;


pub use api::Mode;
pub use config::Config;
pub use error::{Error, ErrorType, Result};
