//! Keyward command-line front end.
//!
//! Wraps the licensing core over a SQLite database. Management commands act
//! as `--actor` (owner, or admin with `--admin`); `verify`, `apply` and
//! `pending-keys` mirror the public client API and print its wire bodies.

mod commands;
mod config;

pub use commands::{Outcome, Services, execute, keygen};
pub use config::{AppCommand, AppFields, Args, Command, Config};
