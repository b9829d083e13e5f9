//! evidex-cli library, exposes command handlers for tests.

pub mod commands;
