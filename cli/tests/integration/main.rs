//! Integration tests for the outpost CLI
//!
//! These tests spawn the actual binary and test end-to-end behavior. None of
//! them reach a real host: commands that would connect are pointed at a
//! missing identity file, which fails before ssh is started.

mod cli_tests;
mod remote_commands;
mod status_command;
