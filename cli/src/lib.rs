//! nanofolio-cli: command-line front end for the nanofolio engine.
//!
//! Reads prices and weights from JSON files, runs one engine operation per
//! subcommand and prints the result as JSON.

pub mod commands;
pub mod config;
pub mod error;
pub mod input;
