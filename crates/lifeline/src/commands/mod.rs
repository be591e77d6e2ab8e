//! Command implementations
//!
//! One module per `lifeline` subcommand.

pub mod plan;
pub mod resolve;
pub mod run;
