//! Terminal rendering: progress spinner and the final run summary

pub mod spinner;
pub mod summary;
