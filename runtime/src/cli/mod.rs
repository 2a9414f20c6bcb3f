//! CLI subcommand implementations for the policyscope binary.

pub mod analyze_cmd;
pub mod classify_cmd;
pub mod doctor;
pub mod extract_cmd;
pub mod links_cmd;
pub mod output;
pub mod page;
