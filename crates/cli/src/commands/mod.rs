//! CLI subcommands

pub mod advise;
pub mod run;
pub mod show;
pub mod simulate;
