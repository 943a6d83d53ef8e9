pub mod completions;
pub mod config;
pub mod doctor;
pub mod parse;
pub mod send;
pub mod watch;
