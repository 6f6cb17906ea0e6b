pub mod cache;
pub mod clear;
pub mod common;
pub mod completions;
pub mod list;
pub mod push;
pub mod report;
pub mod watch;
