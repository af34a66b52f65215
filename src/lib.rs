// OpenSpace Hub - Library Root
//
// All modules exported here for use by the binary and tests.

pub mod bridge;
pub mod config;
pub mod errors;
pub mod hub;
pub mod mcp;
pub mod patch;
pub mod paths;
pub mod search;
pub mod sensitive;
pub mod store;
pub mod watcher;
