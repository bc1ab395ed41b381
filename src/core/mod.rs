pub mod config;
pub mod diagnostics;
pub mod error;
pub mod languages;
pub mod verdict;
