pub mod cli;
pub mod config;
pub mod drive;
pub mod error;
pub mod global;
pub mod sync;
pub mod token;
pub mod transfer;
pub mod zoom;
