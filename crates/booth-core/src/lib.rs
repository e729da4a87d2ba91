pub mod cards;
pub mod config;
pub mod ipc;
