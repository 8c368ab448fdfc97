// src/core/mod.rs

pub mod config_store;
pub mod environment;
pub mod paths;
pub mod project;
pub mod serve;
pub mod session;
pub mod tasks;
