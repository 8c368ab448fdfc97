// src/cli/handlers/mod.rs

pub mod config;
pub mod info;
pub mod login;
pub mod logout;
pub mod serve;
