pub mod cache;
pub mod chat;
pub mod commands;
pub mod config;
pub mod core;
pub mod db;
pub mod discord;
pub mod help;
pub mod llm;
pub mod plugins;

#[cfg(test)]
pub mod testing;
