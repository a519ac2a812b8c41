pub mod cli;
pub mod commands;
pub mod config;
pub mod db;
pub mod editor;
pub mod error;
pub mod export;
pub mod listing;
pub mod llm;
pub mod sections;

pub use cli::run;
