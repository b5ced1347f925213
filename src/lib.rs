pub mod agent;
pub mod builtins;
pub mod command;
pub mod config;
pub mod correlator;
pub mod dispatcher;
pub mod error;
pub mod extension;
pub mod files;
pub mod help;
pub mod mqtt;
pub mod registry;
pub mod tokenizer;
pub mod transcript;
pub mod transport;
pub mod wire;
