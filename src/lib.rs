// Library exports for the haiku service

pub mod bootstrap;
pub mod bot;
pub mod cli;
pub mod config;
pub mod error;
pub mod haiku;
pub mod logs;
pub mod process;
pub mod server;
pub mod service;
pub mod shutdown;
pub mod telegram;
pub mod telemetry;
