pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod scheduler;
mod tasks;
