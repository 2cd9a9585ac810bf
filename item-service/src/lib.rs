pub mod config;
pub mod dtos;
pub mod entry;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
