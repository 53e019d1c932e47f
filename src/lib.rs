pub mod commands;
pub mod config;
pub mod engine;
pub mod indicators;
pub mod models;
pub mod monte_carlo;
pub mod param_utils;
pub mod performance;
pub mod portfolio;
pub mod price_data;
pub mod strategy;
