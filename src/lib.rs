pub mod collector;
pub mod config;
pub mod data_structures;
pub mod provider;
pub mod report;
pub mod yahoo;
