// lib.rs - Library exports for integration tests

pub mod config;
pub mod bootstrap;
pub mod chain;
pub mod math;
pub mod models;
pub mod engine;
pub mod web;
