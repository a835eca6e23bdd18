// Mani Offline Library
// Offline request cache controller for the Mani News content API

pub mod cache;
pub mod clients;
pub mod config;
pub mod constants;
pub mod controller;
pub mod error;
pub mod fetch;
pub mod lifecycle;
pub mod logging;
pub mod message;
pub mod metrics;
pub mod notification;
pub mod pipeline;
pub mod proxy;
pub mod router;
pub mod security;
pub mod strategy;
pub mod sync;
