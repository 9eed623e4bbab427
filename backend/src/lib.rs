pub mod config;
pub mod error;
pub mod pipeline;
pub mod registry;
pub mod routes;
pub mod service;
pub mod storage;
