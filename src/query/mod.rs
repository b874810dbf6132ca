// src/query/mod.rs
//! Query language front end over the job dataset

pub mod engine;
pub mod executor;
pub mod gateway;
pub mod parser;

pub use engine::QueryEngine;
pub use executor::{QueryError, QueryResponse};
pub use gateway::{GatewayError, QueryGateway, QueryRequest};
