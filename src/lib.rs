//! Incident Oracle
//!
//! Turns a free-text incident description into a grounded remediation
//! recommendation: extract a classification, plan a search, retrieve similar
//! historical incidents with hybrid lexical/semantic search, then synthesize
//! a recommendation that cites them.

pub mod api;
pub mod config;
pub mod error;
pub mod llm;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod search;
pub mod seed;

pub use error::{AppError, Result};
