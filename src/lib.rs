//! Slidegate - Sliding-window rate limiting for an administrative backend
//!
//! This crate implements an in-memory sliding-window rate limiter with a
//! periodic sweep that keeps memory bounded, and a broker-code validation
//! endpoint that consults an admin directory service and falls back to a
//! static table when the directory is unavailable.

pub mod brokers;
pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
