//! pressroom: renders uploaded HTML documents to PDF behind a per-request resource sandbox.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
