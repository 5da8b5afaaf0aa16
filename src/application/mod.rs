//! Request pipeline: resource access policy, render orchestration and remote sources.

pub mod access;
pub mod error;
pub mod remote;
pub mod render;
