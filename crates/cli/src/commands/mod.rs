//! CLI command implementations

pub mod chat;
pub mod evaluate;
pub mod predict;
pub mod reshape;
