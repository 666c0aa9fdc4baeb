//! Core services and infrastructure

pub mod cancellation;
pub mod critical_section;
pub mod error_handling;
pub mod logging;
pub mod model;
pub mod sync;
