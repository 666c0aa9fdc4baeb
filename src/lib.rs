//! Client-side engine that keeps a local cache of static-analysis findings
//! synchronised with a remote, content-addressed analysis service.

pub mod app;
pub mod bundle;
pub mod content;
pub mod core;
pub mod ignore;
pub mod notifications;
pub mod scan;

include!(concat!(env!("OUT_DIR"), "/version.rs"));
