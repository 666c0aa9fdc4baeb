//! Command line application

pub mod cli;
pub mod spinner;
pub mod startup;
pub mod workspace;

pub use workspace::LocalWorkspace;
