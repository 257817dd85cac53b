//! Command implementations

pub mod dockerfile;
pub mod plan;
pub mod run;
pub mod version;
