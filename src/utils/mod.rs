//! Utility modules: build info and logging setup.

pub mod build_info;
pub mod logging;
