//! # lustre-csi-common
//!
//! Shared types for the Lustre CSI node agent.
//!
//! This crate provides:
//! - The error taxonomy returned by every node operation
//! - Node-local paths (the working mount directory)
//! - Pure sub-path validation used before any directory is created or removed

#![warn(missing_docs)]

pub mod error;
pub mod paths;

pub use error::{CsiError, CsiResult, ErrorCode};
pub use paths::{NodePaths, clean_subpath, is_strict_subpath};
