//! cmap-dp library interface
//!
//! Document-processing service for the CMAP annotation pipeline: assembles
//! per-document multimedia metadata (speech transcripts, optical text
//! detections, speaker tracks) into addressable annotation surfaces,
//! aggregates externally produced annotations, and syncs results back into
//! the document store.

pub mod aggregate;
pub mod annotate;
pub mod assembly;
pub mod config;
pub mod fields;
pub mod models;
pub mod pipeline;
pub mod sanitize;
pub mod store;

pub use cmap_common::{Error, Result};
