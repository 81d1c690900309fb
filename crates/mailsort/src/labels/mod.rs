//! Hierarchical label matching

mod matcher;

pub use matcher::{Resolution, find_labels_by_suffix, partition_by_source_label, resolve};
