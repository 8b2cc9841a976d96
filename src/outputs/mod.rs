//! Output generation.
//!
//! # Submodules
//!
//! - [`json`]: writes the [`CollectionReport`](crate::collector::CollectionReport)
//!   hand-off file for downstream consumers
//!
//! # Output Structure
//!
//! ```text
//! json_output_dir/
//! └── 2024-10-07/
//!     └── collection.json
//! ```

pub mod json;
