//! Output generation for the collected updates.
//!
//! # Submodules
//!
//! - [`json`]: Writes the run's items to a dated JSON snapshot
//! - [`html`]: Renders the mail digest (subject and HTML body)
//!
//! # Output Structure
//!
//! ```text
//! json_output_dir/
//! └── cloud_updates_week_2024-06-07.json
//! ```
//!
//! The HTML digest is never written to disk; it goes straight to delivery.

pub mod html;
pub mod json;
