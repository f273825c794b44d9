//! Server-to-client graphics output PDUs.

pub mod bitmap;
pub mod fast_path;
pub mod update;
