//! Small shared helpers.

mod hashing;

pub use hashing::{content_md5, sha256_hex};
