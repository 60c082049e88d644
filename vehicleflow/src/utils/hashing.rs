//! Content hashing used for fingerprints and upload checksums.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use md5::{Digest as _, Md5};
use sha2::Sha256;

/// Returns the lowercase hex SHA-256 digest of `parts`, each terminated by a
/// zero byte so that `["ab", "c"]` and `["a", "bc"]` hash differently.
#[must_use]
pub fn sha256_hex<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<[u8]>,
{
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_ref());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

/// Returns the base64 MD5 digest of `bytes`, the form object stores expect in
/// a `Content-MD5` header.
#[must_use]
pub fn content_md5(bytes: &[u8]) -> String {
    let digest = Md5::digest(bytes);
    STANDARD.encode(digest)
}
