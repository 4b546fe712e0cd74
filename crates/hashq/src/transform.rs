use crate::TransformError;
use base64::{Engine, engine::general_purpose::STANDARD};
use sha2::{Digest, Sha512};

/// A pure, one-way function applied to each dispatched input.
///
/// Implementations run inside the deferred unit of work and must be safe to
/// share across tasks. A returned [`TransformError`] is logged and leaves the
/// unit's identifier permanently absent from the store.
///
/// Any `Fn(&[u8]) -> Result<String, TransformError>` closure is a transform:
///
/// ```
/// use hashq::{Transform, TransformError};
///
/// let upper = |input: &[u8]| -> Result<String, TransformError> {
///     Ok(String::from_utf8_lossy(input).to_uppercase())
/// };
/// assert_eq!(upper.apply(b"abc").unwrap(), "ABC");
/// ```
pub trait Transform: Send + Sync + 'static {
    fn apply(&self, input: &[u8]) -> Result<String, TransformError>;
}

impl<F> Transform for F
where
    F: Fn(&[u8]) -> Result<String, TransformError> + Send + Sync + 'static,
{
    fn apply(&self, input: &[u8]) -> Result<String, TransformError> {
        self(input)
    }
}

/// SHA-512 digest of the input, encoded as standard padded Base64.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sha512Base64;

impl Transform for Sha512Base64 {
    fn apply(&self, input: &[u8]) -> Result<String, TransformError> {
        Ok(STANDARD.encode(Sha512::digest(input)))
    }
}
