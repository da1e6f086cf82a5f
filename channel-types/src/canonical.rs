//! Canonical body - the MAC input for a signed message.
//!
//! Fields are concatenated in a fixed order with no separators, so any
//! implementation that writes the same fields in the same order reproduces
//! the same signature.

/// A message that carries a signature over its other fields.
pub trait Signable {
    /// Fixed-order concatenation of every non-signature field.
    fn canonical_body(&self) -> Vec<u8>;

    /// The signature as received or last set.
    fn signature(&self) -> &str;

    /// Replace the signature.
    fn set_signature(&mut self, signature: String);
}

/// Builder for canonical bodies.
#[derive(Debug, Default)]
pub(crate) struct CanonicalWriter {
    buf: Vec<u8>,
}

impl CanonicalWriter {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn field(mut self, bytes: &[u8]) -> Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_are_concatenated_in_order() {
        let body = CanonicalWriter::default()
            .field(b"GET")
            .field(b"")
            .field(b"1.0")
            .finish();
        assert_eq!(body, b"GET1.0");
    }

    #[test]
    fn capacity_does_not_change_body() {
        let a = CanonicalWriter::with_capacity(0).field(b"ab").field(b"c").finish();
        let b = CanonicalWriter::with_capacity(64).field(b"ab").field(b"c").finish();
        assert_eq!(a, b);
    }
}
