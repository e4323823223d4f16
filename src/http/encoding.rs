//! Content-coding negotiation and the gzip codec.
//!
//! Only `gzip` is supported. Negotiation keeps the client's order:
//!
//! ```
//! use mini_web::Encodings;
//!
//! let encodings = Encodings::parse("br, gzip, deflate");
//! assert_eq!(encodings.get_encoding(), Some("gzip"));
//!
//! let encodings = Encodings::parse("identity");
//! assert_eq!(encodings.get_encoding(), None);
//! ```

use crate::errors::ErrorKind;
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use std::io::{self, Read, Write};

/// A content coding this server can produce and consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    Gzip,
}

impl Encoding {
    const SUPPORTED: [Encoding; 1] = [Encoding::Gzip];

    /// Matches a single, already trimmed token exactly.
    #[inline]
    pub fn from_token(token: &str) -> Option<Self> {
        Self::SUPPORTED
            .into_iter()
            .find(|encoding| encoding.as_str() == token)
    }

    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Encoding::Gzip => "gzip",
        }
    }
}

/// Supported encodings from an `Accept-Encoding` value, in the order the
/// client listed them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Encodings {
    encodings: Vec<Encoding>,
}

impl Encodings {
    /// Splits on `,`, trims each entry and keeps the supported ones.
    ///
    /// Quality values are not interpreted: `gzip;q=0` is not the token
    /// `gzip` and is dropped like any other unknown entry.
    pub fn parse(raw: &str) -> Self {
        let encodings = raw
            .split(',')
            .filter_map(|token| Encoding::from_token(token.trim()))
            .collect();

        Self { encodings }
    }

    /// The negotiated response encoding, if any.
    #[inline]
    pub fn first(&self) -> Option<Encoding> {
        self.encodings.first().copied()
    }

    /// Header value of the negotiated encoding, `None` means no encoding.
    #[inline]
    pub fn get_encoding(&self) -> Option<&'static str> {
        self.first().map(|encoding| encoding.as_str())
    }

    #[inline]
    pub fn as_slice(&self) -> &[Encoding] {
        &self.encodings
    }
}

/// Encodes `content` for a `Content-Encoding: <encoding>` response.
///
/// Unknown encodings pass the content through unchanged.
pub fn encode(encoding: &str, content: &[u8]) -> io::Result<Vec<u8>> {
    match Encoding::from_token(encoding) {
        Some(Encoding::Gzip) => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(content)?;
            encoder.finish()
        }
        None => Ok(content.to_vec()),
    }
}

/// Decodes a request body sent with `Content-Encoding: <encoding>`.
///
/// Unlike [`encode`], unknown encodings are an error. Output longer than
/// `limit` bytes fails with [`ErrorKind::BodyTooLarge`] without being
/// decoded further.
pub fn decode(encoding: &str, content: &[u8], limit: usize) -> Result<Vec<u8>, ErrorKind> {
    match Encoding::from_token(encoding) {
        Some(Encoding::Gzip) => {
            let mut decoded = Vec::with_capacity(content.len().saturating_mul(2).min(limit));
            GzDecoder::new(content)
                .take((limit as u64).saturating_add(1))
                .read_to_end(&mut decoded)
                .map_err(|err| ErrorKind::Decode(err.to_string()))?;

            if decoded.len() > limit {
                return Err(ErrorKind::BodyTooLarge(limit));
            }
            Ok(decoded)
        }
        None => Err(ErrorKind::Decode(format!("invalid encoding: {encoding}"))),
    }
}
