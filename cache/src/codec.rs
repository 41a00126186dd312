//! Byte transforms applied to values at rest.
//!
//! A value is serialized with `serde_json` first, then run through the
//! compression codec, then the encryption codec. Reads undo the chain in
//! reverse order.

use crate::error::CodecError;

use std::fmt;
use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

/// A reversible transform over serialized values.
pub trait Codec: Send + Sync + fmt::Debug {
  /// Short name used in logs and errors.
  fn name(&self) -> &'static str;

  fn encode(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError>;

  fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError>;
}

/// Passes bytes through untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCodec;

impl Codec for NullCodec {
  fn name(&self) -> &'static str {
    "null"
  }

  fn encode(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
    Ok(bytes.to_vec())
  }

  fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
    Ok(bytes.to_vec())
  }
}

/// Gzip compression via `flate2`.
#[derive(Debug, Clone, Copy)]
pub struct GzipCodec {
  level: Compression,
}

impl GzipCodec {
  /// `level` ranges from 0 (store) to 9 (best); values above 9 are clamped.
  pub fn new(level: u32) -> Self {
    Self {
      level: Compression::new(level.min(9)),
    }
  }
}

impl Default for GzipCodec {
  fn default() -> Self {
    Self {
      level: Compression::default(),
    }
  }
}

impl Codec for GzipCodec {
  fn name(&self) -> &'static str {
    "gzip"
  }

  fn encode(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(bytes.len() / 2), self.level);
    encoder
      .write_all(bytes)
      .map_err(|e| CodecError::new(self.name(), e.to_string()))?;
    encoder
      .finish()
      .map_err(|e| CodecError::new(self.name(), e.to_string()))
  }

  fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder
      .read_to_end(&mut out)
      .map_err(|e| CodecError::new(self.name(), e.to_string()))?;
    Ok(out)
  }
}
