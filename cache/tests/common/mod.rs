#![allow(dead_code)]

use skein_cache::{
  Cache, CacheBuilder, Codec, CodecError, EntryInfo, EvictionListener, EvictionReason, ManualClock,
};

use std::sync::{mpsc, Arc};

/// A cache on a manual clock with the background sweep turned off, so
/// expiry only happens when a test says so.
pub fn build_test_cache(max_size: usize) -> (Cache<String>, ManualClock) {
  let clock = ManualClock::default();
  let cache = test_builder(&clock).max_size(max_size).build().unwrap();
  (cache, clock)
}

pub fn test_builder(clock: &ManualClock) -> CacheBuilder<String> {
  CacheBuilder::new()
    .clock(Arc::new(clock.clone()))
    .disable_cleanup()
}

pub fn s(value: &str) -> String {
  value.to_string()
}

// std's mpsc keeps the listener tests simple.
pub struct ChannelListener {
  pub sender: mpsc::Sender<(EntryInfo, EvictionReason)>,
}

impl EvictionListener for ChannelListener {
  fn on_evict(&self, info: EntryInfo, reason: EvictionReason) {
    let _ = self.sender.send((info, reason));
  }
}

/// XORs every byte with a fixed key.
#[derive(Debug)]
pub struct XorCodec(pub u8);

impl Codec for XorCodec {
  fn name(&self) -> &'static str {
    "xor"
  }

  fn encode(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
    Ok(bytes.iter().map(|b| b ^ self.0).collect())
  }

  fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
    self.encode(bytes)
  }
}
