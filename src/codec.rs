//! Module implement value serialization for the store.
//!
//! Values are serialized to CBOR and then run through an optional
//! compression stage. A store must be read back with the same codec
//! it was built with, the codec's name is persisted in the store's
//! statistics for applications to verify.

use cbordata::{FromCbor, IntoCbor};

use std::io::Read;

use crate::{util, Error, Result};

/// Trait to serialize store values to bytes and back.
pub trait Codec<V>: Clone {
    /// Serialize `value` to its stored representation.
    fn encode(&self, value: V) -> Result<Vec<u8>>;

    /// Deserialize a value from its stored representation `data`.
    fn decode(&self, data: &[u8]) -> Result<V>;

    /// Codec name, persisted in store statistics.
    fn to_name(&self) -> String;
}

/// Codec variant that stores CBOR-serialized values as is.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCompress;

impl<V> Codec<V> for NoCompress
where
    V: IntoCbor + FromCbor,
{
    fn encode(&self, value: V) -> Result<Vec<u8>> {
        util::into_cbor_bytes(value)
    }

    fn decode(&self, data: &[u8]) -> Result<V> {
        let (value, _) = util::from_cbor_bytes(data)?;
        Ok(value)
    }

    fn to_name(&self) -> String {
        "nocompress".to_string()
    }
}

/// Codec variant that compresses CBOR-serialized values with zstd.
#[derive(Clone, Copy, Debug)]
pub struct Zstd {
    level: i32,
}

impl Default for Zstd {
    fn default() -> Zstd {
        Zstd {
            level: zstd::DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl Zstd {
    /// Create zstd codec with compression `level`, refer to zstd
    /// documentation for valid levels.
    pub fn new(level: i32) -> Zstd {
        Zstd { level }
    }
}

impl<V> Codec<V> for Zstd
where
    V: IntoCbor + FromCbor,
{
    fn encode(&self, value: V) -> Result<Vec<u8>> {
        let data = util::into_cbor_bytes(value)?;
        err_at!(IOError, zstd::encode_all(data.as_slice(), self.level))
    }

    fn decode(&self, data: &[u8]) -> Result<V> {
        let mut decoder = err_at!(InvalidFormat, zstd::stream::read::Decoder::new(data))?;
        let mut buf = vec![];
        err_at!(InvalidFormat, decoder.read_to_end(&mut buf))?;

        let (value, _) = util::from_cbor_bytes(&buf)?;
        Ok(value)
    }

    fn to_name(&self) -> String {
        format!("zstd/{}", self.level)
    }
}

#[cfg(test)]
#[path = "codec_test.rs"]
mod codec_test;
