//! Package implement a memory mapped sequence store, write once and
//! read from many processes.
//!
//! A store is built in one shot from a sequence of values using
//! [Builder], and subsequently read any number of times, from any
//! number of processes, using [Store]. Entries are keyed by their
//! position in the source sequence, `0..N-1`, encoded as fixed-width
//! big-endian bytes, so that the store's key order is the source
//! order and every position in `0..N-1` is addressable.
//!
//! Write once
//! ----------
//!
//! ```ignore
//! let mut config = roseq::Config::new(dir, "segments");
//! config.set_batch_size(10_000);
//! let builder = roseq::Builder::initial(config).unwrap();
//! let stats = builder.build_from_iter(values, roseq::Zstd::default()).unwrap();
//! assert_eq!(stats.n_count, 1000);
//! ```
//!
//! Values are serialized to CBOR, optionally compressed, and committed
//! in batches of `batch_size` entries. The store starts out with
//! `initial_capacity` worth of memory map and grows by `growth_factor`
//! every time ingestion runs out of it, applications don't have to
//! size the store up front.
//!
//! Read many
//! ---------
//!
//! ```ignore
//! let store = roseq::Store::<Value, _>::open(dir, "segments", roseq::Zstd::default()).unwrap();
//! let value = store.get(1022).unwrap();
//! ```
//!
//! Once built, a store is immutable. [Store] handles are lazy and
//! cheap, opening one does not touch the memory map. Each process
//! opens the underlying environment on first access and keeps it for
//! the life of the process, a handle carried across `fork()` into a
//! child process shall transparently re-open its own environment.
//! Concurrent readers, threads or processes, don't block each other.

use std::{error, fmt, result};

/// Short form to compose Error values.
///
/// Here are few possible ways:
///
/// ```ignore
/// use roseq::Error;
/// err_at!(KeyNotFound, msg: "bad key")
/// ```
///
/// ```ignore
/// use roseq::Error;
/// err_at!(IOError, std::fs::read(file_path))
/// ```
///
/// ```ignore
/// use roseq::Error;
/// err_at!(IOError, std::fs::read(file_path), "reading {:?}", file_path)
/// ```
#[macro_export]
macro_rules! err_at {
    ($v:ident, msg: $($arg:expr),+) => {{
        let prefix = format!("{}:{}", file!(), line!());
        Err(Error::$v(prefix, format!($($arg),+)))
    }};
    ($v:ident, $e:expr) => {{
        match $e {
            Ok(val) => Ok(val),
            Err(err) => {
                let prefix = format!("{}:{}", file!(), line!());
                Err(Error::$v(prefix, format!("{}", err)))
            }
        }
    }};
    ($v:ident, $e:expr, $($arg:expr),+) => {{
        match $e {
            Ok(val) => Ok(val),
            Err(err) => {
                let prefix = format!("{}:{}", file!(), line!());
                let msg = format!($($arg),+);
                Err(Error::$v(prefix, format!("{} {}", err, msg)))
            }
        }
    }};
}

mod build;
mod codec;
mod config;
mod env;
mod files;
mod key;
mod store;
mod util;

pub use crate::build::Builder;
pub use crate::codec::{Codec, NoCompress, Zstd};
pub use crate::config::{to_store_location, Config, Stats};
pub use crate::config::{BATCH_SIZE, GROWTH_FACTOR, INITIAL_CAPACITY, KEY_WIDTH};
pub use crate::files::{purge_store, store_exists, StoreDirName};
pub use crate::key::{decode_key, encode_key, MAX_KEY_WIDTH};
pub use crate::store::{Iter, Store};

/// Error variants that are returned by this package's API.
///
/// Each variant carries a prefix, typically identifying the
/// error location.
pub enum Error {
    /// Internal invariant broken, will need a code-fix.
    Fatal(String, String),
    /// Numeric conversion failed.
    FailConvert(String, String),
    /// Value failed to serialize to CBOR, or stored bytes failed to
    /// deserialize from CBOR.
    FailCbor(String, String),
    /// Stored bytes are not a valid compressed payload.
    InvalidFormat(String, String),
    /// Bad input from the caller, key width violation, store location
    /// is not a directory, no store under the location, and so on.
    InvalidInput(String, String),
    /// Store's on-disk structure is invalid, like missing statistics
    /// record for a half built store.
    InvalidFile(String, String),
    /// Error from the file-system or from the underlying lmdb
    /// environment.
    IOError(String, String),
    /// Requested sequence number is not present in the store.
    KeyNotFound(String, String),
    /// Ingestion target already holds a store and overwrite is false.
    StoreExists(String, String),
    /// Store is locked by one or more read handles and cannot be
    /// purged.
    PurgeFile(String, String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        use Error::*;

        match self {
            Fatal(p, msg) => write!(f, "{} Fatal: {}", p, msg),
            FailConvert(p, msg) => write!(f, "{} FailConvert: {}", p, msg),
            FailCbor(p, msg) => write!(f, "{} FailCbor: {}", p, msg),
            InvalidFormat(p, msg) => write!(f, "{} InvalidFormat: {}", p, msg),
            InvalidInput(p, msg) => write!(f, "{} InvalidInput: {}", p, msg),
            InvalidFile(p, msg) => write!(f, "{} InvalidFile: {}", p, msg),
            IOError(p, msg) => write!(f, "{} IOError: {}", p, msg),
            KeyNotFound(p, msg) => write!(f, "{} KeyNotFound: {}", p, msg),
            StoreExists(p, msg) => write!(f, "{} StoreExists: {}", p, msg),
            PurgeFile(p, msg) => write!(f, "{} PurgeFile: {}", p, msg),
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        write!(f, "{}", self)
    }
}

impl error::Error for Error {}

/// Type alias for Result return type, used by this package.
pub type Result<T> = result::Result<T, Error>;
