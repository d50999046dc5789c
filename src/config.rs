use cbordata::Cborize;

use std::{ffi, path};

use crate::files::StoreDirName;

/// Default number of entries committed per batch, 1024 entries.
pub const BATCH_SIZE: usize = 1024;

/// Default capacity, in bytes, for a fresh store, 10 * 1024 * 1024 bytes.
pub const INITIAL_CAPACITY: usize = 10 * 1024 * 1024;

/// Default growth factor. Declared capacity is multiplied by this value
/// every time ingestion runs out of it.
pub const GROWTH_FACTOR: usize = 2;

/// Default key width, 8 bytes, wide enough for the full u64 range of
/// sequence numbers.
pub const KEY_WIDTH: usize = 8;

const STATS_VER: u32 = 0x00010001;

/// Compose a path to store directory identified by unique `name` under `dir`.
pub fn to_store_location(dir: &ffi::OsStr, name: &str) -> ffi::OsString {
    let loc: path::PathBuf = [
        dir.to_os_string(),
        StoreDirName::from(name.to_string()).into(),
    ]
    .iter()
    .collect();
    loc.into_os_string()
}

/// Configuration for building a sequence store.
///
/// Configuration type is used only for building a store. Subsequently,
/// configuration parameters are persisted along with the store.
#[derive(Clone, Debug)]
pub struct Config {
    /// Location path under which the store directory is created.
    pub dir: ffi::OsString,
    /// Name of the store.
    pub name: String,
    /// Number of entries committed per batch.
    ///
    /// Default: [BATCH_SIZE]
    pub batch_size: usize,
    /// Capacity, in bytes, the store starts out with.
    ///
    /// Default: [INITIAL_CAPACITY]
    pub initial_capacity: usize,
    /// Multiplier applied to capacity every time ingestion runs out of
    /// it, must be 2 or more.
    ///
    /// Default: [GROWTH_FACTOR]
    pub growth_factor: usize,
    /// Width, in bytes, for entry keys, between 1 and 8. Keys of width
    /// `w` can hold sequence numbers up to `(1 << (w * 8)) - 1`.
    ///
    /// Default: [KEY_WIDTH]
    pub key_width: usize,
    /// Replace any existing store under the same location. When false,
    /// building over an existing store fails.
    ///
    /// Default: false
    pub overwrite: bool,
}

impl<'a> arbitrary::Arbitrary<'a> for Config {
    fn arbitrary(u: &mut arbitrary::Unstructured) -> arbitrary::Result<Self> {
        use std::env;

        let name: String = u.arbitrary()?;
        let dir = env::temp_dir().into_os_string();

        let batch_size = *u.choose(&[1, 10, 100, 1000, 10_000])?;
        let initial_capacity = *u.choose(&[1 << 15, 1 << 20, 1 << 24])?;
        let growth_factor = *u.choose(&[2, 4, 8])?;
        let key_width = *u.choose(&[1, 2, 4, 8])?;
        let overwrite: bool = u.arbitrary()?;

        let config = Config {
            dir,
            name,
            batch_size,
            initial_capacity,
            growth_factor,
            key_width,
            overwrite,
        };
        Ok(config)
    }
}

impl Config {
    /// Create a new configuration value, use the `set_*` methods to add more
    /// configuration.
    pub fn new(dir: &ffi::OsStr, name: &str) -> Config {
        Config {
            dir: dir.to_os_string(),
            name: name.to_string(),
            batch_size: BATCH_SIZE,
            initial_capacity: INITIAL_CAPACITY,
            growth_factor: GROWTH_FACTOR,
            key_width: KEY_WIDTH,
            overwrite: false,
        }
    }

    /// Configure the number of entries committed per batch.
    pub fn set_batch_size(&mut self, batch_size: usize) -> &mut Self {
        self.batch_size = batch_size;
        self
    }

    /// Configure capacity, in bytes, the store starts out with. Stores
    /// grow on demand, this only sizes the initial memory map.
    pub fn set_initial_capacity(&mut self, capacity: usize) -> &mut Self {
        self.initial_capacity = capacity;
        self
    }

    /// Configure the multiplier applied to capacity every time ingestion
    /// runs out of it.
    pub fn set_growth_factor(&mut self, factor: usize) -> &mut Self {
        self.growth_factor = factor;
        self
    }

    /// Configure width, in bytes, for entry keys. Narrow keys save space
    /// but cap the number of entries a store can hold.
    pub fn set_key_width(&mut self, width: usize) -> &mut Self {
        self.key_width = width;
        self
    }

    /// Replace any existing store under the same location.
    pub fn set_overwrite(&mut self, overwrite: bool) -> &mut Self {
        self.overwrite = overwrite;
        self
    }
}

impl Config {
    pub fn to_store_location(&self) -> ffi::OsString {
        to_store_location(&self.dir, &self.name)
    }
}

/// Statistics for a sequence store.
///
/// Persisted along with the entries when the build completes, under a
/// reserved key that sorts after every entry key.
#[derive(Clone, Default, Debug, Cborize)]
pub struct Stats {
    /// Comes from [Config] type.
    pub name: String,
    /// Comes from [Config] type.
    pub batch_size: usize,
    /// Comes from [Config] type.
    pub key_width: usize,

    /// Name of the codec values were encoded with.
    pub codec: String,

    /// Number of entries in the store.
    pub n_count: u64,
    /// Total size, in bytes, of encoded values.
    pub n_bytes: u64,
    /// Capacity, in bytes, the store ended up with after growth.
    pub map_size: u64,

    /// Time taken to build this store, in nanos.
    pub build_time: u64,
    /// Timestamp when this store was built, from UNIX EPOCH, in nanos,
    /// in UTC timezone.
    pub epoch: u64,
}

impl Stats {
    const ID: u32 = STATS_VER;
}

impl From<Config> for Stats {
    fn from(config: Config) -> Stats {
        Stats {
            // comes from Config type
            name: config.name.clone(),
            batch_size: config.batch_size,
            key_width: config.key_width,
            // comes from store build
            codec: String::default(),
            n_count: u64::default(),
            n_bytes: u64::default(),
            map_size: u64::default(),
            build_time: u64::default(),
            epoch: u64::default(),
        }
    }
}
