//! Module implement read access to a sequence store.

use lmdb::{Cursor, Transaction};

use std::{
    convert::TryFrom,
    ffi, marker, mem,
    sync::{Arc, RwLock},
};

use crate::{
    codec::Codec,
    config::{to_store_location, Stats, KEY_WIDTH},
    env, files, key, util, Error, Result,
};

/// Handle for reading a sequence store, immutable, durable and memory
/// mapped.
///
/// Handles are lazy, opening one does not touch the memory map, the
/// underlying environment is opened on first access and shared by
/// every clone of the handle within the process. Handles are cheap to
/// clone and safe to share across threads. A handle carried across
/// `fork()` into a child process shall transparently open the child's
/// own environment, the parent's environment is never shared.
pub struct Store<V, C>
where
    C: Codec<V>,
{
    dir: ffi::OsString,
    name: String,
    codec: C,

    handle: Arc<env::Handle>,
    key_width: Arc<RwLock<Option<usize>>>,

    _val: marker::PhantomData<V>,
}

impl<V, C> Clone for Store<V, C>
where
    C: Codec<V>,
{
    fn clone(&self) -> Store<V, C> {
        Store {
            dir: self.dir.clone(),
            name: self.name.clone(),
            codec: self.codec.clone(),

            handle: Arc::clone(&self.handle),
            key_width: Arc::clone(&self.key_width),

            _val: marker::PhantomData,
        }
    }
}

impl<V, C> Store<V, C>
where
    C: Codec<V>,
{
    /// Open the store named `name` under `dir` for reading. Values
    /// shall be decoded with `codec`, which must match the codec the
    /// store was built with.
    pub fn open(dir: &ffi::OsStr, name: &str, codec: C) -> Result<Store<V, C>> {
        let loc = to_store_location(dir, name);
        if !files::store_exists(&loc)? {
            return err_at!(InvalidInput, msg: "no store under {:?}", loc);
        }

        let val = Store {
            dir: dir.to_os_string(),
            name: name.to_string(),
            codec,

            handle: Arc::new(env::Handle::new()),
            key_width: Arc::new(RwLock::new(None)),

            _val: marker::PhantomData,
        };

        Ok(val)
    }

    /// Close this handle. Other handles to the store, in this or any
    /// other process, are unaffected.
    pub fn close(self) -> Result<()> {
        Ok(())
    }

    /// Close this handle and delete the store from disk. Fail with
    /// [Error::PurgeFile] while any other handle, from any process, is
    /// holding the store open.
    pub fn purge(self) -> Result<()> {
        let loc = self.to_store_location();
        mem::drop(self);
        files::purge_store(&loc)
    }
}

impl<V, C> Store<V, C>
where
    C: Codec<V>,
{
    /// Get the value at position `seq`, positions are `0..len()`.
    pub fn get(&self, seq: u64) -> Result<V> {
        let loc = self.to_store_location();
        let (env, db) = self.handle.to_reader(&loc)?;
        let width = self.to_key_width()?;

        let key = match key::encode_key(seq, width) {
            Ok(key) => key,
            Err(_) => return err_at!(KeyNotFound, msg: "seq {} beyond key width {}", seq, width),
        };

        let txn = err_at!(IOError, env.begin_ro_txn())?;
        match txn.get(db, &key) {
            Ok(data) => self.codec.decode(data),
            Err(lmdb::Error::NotFound) => {
                err_at!(KeyNotFound, msg: "store {:?} seq {}", loc, seq)
            }
            Err(err) => err_at!(IOError, Err(err), "get seq {}", seq),
        }
    }

    /// Number of entries in the store.
    pub fn len(&self) -> Result<usize> {
        let loc = self.to_store_location();
        let (env, db) = self.handle.to_reader(&loc)?;

        let txn = err_at!(IOError, env.begin_ro_txn())?;
        let n_count = match txn.get(db, &key::meta_key()) {
            Ok(data) => {
                let (stats, _) = util::from_cbor_bytes::<Stats>(data)?;
                err_at!(FailConvert, usize::try_from(stats.n_count))?
            }
            // half-built store, count entries directly.
            Err(lmdb::Error::NotFound) => err_at!(IOError, env.stat())?.entries(),
            Err(err) => err_at!(IOError, Err(err), "read statistics")?,
        };

        Ok(n_count)
    }

    /// Return whether the store holds no entries.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Iterate over store entries, in sequence order.
    pub fn iter(&self) -> Result<Iter<V, C>> {
        let len = err_at!(FailConvert, u64::try_from(self.len()?))?;

        let val = Iter {
            store: self,
            seq: 0,
            len,
        };

        Ok(val)
    }

    /// Fetch the statistics persisted when this store was built. Fail
    /// with [Error::InvalidFile] for a half-built store.
    pub fn to_stats(&self) -> Result<Stats> {
        let loc = self.to_store_location();
        let (env, db) = self.handle.to_reader(&loc)?;

        let txn = err_at!(IOError, env.begin_ro_txn())?;
        match txn.get(db, &key::meta_key()) {
            Ok(data) => Ok(util::from_cbor_bytes::<Stats>(data)?.0),
            Err(lmdb::Error::NotFound) => {
                err_at!(InvalidFile, msg: "store {:?} missing statistics", loc)
            }
            Err(err) => err_at!(IOError, Err(err), "read statistics"),
        }
    }

    /// Key width, in bytes, this store was built with.
    pub fn to_key_width(&self) -> Result<usize> {
        {
            let cached = err_at!(Fatal, self.key_width.read())?;
            if let Some(width) = cached.as_ref() {
                return Ok(*width);
            }
        }

        let width = self.lookup_key_width()?;
        let mut cached = err_at!(Fatal, self.key_width.write())?;
        *cached = Some(width);

        Ok(width)
    }

    /// Return name of this store.
    pub fn to_name(&self) -> String {
        self.name.clone()
    }

    /// Return location of this store's directory.
    pub fn to_store_location(&self) -> ffi::OsString {
        to_store_location(&self.dir, &self.name)
    }

    /// Return the codec this handle decodes values with.
    pub fn as_codec(&self) -> &C {
        &self.codec
    }

    fn lookup_key_width(&self) -> Result<usize> {
        let loc = self.to_store_location();
        let (env, db) = self.handle.to_reader(&loc)?;

        let txn = err_at!(IOError, env.begin_ro_txn())?;
        match txn.get(db, &key::meta_key()) {
            Ok(data) => {
                let (stats, _) = util::from_cbor_bytes::<Stats>(data)?;
                Ok(stats.key_width)
            }
            // half-built store, probe the first entry for its width.
            Err(lmdb::Error::NotFound) => {
                let mut cursor = err_at!(IOError, txn.open_ro_cursor(db))?;
                match cursor.iter().next() {
                    Some((entry_key, _)) => Ok(entry_key.len()),
                    None => Ok(KEY_WIDTH),
                }
            }
            Err(err) => err_at!(IOError, Err(err), "read statistics"),
        }
    }
}

impl<V, C> Store<V, C>
where
    C: Codec<V>,
{
    /// Validate the store. Walk every entry checking that keys decode
    /// to their position, values decode with this handle's codec, and
    /// entry count and byte count agree with the persisted statistics.
    pub fn validate(&self) -> Result<Stats> {
        let stats = self.to_stats()?;

        let loc = self.to_store_location();
        let (env, db) = self.handle.to_reader(&loc)?;

        let txn = err_at!(IOError, env.begin_ro_txn())?;
        let mut cursor = err_at!(IOError, txn.open_ro_cursor(db))?;

        let meta_key = key::meta_key();
        let (mut n_count, mut n_bytes) = (0_u64, 0_u64);
        for (entry_key, data) in cursor.iter() {
            if entry_key == meta_key.as_slice() {
                continue;
            }

            let seq = key::decode_key(entry_key, stats.key_width)?;
            if seq != n_count {
                return err_at!(
                    InvalidFile,
                    msg: "store {:?} seq {} at position {}", loc, seq, n_count
                );
            }
            self.codec.decode(data)?;

            n_bytes += err_at!(FailConvert, u64::try_from(data.len()))?;
            n_count += 1;
        }

        if n_count != stats.n_count {
            return err_at!(
                InvalidFile,
                msg: "store {:?} holds {} entries, expected {}", loc, n_count, stats.n_count
            );
        }
        if n_bytes != stats.n_bytes {
            return err_at!(
                InvalidFile,
                msg: "store {:?} holds {} bytes, expected {}", loc, n_bytes, stats.n_bytes
            );
        }

        Ok(stats)
    }

    /// Display store parameters and statistics on stdout.
    pub fn print(&self) -> Result<()> {
        let stats = self.to_stats()?;

        println!("name         : {}", self.name);
        println!("location     : {:?}", self.to_store_location());
        println!("codec        : {}", stats.codec);
        println!("batch_size   : {}", stats.batch_size);
        println!("key_width    : {}", stats.key_width);
        println!("n_count      : {}", stats.n_count);
        println!("n_bytes      : {}", stats.n_bytes);
        println!("map_size     : {}", stats.map_size);
        println!("build_time   : {}", stats.build_time);
        println!("epoch        : {}", stats.epoch);

        Ok(())
    }
}

/// Iterator type, to iterate over store entries in sequence order.
pub struct Iter<'a, V, C>
where
    C: Codec<V>,
{
    store: &'a Store<V, C>,
    seq: u64,
    len: u64,
}

impl<'a, V, C> Iterator for Iter<'a, V, C>
where
    C: Codec<V>,
{
    type Item = Result<V>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.seq >= self.len {
            return None;
        }

        let item = self.store.get(self.seq);
        self.seq += 1;

        Some(item)
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;
