//! Module implement building a sequence store from an iterator.

use lmdb::Transaction;

use std::{convert::TryFrom, mem, result, time};

use crate::{
    codec::Codec,
    config::{Config, Stats},
    env, files, key, util, Error, Result,
};

/// Build a fresh store from a sequence of values.
///
/// Builder is a one-shot type, values are ingested exactly once via
/// [Builder::build_from_iter] or [Builder::build_index] and the store
/// is immutable from there on. Entries are committed in batches, each
/// batch commit is atomic, a build failing mid-way leaves behind only
/// fully committed batches.
pub struct Builder {
    config: Config,
    env: lmdb::Environment,
    db: lmdb::Database,
    map_size: usize,
}

impl Builder {
    /// Create a builder for a fresh store under `config.dir`, named
    /// `config.name`. Fail with [Error::StoreExists] if a store is
    /// already present under the same location, unless
    /// [Config::overwrite] is set.
    pub fn initial(config: Config) -> Result<Builder> {
        if config.key_width == 0 || config.key_width > key::MAX_KEY_WIDTH {
            return err_at!(
                InvalidInput,
                msg: "key_width {} not within 1..={}", config.key_width, key::MAX_KEY_WIDTH
            );
        }
        if config.batch_size == 0 {
            return err_at!(InvalidInput, msg: "batch_size cannot be zero");
        }
        if config.growth_factor < 2 {
            return err_at!(
                InvalidInput,
                msg: "growth_factor {} must be 2 or more", config.growth_factor
            );
        }

        let loc = config.to_store_location();
        if files::store_exists(&loc)? {
            if config.overwrite {
                files::purge_store(&loc)?;
            } else {
                return err_at!(StoreExists, msg: "store {:?}", loc);
            }
        }

        let map_size = config.initial_capacity;
        let (env, db) = env::open_rw(&loc, map_size)?;

        let val = Builder {
            config,
            env,
            db,
            map_size,
        };

        Ok(val)
    }

    /// Ingest an infallible sequence of values. Convenience wrapper
    /// around [Builder::build_index].
    pub fn build_from_iter<V, C, I>(self, iter: I, codec: C) -> Result<Stats>
    where
        C: Codec<V>,
        I: IntoIterator<Item = V>,
    {
        self.build_index(iter.into_iter().map(Ok), codec)
    }

    /// Ingest `iter` into the store, encoding values with `codec`.
    ///
    /// Entries are keyed by their position in the iterator, starting
    /// from zero, and committed in batches of [Config::batch_size]
    /// entries. Whenever ingestion runs out of capacity the store is
    /// re-opened [Config::growth_factor] times bigger and the batch is
    /// retried. An `Err` item from `iter` aborts the build, already
    /// committed batches are left behind on disk without statistics.
    /// Returns statistics for the build, the same statistics are
    /// persisted into the store and can be fetched back via
    /// [Store::to_stats].
    ///
    /// [Store::to_stats]: crate::Store::to_stats
    pub fn build_index<V, C, I>(self, iter: I, codec: C) -> Result<Stats>
    where
        C: Codec<V>,
        I: Iterator<Item = Result<V>>,
    {
        let Builder {
            config,
            env,
            db,
            mut map_size,
        } = self;

        let start = time::SystemTime::now();

        let mut stats = Stats::from(config.clone());
        stats.codec = codec.to_name();

        let (mut env, mut db) = (env, db);
        let mut batch: Vec<(Vec<u8>, Vec<u8>)> = Vec::with_capacity(config.batch_size);
        let (mut seq, mut n_bytes) = (0_u64, 0_usize);

        for value in iter {
            let data = codec.encode(value?)?;
            n_bytes += data.len();
            batch.push((key::encode_key(seq, config.key_width)?, data));
            seq += 1;

            if batch.len() >= config.batch_size {
                let (e, d) = commit_batch(&config, env, db, &mut map_size, &batch)?;
                env = e;
                db = d;
                batch.clear();
            }
        }
        if !batch.is_empty() {
            let (e, d) = commit_batch(&config, env, db, &mut map_size, &batch)?;
            env = e;
            db = d;
            batch.clear();
        }

        stats.n_count = seq;
        stats.n_bytes = err_at!(FailConvert, u64::try_from(n_bytes))?;
        stats.map_size = err_at!(FailConvert, u64::try_from(map_size))?;
        stats.build_time = {
            let elapsed = err_at!(Fatal, start.elapsed())?;
            err_at!(FailConvert, u64::try_from(elapsed.as_nanos()))?
        };
        stats.epoch = {
            let elapsed = err_at!(Fatal, time::UNIX_EPOCH.elapsed())?;
            err_at!(FailConvert, u64::try_from(elapsed.as_nanos()))?
        };

        // statistics go under the reserved key, past every entry key.
        let meta = vec![(key::meta_key(), util::into_cbor_bytes(stats.clone())?)];
        let (env, _db) = commit_batch(&config, env, db, &mut map_size, &meta)?;

        err_at!(IOError, env.sync(true))?;

        Ok(stats)
    }
}

// commit one batch of entries, growing the store as many times as it
// takes for the batch to fit.
fn commit_batch(
    config: &Config,
    env: lmdb::Environment,
    db: lmdb::Database,
    map_size: &mut usize,
    batch: &[(Vec<u8>, Vec<u8>)],
) -> Result<(lmdb::Environment, lmdb::Database)> {
    let (mut env, mut db) = (env, db);

    loop {
        match put_batch(&env, db, batch) {
            Ok(()) => break Ok((env, db)),
            Err(lmdb::Error::MapFull) => {
                *map_size = map_size.saturating_mul(config.growth_factor);

                #[cfg(feature = "debug")]
                println!(">>> grow store {} map_size to {}", config.name, map_size);

                // the environment must be closed before re-mapping it bigger.
                mem::drop(env);
                let (e, d) = env::open_rw(&config.to_store_location(), *map_size)?;
                env = e;
                db = d;
            }
            Err(err) => break err_at!(IOError, Err(err), "commit batch"),
        }
    }
}

fn put_batch(
    env: &lmdb::Environment,
    db: lmdb::Database,
    batch: &[(Vec<u8>, Vec<u8>)],
) -> result::Result<(), lmdb::Error> {
    let mut txn = env.begin_rw_txn()?;
    for (key, value) in batch.iter() {
        txn.put(db, key, value, lmdb::WriteFlags::APPEND)?;
    }
    txn.commit()
}

#[cfg(test)]
#[path = "build_test.rs"]
mod build_test;
