//! Module implement per-process handles to a store's lmdb environment.

use fs2::FileExt;

use std::{
    ffi, fs, mem, path, process,
    sync::{Arc, RwLock},
};

use crate::{files, util, Error, Result};

/// Slot holding the lmdb environment opened by this process, if any.
///
/// Environments and their file locks must not be shared across a
/// `fork()`. The slot is keyed by process-id, a slot inherited from a
/// parent process is abandoned and a fresh environment is opened for
/// the child. Abandoned, not dropped, closing the inherited state
/// would release a file lock still owned by the parent.
pub struct Handle {
    inner: RwLock<Option<Opened>>,
}

struct Opened {
    env: Arc<lmdb::Environment>,
    db: lmdb::Database,
    pid: u32,
    // shared advisory lock on the data file, held for as long as the
    // environment is open, purge waits on it.
    _lockfd: fs::File,
}

impl Handle {
    pub fn new() -> Handle {
        Handle {
            inner: RwLock::new(None),
        }
    }

    /// Return this process's environment for the store under `loc`,
    /// opening it on first access.
    pub fn to_reader(
        &self,
        loc: &ffi::OsStr,
    ) -> Result<(Arc<lmdb::Environment>, lmdb::Database)> {
        let pid = process::id();

        {
            let slot = err_at!(Fatal, self.inner.read())?;
            if let Some(opened) = slot.as_ref() {
                if opened.pid == pid {
                    return Ok((Arc::clone(&opened.env), opened.db));
                }
            }
        }

        let mut slot = err_at!(Fatal, self.inner.write())?;
        if let Some(opened) = slot.as_ref() {
            if opened.pid == pid {
                return Ok((Arc::clone(&opened.env), opened.db));
            }
        }
        if let Some(opened) = slot.take() {
            // inherited from the parent process, its environment and
            // file lock belong to the parent.
            mem::forget(opened);
        }

        let (env, db) = open_ro(loc)?;
        let _lockfd = lock_shared(loc)?;

        let opened = Opened {
            env: Arc::new(env),
            db,
            pid,
            _lockfd,
        };
        let pair = (Arc::clone(&opened.env), opened.db);
        *slot = Some(opened);

        Ok(pair)
    }
}

/// Open a writable environment under `loc` with `map_size` worth of
/// memory map, creating the store directory when missing.
pub fn open_rw(loc: &ffi::OsStr, map_size: usize) -> Result<(lmdb::Environment, lmdb::Database)> {
    let path = path::Path::new(loc);
    err_at!(IOError, fs::create_dir_all(path), "create store {:?}", loc)?;

    let mut flags = lmdb::EnvironmentFlags::empty();
    flags.insert(lmdb::EnvironmentFlags::NO_SYNC);
    flags.insert(lmdb::EnvironmentFlags::NO_META_SYNC);

    let env = err_at!(
        IOError,
        lmdb::Environment::new()
            .set_flags(flags)
            .set_map_size(map_size)
            .open(path),
        "open store {:?} map_size {}",
        loc,
        map_size
    )?;
    let db = err_at!(IOError, env.open_db(None))?;

    Ok((env, db))
}

/// Open the environment under `loc` for reading. Stores are immutable
/// once built, readers skip lmdb's lock table and read-ahead.
pub fn open_ro(loc: &ffi::OsStr) -> Result<(lmdb::Environment, lmdb::Database)> {
    if !files::store_exists(loc)? {
        return err_at!(InvalidInput, msg: "no store under {:?}", loc);
    }

    let mut flags = lmdb::EnvironmentFlags::empty();
    flags.insert(lmdb::EnvironmentFlags::READ_ONLY);
    flags.insert(lmdb::EnvironmentFlags::NO_TLS);
    flags.insert(lmdb::EnvironmentFlags::NO_LOCK);
    flags.insert(lmdb::EnvironmentFlags::NO_READAHEAD);
    flags.insert(lmdb::EnvironmentFlags::NO_MEM_INIT);

    let env = err_at!(
        IOError,
        lmdb::Environment::new()
            .set_flags(flags)
            .open(path::Path::new(loc)),
        "open store {:?}",
        loc
    )?;
    let db = err_at!(IOError, env.open_db(None))?;

    Ok((env, db))
}

fn lock_shared(loc: &ffi::OsStr) -> Result<fs::File> {
    let data_file = files::to_data_file(loc);
    let fd = util::open_file_r(&data_file)?;
    err_at!(IOError, fd.lock_shared(), "lock {:?}", data_file)?;
    Ok(fd)
}

#[cfg(test)]
#[path = "env_test.rs"]
mod env_test;
