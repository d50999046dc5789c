//! Module implement on-disk file layout for a store.
//!
//! A store named `<name>`, configured under directory `<dir>`, lives in
//! the directory `<dir>/<name>-roseq/` and is made up of lmdb's data
//! and lock files.

use fs2::FileExt;

use std::{convert::TryFrom, ffi, fmt, fs, path, result};

use crate::{util, Error, Result};

/// Name of the file holding store's entries, under the store directory.
pub const DATA_FILE: &str = "data.mdb";

/// Name of the file used by lmdb to co-ordinate its readers, under the
/// store directory.
pub const LOCK_FILE: &str = "lock.mdb";

/// Directory name format for a store, `<name>-roseq`.
#[derive(Clone)]
pub struct StoreDirName(pub ffi::OsString);

impl From<String> for StoreDirName {
    fn from(name: String) -> StoreDirName {
        let dir_name = format!("{}-roseq", name);
        let dir_name: &ffi::OsStr = dir_name.as_ref();
        StoreDirName(dir_name.to_os_string())
    }
}

impl TryFrom<StoreDirName> for String {
    type Error = Error;

    fn try_from(val: StoreDirName) -> Result<String> {
        match val.0.to_str().and_then(|x| x.strip_suffix("-roseq")) {
            Some(name) if !name.is_empty() => Ok(name.to_string()),
            _ => err_at!(InvalidFile, msg: "not a store directory {:?}", val.0),
        }
    }
}

impl From<StoreDirName> for ffi::OsString {
    fn from(val: StoreDirName) -> ffi::OsString {
        val.0
    }
}

impl fmt::Display for StoreDirName {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        match self.0.to_str() {
            Some(s) => write!(f, "{}", s),
            None => write!(f, "{:?}", self.0),
        }
    }
}

/// Full path to the lmdb data file under store location `loc`.
pub fn to_data_file(loc: &ffi::OsStr) -> ffi::OsString {
    let file_path: path::PathBuf = [loc.to_os_string(), DATA_FILE.into()].iter().collect();
    file_path.into_os_string()
}

/// Return whether a store exists under location `loc`. A store is
/// deemed present when `loc` is a directory holding lmdb's data and
/// lock files.
pub fn store_exists(loc: &ffi::OsStr) -> Result<bool> {
    let path = path::Path::new(loc);

    if !path.exists() {
        return Ok(false);
    }
    if !path.is_dir() {
        return err_at!(InvalidInput, msg: "location {:?} not a directory", loc);
    }

    Ok(path.join(DATA_FILE).is_file() && path.join(LOCK_FILE).is_file())
}

/// Purge the store under location `loc`, shall fail with
/// [Error::PurgeFile] while any read handle, from any process, is
/// holding the store open.
pub fn purge_store(loc: &ffi::OsStr) -> Result<()> {
    if !store_exists(loc)? {
        return err_at!(InvalidInput, msg: "no store under {:?}", loc);
    }

    let data_file = to_data_file(loc);
    let fd = util::open_file_r(&data_file)?;
    match fd.try_lock_exclusive() {
        Ok(_) => {
            err_at!(IOError, fs::remove_dir_all(loc), "remove store {:?}", loc)?;
            err_at!(
                PurgeFile,
                fd.unlock(),
                "fail unlock for exclusive lock {:?}",
                data_file
            )
        }
        Err(_) => err_at!(PurgeFile, msg: "store {:?} locked", loc),
    }
}

#[cfg(test)]
#[path = "files_test.rs"]
mod files_test;
