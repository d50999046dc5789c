use arbitrary::Unstructured;
use cbordata::Cborize;
use rand::{prelude::random, rngs::SmallRng, Rng, SeedableRng};

use super::*;
use crate::{
    build::Builder,
    codec::{NoCompress, Zstd},
    config::Config,
};

#[derive(Clone, Debug, Eq, PartialEq, Cborize)]
struct Item {
    tag: String,
    seq: u64,
}

impl Item {
    const ID: &'static str = "testing/item/0.0.1";
}

#[test]
fn test_store() {
    use std::env;

    let seed: u64 = random();
    let mut rng = SmallRng::seed_from_u64(seed);
    println!("test_store {}", seed);

    let mut config: Config = {
        let bytes = rng.gen::<[u8; 32]>();
        let mut uns = Unstructured::new(&bytes);
        uns.arbitrary().unwrap()
    };
    config.name = "test-store".to_string();
    config.dir = env::temp_dir().into_os_string();
    config.batch_size = 10;
    config.key_width = 8;
    config.overwrite = true;

    let n: u64 = 100;
    let items: Vec<Item> = (0..n)
        .map(|i| Item {
            tag: "foo".to_string(),
            seq: i,
        })
        .collect();

    let stats = Builder::initial(config.clone())
        .unwrap()
        .build_from_iter(items.clone().into_iter(), NoCompress)
        .unwrap();
    assert_eq!(stats.n_count, n);

    let store = Store::<Item, NoCompress>::open(&config.dir, &config.name, NoCompress).unwrap();
    assert_eq!(store.len().unwrap() as u64, n);
    assert!(!store.is_empty().unwrap());
    assert_eq!(store.to_key_width().unwrap(), 8);
    assert_eq!(store.to_name(), "test-store".to_string());

    // random access, repeated access is idempotent.
    for _i in 0..1000 {
        let seq = rng.gen::<u64>() % n;
        let value = store.get(seq).unwrap();
        assert_eq!(value, items[seq as usize]);
        let value = store.get(seq).unwrap();
        assert_eq!(value, items[seq as usize]);
    }

    // out of range access.
    match store.get(n) {
        Err(Error::KeyNotFound(_, _)) => (),
        res => panic!("unexpected {:?}", res),
    }
    match store.get(u64::MAX) {
        Err(Error::KeyNotFound(_, _)) => (),
        res => panic!("unexpected {:?}", res),
    }

    // iterate in sequence order.
    let got: Vec<Item> = store.iter().unwrap().map(|v| v.unwrap()).collect();
    assert_eq!(got, items);

    let stats = store.validate().unwrap();
    assert_eq!(stats.n_count, n);
    assert_eq!(stats.codec, "nocompress".to_string());

    store.purge().unwrap();
    let loc = to_store_location(&config.dir, &config.name);
    assert_eq!(files::store_exists(&loc).unwrap(), false);
}

#[test]
fn test_store_concurrent() {
    use std::{env, thread};

    let seed: u64 = random();
    let mut rng = SmallRng::seed_from_u64(seed);
    println!("test_store_concurrent {}", seed);

    let mut config = Config::new(&env::temp_dir().into_os_string(), "test-store-concurrent");
    config.set_batch_size(100).set_overwrite(true);

    let n: u64 = 10_000;
    let items: Vec<Item> = (0..n)
        .map(|i| Item {
            tag: format!("item-{}", i),
            seq: i,
        })
        .collect();

    let stats = Builder::initial(config.clone())
        .unwrap()
        .build_from_iter(items.clone().into_iter(), Zstd::default())
        .unwrap();
    assert_eq!(stats.n_count, n);

    let store = Store::<Item, Zstd>::open(&config.dir, &config.name, Zstd::default()).unwrap();

    let n_threads = [1, 2, 4, 8][rng.gen::<usize>() % 4];
    let mut readers = vec![];
    for id in 0..n_threads {
        let store = store.clone();
        let items = items.clone();
        readers.push(thread::spawn(move || {
            reader(id, store, items, seed + (id as u64 * 100))
        }));
    }
    for handle in readers {
        handle.join().unwrap();
    }

    store.purge().unwrap();
}

fn reader(_id: usize, store: Store<Item, Zstd>, items: Vec<Item>, seed: u64) {
    let mut rng = SmallRng::seed_from_u64(seed);

    let n = items.len() as u64;
    for _i in 0..1000 {
        let seq = rng.gen::<u64>() % n;
        assert_eq!(store.get(seq).unwrap(), items[seq as usize], "seq {}", seq);
    }

    let m = store.iter().unwrap().map(|v| v.unwrap()).count();
    assert_eq!(m, items.len());

    store.close().unwrap();
}

#[test]
fn test_store_purge_locked() {
    use std::env;

    let mut config = Config::new(&env::temp_dir().into_os_string(), "test-store-purge-locked");
    config.set_overwrite(true);

    let items: Vec<Item> = (0..10)
        .map(|i| Item {
            tag: "p".to_string(),
            seq: i,
        })
        .collect();
    Builder::initial(config.clone())
        .unwrap()
        .build_from_iter(items.into_iter(), NoCompress)
        .unwrap();

    let store1 = Store::<Item, NoCompress>::open(&config.dir, &config.name, NoCompress).unwrap();
    let store2 = Store::<Item, NoCompress>::open(&config.dir, &config.name, NoCompress).unwrap();
    store1.get(0).unwrap();
    store2.get(0).unwrap();

    // store1 is still holding the store open.
    match store2.purge() {
        Err(Error::PurgeFile(_, _)) => (),
        res => panic!("unexpected {:?}", res),
    }

    // reads keep working on the surviving handle.
    assert_eq!(store1.get(5).unwrap().seq, 5);

    store1.purge().unwrap();
    let loc = to_store_location(&config.dir, &config.name);
    assert_eq!(files::store_exists(&loc).unwrap(), false);
}

#[test]
fn test_store_half_built() {
    use std::env;

    let mut config = Config::new(&env::temp_dir().into_os_string(), "test-store-half-built");
    config.set_overwrite(true);

    // builder dropped without ingesting anything.
    let builder = Builder::initial(config.clone()).unwrap();
    mem::drop(builder);

    let store = Store::<Item, NoCompress>::open(&config.dir, &config.name, NoCompress).unwrap();
    assert_eq!(store.len().unwrap(), 0);
    assert!(store.is_empty().unwrap());
    assert_eq!(store.to_key_width().unwrap(), KEY_WIDTH);

    match store.get(0) {
        Err(Error::KeyNotFound(_, _)) => (),
        res => panic!("unexpected {:?}", res),
    }
    match store.to_stats() {
        Err(Error::InvalidFile(_, _)) => (),
        res => panic!("unexpected {:?}", res),
    }
    match store.validate() {
        Err(Error::InvalidFile(_, _)) => (),
        res => panic!("unexpected {:?}", res),
    }

    store.purge().unwrap();
}

#[test]
fn test_store_missing() {
    use std::env;

    let dir = env::temp_dir().into_os_string();
    let res = Store::<Item, NoCompress>::open(&dir, "test-store-missing", NoCompress);
    match res {
        Err(Error::InvalidInput(_, _)) => (),
        Err(err) => panic!("unexpected {}", err),
        Ok(_) => panic!("expected missing store"),
    }
}

#[test]
fn test_store_clone() {
    use std::env;

    let mut config = Config::new(&env::temp_dir().into_os_string(), "test-store-clone");
    config.set_overwrite(true);

    let items: Vec<Item> = (0..100)
        .map(|i| Item {
            tag: "c".to_string(),
            seq: i,
        })
        .collect();
    Builder::initial(config.clone())
        .unwrap()
        .build_from_iter(items.clone().into_iter(), NoCompress)
        .unwrap();

    let store1 = Store::<Item, NoCompress>::open(&config.dir, &config.name, NoCompress).unwrap();
    let store2 = store1.clone();

    assert_eq!(store1.get(42).unwrap(), items[42]);
    assert_eq!(store2.get(42).unwrap(), items[42]);
    assert_eq!(store2.len().unwrap(), 100);

    // clones share one environment for the whole process.
    store1.close().unwrap();
    assert_eq!(store2.get(99).unwrap(), items[99]);

    store2.purge().unwrap();
}
