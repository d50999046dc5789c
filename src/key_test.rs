use rand::{prelude::random, rngs::SmallRng, Rng, SeedableRng};

use super::*;

#[test]
fn test_encode_key() {
    let seed: u64 = random();
    println!("test_encode_key seed:{}", seed);
    let mut rng = SmallRng::seed_from_u64(seed);

    for width in 1..=MAX_KEY_WIDTH {
        let key = encode_key(0, width).unwrap();
        assert_eq!(key.len(), width);
        assert_eq!(decode_key(&key, width).unwrap(), 0);

        let max_seq = match width {
            8 => u64::MAX,
            w => (1 << (w * 8)) - 1,
        };
        let key = encode_key(max_seq, width).unwrap();
        assert_eq!(key.len(), width);
        assert_eq!(decode_key(&key, width).unwrap(), max_seq);

        for _i in 0..1000 {
            let seq: u64 = rng.gen::<u64>() & max_seq;
            let key = encode_key(seq, width).unwrap();
            assert_eq!(key.len(), width, "width {} seq {}", width, seq);
            assert_eq!(decode_key(&key, width).unwrap(), seq, "width {}", width);
        }
    }
}

#[test]
fn test_key_order() {
    let seed: u64 = random();
    println!("test_key_order seed:{}", seed);
    let mut rng = SmallRng::seed_from_u64(seed);

    for width in 1..=MAX_KEY_WIDTH {
        let max_seq = match width {
            8 => u64::MAX,
            w => (1 << (w * 8)) - 1,
        };
        let mut seqs: Vec<u64> = (0..1000).map(|_| rng.gen::<u64>() & max_seq).collect();
        seqs.sort_unstable();

        let keys: Vec<Vec<u8>> = seqs
            .iter()
            .map(|seq| encode_key(*seq, width).unwrap())
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted, "width {}", width);
    }
}

#[test]
fn test_key_limits() {
    assert!(encode_key(0, 0).is_err());
    assert!(encode_key(0, MAX_KEY_WIDTH + 1).is_err());
    assert!(decode_key(&[0_u8; 4], 0).is_err());
    assert!(decode_key(&[0_u8; 9], MAX_KEY_WIDTH + 1).is_err());

    // overflowing sequence numbers for every narrow width.
    for width in 1..MAX_KEY_WIDTH {
        let seq = 1_u64 << (width * 8);
        assert!(encode_key(seq, width).is_err(), "width {}", width);
        assert!(encode_key(seq - 1, width).is_ok(), "width {}", width);
    }
    assert!(encode_key(u64::MAX, MAX_KEY_WIDTH).is_ok());

    // width mismatch between key and caller.
    assert!(decode_key(&[0_u8; 4], 5).is_err());
    assert!(decode_key(&[0_u8; 5], 4).is_err());
}

#[test]
fn test_meta_key() {
    let meta_key = meta_key();
    assert_eq!(meta_key.len(), MAX_KEY_WIDTH + 1);

    // the meta key must sort after every possible entry key.
    for width in 1..=MAX_KEY_WIDTH {
        let max_seq = match width {
            8 => u64::MAX,
            w => (1 << (w * 8)) - 1,
        };
        let key = encode_key(max_seq, width).unwrap();
        assert!(key.as_slice() < meta_key.as_slice(), "width {}", width);
    }
}
