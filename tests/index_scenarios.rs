//! End-to-end scenarios against the public index API.

use rand::{rngs::StdRng, Rng, SeedableRng};
use simbucket::{BitVector, IndexError, Indexer, IndexerOptions, ItemId};
use std::collections::{BTreeMap, HashSet};

fn random_unit_vector(rng: &mut StdRng, dimensions: usize) -> Vec<f32> {
    let v: Vec<f32> = (0..dimensions).map(|_| rng.random_range(-1.0..1.0)).collect();
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    v.into_iter().map(|x| x / norm).collect()
}

#[test]
fn one_bucket_spills_onto_a_second_page() -> Result<(), IndexError> {
    let mut idx = Indexer::with_params(1234, 4, 32)?;
    let mut rng = StdRng::seed_from_u64(1);
    let v = random_unit_vector(&mut rng, 32);
    for id in 0..1025 {
        idx.add(id, &v)?;
    }

    let report = idx.dump();
    assert_eq!(report.buckets.len(), 1);
    assert_eq!(report.buckets[0].pages.len(), 2);
    assert_eq!(report.buckets[0].items, 1025);
    assert_eq!(report.total_items, 1025);
    assert_eq!(report.stddev, 0.0);
    Ok(())
}

#[test]
fn dump_counts_match_inserts_per_bucket() -> Result<(), IndexError> {
    let mut idx = Indexer::with_params(77, 3, 8)?;
    let mut rng = StdRng::seed_from_u64(2);
    let mut expected: BTreeMap<u32, usize> = BTreeMap::new();
    for id in 0..5000 {
        let v = random_unit_vector(&mut rng, 8);
        *expected.entry(idx.bit_vector(&v).to_u32()).or_default() += 1;
        idx.add(id, &v)?;
    }

    let report = idx.dump();
    let reported: BTreeMap<u32, usize> = report.buckets.iter().map(|b| (b.key, b.items)).collect();
    assert_eq!(reported, expected);
    assert_eq!(report.total_items, 5000);
    assert_eq!(idx.len(), 5000);
    // Every bucket with more than one page's worth of items has spilled.
    for bucket in &report.buckets {
        assert_eq!(bucket.pages.len(), bucket.items.div_ceil(1023));
        assert_eq!(bucket.bits.len(), 3);
    }
    Ok(())
}

#[test]
fn search_meets_the_limit_with_whole_tiers() -> Result<(), IndexError> {
    let mut idx = Indexer::with_params(5, 8, 16)?;
    let mut rng = StdRng::seed_from_u64(3);
    let vectors: Vec<Vec<f32>> = (0..2000).map(|_| random_unit_vector(&mut rng, 16)).collect();
    for (id, v) in vectors.iter().enumerate() {
        idx.add(id as ItemId, v)?;
    }
    let codes: Vec<BitVector> = vectors.iter().map(|v| idx.bit_vector(v)).collect();

    for limit in [1, 10, 100, 1999, 2000, 5000] {
        let query = random_unit_vector(&mut rng, 16);
        let query_code = idx.bit_vector(&query);
        let results = idx.search(&query, limit);

        assert!(results.len() >= limit.min(2000));
        let returned: HashSet<ItemId> = results.iter().copied().collect();
        assert_eq!(returned.len(), results.len());

        // Distances are non-decreasing along the result.
        let distances: Vec<u32> = results
            .iter()
            .map(|id| query_code.hamming(&codes[*id as usize]))
            .collect();
        assert!(distances.windows(2).all(|w| w[0] <= w[1]));

        // Every item at or below the furthest returned distance is included.
        let furthest = distances.last().copied().unwrap_or(0);
        for (id, code) in codes.iter().enumerate() {
            if query_code.hamming(code) <= furthest {
                assert!(returned.contains(&(id as ItemId)));
            }
        }
    }
    Ok(())
}

#[test]
fn near_vectors_are_found_before_far_ones() -> Result<(), IndexError> {
    let mut idx = Indexer::new(&IndexerOptions {
        seed: 9,
        bitsize: 16,
        vecsize: 64,
    })?;
    let mut rng = StdRng::seed_from_u64(4);
    let anchor = random_unit_vector(&mut rng, 64);
    let near: Vec<f32> = anchor.iter().map(|x| x * 2.0).collect();
    let far: Vec<f32> = anchor.iter().map(|x| -x).collect();
    idx.add(1, &near)?;
    idx.add(2, &far)?;

    assert_eq!(idx.search(&anchor, 1), vec![1]);
    assert_eq!(idx.search(&far, 1), vec![2]);
    assert_eq!(idx.search(&anchor, 2), vec![1, 2]);
    Ok(())
}

#[test]
fn duplicate_identifiers_are_kept() -> Result<(), IndexError> {
    let mut idx = Indexer::with_params(0, 6, 4)?;
    idx.add(7, &[1.0, 2.0, 3.0, 4.0])?;
    idx.add(7, &[1.0, 2.0, 3.0, 4.0])?;
    assert_eq!(idx.search(&[1.0, 2.0, 3.0, 4.0], 1), vec![7, 7]);
    Ok(())
}

#[test]
fn indices_with_the_same_options_agree() -> Result<(), IndexError> {
    let options = IndexerOptions {
        seed: 31,
        bitsize: 20,
        vecsize: 10,
    };
    let a = Indexer::new(&options)?;
    let b = Indexer::new(&options)?;
    let mut rng = StdRng::seed_from_u64(5);
    for _ in 0..50 {
        let v = random_unit_vector(&mut rng, 10);
        assert_eq!(a.bit_vector(&v), b.bit_vector(&v));
    }
    Ok(())
}

#[test]
fn storage_survives_a_byte_copy() {
    let mut storage = simbucket::index::storage::Storage::default();
    let head = storage.allocate_page().unwrap();
    for i in 0..1100 {
        storage.add(i, head).unwrap();
    }
    let config = bincode::config::standard();
    let bytes = bincode::serde::encode_to_vec(&storage, config).unwrap();
    let (copy, _): (simbucket::index::storage::Storage, usize) =
        bincode::serde::decode_from_slice(&bytes, config).unwrap();
    assert_eq!(copy, storage);
    let items: Vec<u64> = copy
        .pages(head)
        .flat_map(|(_, page)| page.items().to_vec())
        .collect();
    assert_eq!(items, (0..1100).collect::<Vec<_>>());
}
