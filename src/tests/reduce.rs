use crate::comm::{Communicator, LocalCluster};
use crate::error::{FpError, Result};
use crate::reduce::{all_reduce, reduce, Codec, Reducer};
use crate::wire::Frame;

const WORLD_SIZES: [usize; 5] = [1, 2, 3, 5, 8];

struct Sum;

impl Codec for Sum {
    type Value = u64;

    fn encode(&self, value: &u64) -> Result<Frame> {
        Frame::encode_records(&[*value])
    }

    fn decode(&self, frame: Frame) -> Result<u64> {
        let v: Vec<u64> = frame.decode_records()?;
        v.first()
            .copied()
            .ok_or_else(|| FpError::Protocol("empty sum".into()))
    }
}

impl Reducer for Sum {
    fn merge(&self, dest: &mut u64, incoming: u64) -> Result<()> {
        *dest += incoming;
        Ok(())
    }
}

/// Appends payloads, which exposes the merge order.
struct Concat;

impl Codec for Concat {
    type Value = Vec<u32>;

    fn encode(&self, value: &Vec<u32>) -> Result<Frame> {
        Frame::encode_records(value)
    }

    fn decode(&self, frame: Frame) -> Result<Vec<u32>> {
        frame.decode_records()
    }
}

impl Reducer for Concat {
    fn merge(&self, dest: &mut Vec<u32>, incoming: Vec<u32>) -> Result<()> {
        dest.extend(incoming);
        Ok(())
    }
}

#[test]
fn sum_converges_everywhere() {
    for world_size in WORLD_SIZES {
        let out = LocalCluster::run(world_size, |comm| {
            all_reduce(&comm, &Sum, comm.rank() as u64 + 1)
        })
        .unwrap();
        let expected = (world_size * (world_size + 1) / 2) as u64;
        assert_eq!(out, vec![expected; world_size], "world_size {}", world_size);
    }
}

#[test]
fn merge_order_is_fixed_by_rank() {
    for world_size in WORLD_SIZES {
        for _ in 0..3 {
            let out = LocalCluster::run(world_size, |comm| {
                all_reduce(&comm, &Concat, vec![comm.rank() as u32])
            })
            .unwrap();
            let expected: Vec<u32> = (0..world_size as u32).collect();
            assert!(out.iter().all(|v| v == &expected), "world_size {}", world_size);
        }
    }
}

#[test]
fn only_rank_zero_keeps_the_result() {
    let out = LocalCluster::run(5, |comm| reduce(&comm, &Sum, 1)).unwrap();
    assert_eq!(out[0], Some(5));
    assert!(out[1..].iter().all(Option::is_none));
}

struct Broken;

impl Codec for Broken {
    type Value = u64;

    fn encode(&self, value: &u64) -> Result<Frame> {
        Sum.encode(value)
    }

    fn decode(&self, _frame: Frame) -> Result<u64> {
        Err(FpError::Protocol("refusing payload".into()))
    }
}

impl Reducer for Broken {
    fn merge(&self, _dest: &mut u64, _incoming: u64) -> Result<()> {
        Ok(())
    }
}

#[test]
fn failed_merge_aborts_all_ranks() {
    let err = LocalCluster::run(4, |comm| all_reduce(&comm, &Broken, 1)).unwrap_err();
    assert!(matches!(err, FpError::Protocol(_)));
}
