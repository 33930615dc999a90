//! The reduce-then-broadcast protocol shared by every distributed stage.
//!
//! Reduction uses recursive doubling: at level `pow` (2, 4, 8, ...) a rank
//! divisible by `pow` receives from `rank + pow/2` and merges, every other
//! still-active rank sends its state to `rank - pow/2` and leaves. After
//! `ceil(log2(world_size))` levels rank 0 holds the merge of all inputs, in
//! an order fixed by the ranks alone. Rank 0 then broadcasts the result.

use tracing::{debug, trace};

use crate::comm::Communicator;
use crate::error::{FpError, Result};
use crate::wire::Frame;

/// Converts a payload to and from its wire frame.
pub trait Codec {
    type Value;

    fn encode(&self, value: &Self::Value) -> Result<Frame>;

    fn decode(&self, frame: Frame) -> Result<Self::Value>;
}

/// A payload that can be combined with a peer's payload.
pub trait Reducer: Codec {
    /// Folds `incoming` into `dest`. `incoming` is consumed.
    fn merge(&self, dest: &mut Self::Value, incoming: Self::Value) -> Result<()>;
}

/// Runs the reduce phase. Returns the fully merged value on rank 0 and
/// `None` on every other rank, whose local value has been handed off.
pub fn reduce<C, R>(comm: &C, reducer: &R, local: R::Value) -> Result<Option<R::Value>>
where
    C: Communicator + ?Sized,
    R: Reducer + ?Sized,
{
    let rank = comm.rank();
    let world_size = comm.world_size();
    let mut acc = local;

    let mut pow = 2;
    while pow < 2 * world_size {
        if rank % pow == 0 {
            let source = rank + pow / 2;
            // With a world size that is not a power of two, some partners
            // do not exist; those levels are skipped.
            if source < world_size {
                trace!(rank, source, pow, "reduce: waiting for partner");
                let incoming = reducer.decode(comm.recv(source)?)?;
                reducer.merge(&mut acc, incoming)?;
                debug!(rank, source, pow, "reduce: merged partner");
            }
        } else {
            let dest = rank - pow / 2;
            comm.send(dest, reducer.encode(&acc)?)?;
            debug!(rank, dest, pow, "reduce: sent to partner");
            return Ok(None);
        }
        pow *= 2;
    }

    if rank != 0 {
        return Err(FpError::Protocol(format!(
            "rank {} finished the reduce phase without sending",
            rank
        )));
    }
    Ok(Some(acc))
}

/// Distributes rank 0's value to every rank. Rank 0 must pass `Some`;
/// values passed by the other ranks are discarded.
pub fn broadcast<C, D>(comm: &C, codec: &D, value: Option<D::Value>) -> Result<D::Value>
where
    C: Communicator + ?Sized,
    D: Codec + ?Sized,
{
    if comm.rank() == 0 {
        let value = value.ok_or_else(|| {
            FpError::Protocol("rank 0 has no value to broadcast".to_string())
        })?;
        if comm.world_size() > 1 {
            let frame = codec.encode(&value)?;
            debug!(records = frame.len, "broadcast: sending");
            comm.broadcast(0, Some(frame))?;
        }
        Ok(value)
    } else {
        let frame = comm.broadcast(0, None)?;
        trace!(rank = comm.rank(), records = frame.len, "broadcast: received");
        codec.decode(frame)
    }
}

/// Reduce followed by broadcast: every rank ends up with the same merged value.
pub fn all_reduce<C, R>(comm: &C, reducer: &R, local: R::Value) -> Result<R::Value>
where
    C: Communicator + ?Sized,
    R: Reducer + ?Sized,
{
    let reduced = reduce(comm, reducer, local)?;
    broadcast(comm, reducer, reduced)
}
