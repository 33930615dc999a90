//! Point-to-point and collective message passing between workers.

pub mod local;

use crate::error::{FpError, Result};
use crate::wire::Frame;

pub use local::{LocalCluster, LocalComm};

/// A worker's endpoint into a fixed group of `world_size` workers.
///
/// All operations block until they complete. There is no timeout: a failed
/// operation means the run cannot finish and the caller must give up.
pub trait Communicator {
    /// This worker's rank, in `0..world_size`.
    fn rank(&self) -> usize;

    fn world_size(&self) -> usize;

    /// Sends one frame to `dest`.
    fn send(&self, dest: usize, frame: Frame) -> Result<()>;

    /// Blocks until the next frame from `source` arrives.
    fn recv(&self, source: usize) -> Result<Frame>;

    /// One-to-all broadcast. `root` passes `Some(frame)`, every other rank
    /// passes `None`; all ranks return the root's frame.
    fn broadcast(&self, root: usize, frame: Option<Frame>) -> Result<Frame>;

    /// Checks that `peer` names another member of the group.
    fn check_peer(&self, peer: usize) -> Result<()> {
        if peer >= self.world_size() {
            return Err(FpError::RankOutOfRange {
                rank: peer,
                world_size: self.world_size(),
            });
        }
        if peer == self.rank() {
            return Err(FpError::Protocol(format!(
                "rank {} addressed itself",
                peer
            )));
        }
        Ok(())
    }
}
