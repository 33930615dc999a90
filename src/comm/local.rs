//! An in-process group of workers, one OS thread per rank.
//!
//! Every ordered pair of ranks gets its own channel so that a receive is
//! matched by source, like point-to-point message passing between processes.

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::Communicator;
use crate::error::{FpError, Result};
use crate::wire::Frame;

pub struct LocalComm {
    rank: usize,
    world_size: usize,
    /// `outbox[dest]` carries frames from this rank to `dest`.
    outbox: Vec<Sender<Frame>>,
    /// `inbox[source]` carries frames from `source` to this rank.
    inbox: Vec<Receiver<Frame>>,
}

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.world_size
    }

    fn send(&self, dest: usize, frame: Frame) -> Result<()> {
        self.check_peer(dest)?;
        self.outbox[dest].send(frame).map_err(|_| {
            FpError::Transport(format!("rank {} is gone, send from {} failed", dest, self.rank))
        })
    }

    fn recv(&self, source: usize) -> Result<Frame> {
        self.check_peer(source)?;
        self.inbox[source].recv().map_err(|_| {
            FpError::Transport(format!(
                "rank {} is gone, rank {} cannot receive",
                source, self.rank
            ))
        })
    }

    fn broadcast(&self, root: usize, frame: Option<Frame>) -> Result<Frame> {
        if root >= self.world_size {
            return Err(FpError::RankOutOfRange {
                rank: root,
                world_size: self.world_size,
            });
        }
        if self.rank != root {
            return self.recv(root);
        }
        let frame = frame.ok_or_else(|| {
            FpError::Protocol(format!("broadcast root {} has nothing to send", root))
        })?;
        for dest in (0..self.world_size).filter(|&r| r != root) {
            self.send(dest, frame.clone())?;
        }
        Ok(frame)
    }
}

/// Builds and runs a group of [LocalComm] endpoints.
pub struct LocalCluster;

impl LocalCluster {
    /// Creates the endpoints of a fully connected group, indexed by rank.
    pub fn endpoints(world_size: usize) -> Vec<LocalComm> {
        let mut senders: Vec<Vec<Sender<Frame>>> = Vec::with_capacity(world_size);
        let mut receivers: Vec<Vec<Receiver<Frame>>> =
            (0..world_size).map(|_| Vec::with_capacity(world_size)).collect();

        for _source in 0..world_size {
            let mut row = Vec::with_capacity(world_size);
            for inbox in receivers.iter_mut() {
                let (tx, rx) = unbounded();
                row.push(tx);
                inbox.push(rx);
            }
            senders.push(row);
        }

        senders
            .into_iter()
            .zip(receivers)
            .enumerate()
            .map(|(rank, (outbox, inbox))| LocalComm {
                rank,
                world_size,
                outbox,
                inbox,
            })
            .collect()
    }

    /// Runs `f` once per rank, each on its own thread, and returns the
    /// results in rank order.
    ///
    /// A rank that fails drops its endpoint, so every peer still waiting on
    /// it fails with [FpError::Transport]. The error reported is the first
    /// one that is not such a consequence, if any.
    pub fn run<T, F>(world_size: usize, f: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(LocalComm) -> Result<T> + Sync,
    {
        if world_size == 0 {
            return Err(FpError::Config("world_size must be at least 1".into()));
        }
        let f = &f;
        let results: Vec<Result<T>> = std::thread::scope(|s| {
            let mut handles = Vec::with_capacity(world_size);
            for comm in Self::endpoints(world_size) {
                let rank = comm.rank;
                let handle = std::thread::Builder::new()
                    .name(format!("fpmerge-rank-{}", rank))
                    .spawn_scoped(s, move || f(comm));
                handles.push((rank, handle));
            }
            handles
                .into_iter()
                .map(|(rank, handle)| match handle {
                    Ok(h) => h
                        .join()
                        .unwrap_or_else(|_| Err(FpError::Transport(format!("rank {} panicked", rank)))),
                    Err(e) => Err(FpError::Io(e)),
                })
                .collect()
        });

        let mut first_transport = None;
        let mut values = Vec::with_capacity(world_size);
        for r in results {
            match r {
                Ok(v) => values.push(v),
                Err(FpError::Transport(msg)) => {
                    first_transport.get_or_insert(FpError::Transport(msg));
                }
                Err(e) => return Err(e),
            }
        }
        match first_transport {
            Some(e) => Err(e),
            None => Ok(values),
        }
    }
}
