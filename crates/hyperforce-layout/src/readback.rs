//! Asynchronous position snapshots.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use rayon::prelude::*;
use tokio::sync::oneshot;

use crate::{LayoutError, NodeState, Position, Result};

enum Inner {
    Pending(oneshot::Receiver<Vec<Position>>),
    Ready(Option<Result<Vec<Position>>>),
}

/// Future resolving to the node positions at the moment it was requested.
///
/// The engine keeps ticking while the snapshot is packed on the worker pool.
/// Awaiting it from any executor works; [`crate::sync`] blocks on it instead.
#[must_use = "a readback does nothing unless awaited or polled"]
pub struct PositionsReadback {
    inner: Inner,
}

fn dropped() -> LayoutError {
    LayoutError::Readback("worker dropped the position snapshot".into())
}

impl PositionsReadback {
    /// Copy `staging` off the caller's thread and pack it on `pool`.
    pub(crate) fn spawn(pool: &rayon::ThreadPool, staging: Vec<NodeState>) -> Self {
        let (tx, rx) = oneshot::channel();
        pool.spawn(move || {
            let positions: Vec<Position> = staging.par_iter().map(NodeState::position).collect();
            // The caller may have given up on the snapshot
            let _ = tx.send(positions);
        });
        Self {
            inner: Inner::Pending(rx),
        }
    }

    pub(crate) fn ready(result: Result<Vec<Position>>) -> Self {
        Self {
            inner: Inner::Ready(Some(result)),
        }
    }

    /// Take the snapshot if it has already arrived, without waiting.
    ///
    /// Returns `None` while the worker is still packing it.
    pub fn try_take(&mut self) -> Option<Result<Vec<Position>>> {
        match &mut self.inner {
            Inner::Pending(rx) => match rx.try_recv() {
                Ok(positions) => Some(Ok(positions)),
                Err(oneshot::error::TryRecvError::Empty) => None,
                Err(oneshot::error::TryRecvError::Closed) => Some(Err(dropped())),
            },
            Inner::Ready(result) => result.take(),
        }
    }
}

impl Future for PositionsReadback {
    type Output = Result<Vec<Position>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().inner {
            Inner::Pending(rx) => Pin::new(rx).poll(cx).map(|r| r.map_err(|_| dropped())),
            Inner::Ready(result) => Poll::Ready(result.take().unwrap_or_else(|| {
                Err(LayoutError::Readback("readback polled after completion".into()))
            })),
        }
    }
}

impl std::fmt::Debug for PositionsReadback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.inner {
            Inner::Pending(_) => "pending",
            Inner::Ready(Some(_)) => "ready",
            Inner::Ready(None) => "taken",
        };
        f.debug_struct("PositionsReadback").field("state", &state).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> rayon::ThreadPool {
        rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap()
    }

    #[test]
    fn test_resolves_to_positions() {
        let staging = vec![NodeState::at(1.0, 2.0), NodeState { x: 3.0, y: 4.0, vx: 9.0, vy: 9.0 }];
        let readback = PositionsReadback::spawn(&pool(), staging);
        let positions = pollster::block_on(readback).unwrap();
        assert_eq!(positions, vec![Position::new(1.0, 2.0), Position::new(3.0, 4.0)]);
    }

    #[test]
    fn test_ready_resolves_immediately() {
        let mut readback = PositionsReadback::ready(Ok(vec![]));
        assert_eq!(readback.try_take().unwrap().unwrap(), vec![]);
        assert!(readback.try_take().is_none());
    }

    #[test]
    fn test_dropped_sender_is_an_error() {
        let (tx, rx) = oneshot::channel::<Vec<Position>>();
        drop(tx);
        let readback = PositionsReadback {
            inner: Inner::Pending(rx),
        };
        assert!(matches!(
            pollster::block_on(readback),
            Err(LayoutError::Readback(_))
        ));
    }

    #[test]
    fn test_try_take_eventually_succeeds() {
        let mut readback = PositionsReadback::spawn(&pool(), vec![NodeState::at(5.0, 6.0)]);
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        loop {
            if let Some(result) = readback.try_take() {
                assert_eq!(result.unwrap(), vec![Position::new(5.0, 6.0)]);
                break;
            }
            assert!(std::time::Instant::now() < deadline, "readback never arrived");
            std::thread::yield_now();
        }
    }
}
