//! Upload progress accounting for request bodies.
//!
//! Wraps an outgoing body as a chunked stream so byte counts surface
//! through the visit's `progress` hook while the upload is in flight.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;

const CHUNK_SIZE: usize = 64 * 1024;

/// Snapshot of upload progress delivered to the `progress` hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub loaded: u64,
    pub total: Option<u64>,
    pub percentage: Option<u8>,
}

pub type ProgressCallback = Arc<dyn Fn(&Progress) + Send + Sync>;

/// Request body that reports cumulative bytes as chunks are consumed.
pub struct ProgressBody {
    chunks: VecDeque<Vec<u8>>,
    sent: u64,
    total: u64,
    on_progress: ProgressCallback,
}

impl ProgressBody {
    pub fn new(bytes: Vec<u8>, on_progress: ProgressCallback) -> Self {
        let total = bytes.len() as u64;
        let mut chunks = VecDeque::new();
        let mut rest = bytes;
        while rest.len() > CHUNK_SIZE {
            let tail = rest.split_off(CHUNK_SIZE);
            chunks.push_back(rest);
            rest = tail;
        }
        if !rest.is_empty() {
            chunks.push_back(rest);
        }
        Self {
            chunks,
            sent: 0,
            total,
            on_progress,
        }
    }
}

impl Stream for ProgressBody {
    type Item = Result<Vec<u8>, Infallible>;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match this.chunks.pop_front() {
            Some(chunk) => {
                this.sent += chunk.len() as u64;
                let percentage = if this.total > 0 {
                    Some((this.sent * 100 / this.total) as u8)
                } else {
                    None
                };
                (this.on_progress)(&Progress {
                    loaded: this.sent,
                    total: Some(this.total),
                    percentage,
                });
                Poll::Ready(Some(Ok(chunk)))
            }
            None => Poll::Ready(None),
        }
    }
}
