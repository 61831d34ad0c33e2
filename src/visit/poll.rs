//! Scheduled reload polling.
//!
//! A poller issues reload-equivalent visits on a fixed interval. Ticks
//! never overlap: the next tick is not honored until the previous tick's
//! visit has settled. While the host is backgrounded and the poller is not
//! marked keep-alive, only every Nth tick fires.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use scopeguard::defer;
use tokio::time::{interval, MissedTickBehavior};

use crate::visit::options::VisitOptions;
use crate::visit::orchestrator::Navigator;
use crate::visit::token::CancellationToken;

/// Poller behavior switches.
#[derive(Debug, Clone, Copy)]
pub struct PollOptions {
    /// Start ticking immediately (default: true).
    pub auto_start: bool,
    /// Keep the full cadence while the host is backgrounded (default: false).
    pub keep_alive: bool,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            auto_start: true,
            keep_alive: false,
        }
    }
}

impl Navigator {
    /// Schedule repeated reloads of the current page every `every`.
    ///
    /// The `request` options are cloned per tick and usually come from
    /// [`VisitOptions::reload`], optionally narrowed with `only`.
    pub fn poll(&self, every: Duration, request: VisitOptions, options: PollOptions) -> Poller {
        let poller = Poller {
            inner: Arc::new(PollerInner {
                navigator: self.clone(),
                every,
                request,
                keep_alive: options.keep_alive,
                throttle: self.config().poll.background_tick_divisor,
                running: AtomicBool::new(false),
                stop: Mutex::new(None),
            }),
        };
        if options.auto_start {
            poller.start();
        }
        poller
    }
}

/// Handle controlling one polling schedule.
#[derive(Clone)]
pub struct Poller {
    inner: Arc<PollerInner>,
}

struct PollerInner {
    navigator: Navigator,
    every: Duration,
    request: VisitOptions,
    keep_alive: bool,
    throttle: u32,
    running: AtomicBool,
    stop: Mutex<Option<CancellationToken>>,
}

impl Poller {
    pub fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let token = CancellationToken::new();
        *self.inner.stop.lock() = Some(token.clone());
        let inner = self.inner.clone();
        tracing::debug!(every_ms = inner.every.as_millis() as u64, "poll started");
        tokio::spawn(async move {
            defer! {
                inner.running.store(false, Ordering::SeqCst);
            }
            let mut ticker = interval(inner.every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The interval yields immediately; consume that so the first
            // reload lands one full period in.
            ticker.tick().await;
            let mut backgrounded_skips: u32 = 0;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                if inner.navigator.in_background() && !inner.keep_alive {
                    backgrounded_skips += 1;
                    if backgrounded_skips < inner.throttle {
                        continue;
                    }
                }
                backgrounded_skips = 0;
                let Some(handle) = inner.navigator.reload(inner.request.clone()) else {
                    continue;
                };
                // Serialize: the next tick waits for this visit to settle.
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = handle.conclusion() => {}
                }
            }
            tracing::debug!("poll stopped");
        });
    }

    pub fn stop(&self) {
        if let Some(token) = self.inner.stop.lock().take() {
            token.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }
}
