//! Room and user scoped wake-up hub.
//!
//! Every scope key (a room or a user) owns a `watch` channel whose value is
//! the newest token announced for that scope. A waiter subscribes to all of
//! its keys first and only then inspects the current values, so an announce
//! either lands before the check (and is seen) or after the subscription (and
//! wakes the receiver). Nothing is lost in between.
//!
//! Entries with no subscribers are pruned periodically. Their tokens are
//! folded into a floor token that seeds any entry created later, so a waiter
//! arriving after a prune still sees everything that was announced.

use dashmap::DashMap;
use futures_util::future::select_all;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use syncd_proto::{Category, RoomId, StreamPosition, StreamingToken, UserId};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// What an announcement is relevant to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScopeKey {
    Room(RoomId),
    User(UserId),
}

impl From<RoomId> for ScopeKey {
    fn from(room: RoomId) -> Self {
        Self::Room(room)
    }
}

impl From<UserId> for ScopeKey {
    fn from(user: UserId) -> Self {
        Self::User(user)
    }
}

/// How a [`Notifier::wait`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Something newer than the since token was announced on a watched scope.
    /// Carries the merged token of those scopes.
    Woken(StreamingToken),
    /// The deadline passed with nothing new.
    TimedOut,
    /// The caller's cancellation token fired.
    Canceled,
}

impl WaitOutcome {
    fn label(&self) -> &'static str {
        match self {
            Self::Woken(_) => "woken",
            Self::TimedOut => "timed_out",
            Self::Canceled => "canceled",
        }
    }
}

/// Decrements the waiter count however the wait ends.
struct WaiterGuard<'a>(&'a AtomicUsize);

impl<'a> WaiterGuard<'a> {
    fn enter(count: &'a AtomicUsize) -> Self {
        count.fetch_add(1, Ordering::Relaxed);
        crate::metrics::add_active_waiters(1);
        Self(count)
    }
}

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
        crate::metrics::add_active_waiters(-1);
    }
}

#[derive(Default)]
pub struct Notifier {
    scopes: DashMap<ScopeKey, watch::Sender<StreamingToken>>,
    /// Lock order: scope shard, then floor.
    floor: Mutex<StreamingToken>,
    waiters: AtomicUsize,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `pos` as visible in `category` for every key in `scopes` and
    /// wake their waiters.
    ///
    /// Must be called after the matching stream has been advanced.
    pub fn announce<I>(&self, scopes: I, category: Category, pos: StreamPosition)
    where
        I: IntoIterator<Item = ScopeKey>,
    {
        let mut woken = 0usize;
        for key in scopes {
            let entry = self
                .scopes
                .entry(key)
                .or_insert_with(|| watch::channel(*self.floor.lock()).0);
            if entry.send_if_modified(|token| token.advance(category, pos)) {
                woken += entry.receiver_count();
            }
        }
        crate::metrics::record_announce(category.as_str());
        debug!(category = category.as_str(), position = pos.value(), woken, "Announced");
    }

    /// Block until something newer than `since` is announced for `user` or
    /// any of `rooms`, until `deadline`, or until `cancel` fires.
    pub async fn wait(
        &self,
        rooms: &BTreeSet<RoomId>,
        user: &UserId,
        since: &StreamingToken,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> WaitOutcome {
        let _guard = WaiterGuard::enter(&self.waiters);

        // Subscribe before looking at any value.
        let mut receivers: Vec<watch::Receiver<StreamingToken>> = rooms
            .iter()
            .cloned()
            .map(ScopeKey::Room)
            .chain(std::iter::once(ScopeKey::User(user.clone())))
            .map(|key| self.subscribe(key))
            .collect();

        let outcome = loop {
            let mut seen = StreamingToken::default();
            for rx in &mut receivers {
                seen.apply(&rx.borrow_and_update());
            }
            if seen.is_after(since) {
                break WaitOutcome::Woken(seen);
            }

            let changed = select_all(receivers.iter_mut().map(|rx| Box::pin(rx.changed())));
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break WaitOutcome::Canceled,
                _ = tokio::time::sleep_until(deadline) => break WaitOutcome::TimedOut,
                (result, _, _) = changed => {
                    // Senders are only dropped with the notifier itself.
                    if result.is_err() {
                        break WaitOutcome::Canceled;
                    }
                }
            }
        };

        crate::metrics::record_wait_outcome(outcome.label());
        outcome
    }

    fn subscribe(&self, key: ScopeKey) -> watch::Receiver<StreamingToken> {
        self.scopes
            .entry(key)
            .or_insert_with(|| watch::channel(*self.floor.lock()).0)
            .subscribe()
    }

    /// Remove scope entries nobody is waiting on. Returns how many were removed.
    pub fn prune_idle(&self) -> usize {
        let before = self.scopes.len();
        self.scopes.retain(|_, tx| {
            if tx.receiver_count() > 0 {
                return true;
            }
            self.floor.lock().apply(&tx.borrow());
            false
        });
        let remaining = self.scopes.len();
        crate::metrics::set_notifier_scopes(remaining);
        before.saturating_sub(remaining)
    }

    /// Prune idle entries every `interval` until `cancel` fires.
    pub async fn run_pruner(self: Arc<Self>, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = self.prune_idle();
                    if removed > 0 {
                        debug!(removed, remaining = self.scopes.len(), "Pruned idle notifier scopes");
                    }
                }
            }
        }
    }

    /// Newest token announced for `key`, if the key is registered.
    pub fn scope_token(&self, key: &ScopeKey) -> Option<StreamingToken> {
        self.scopes.get(key).map(|tx| *tx.borrow())
    }

    /// Requests currently blocked in [`wait`](Self::wait).
    pub fn active_waiters(&self) -> usize {
        self.waiters.load(Ordering::Relaxed)
    }

    /// Live subscriptions across all scope keys.
    pub fn registered_receivers(&self) -> usize {
        self.scopes.iter().map(|e| e.value().receiver_count()).sum()
    }

    /// Scope keys held by the registry.
    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }
}
