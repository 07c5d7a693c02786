//! A wired engine running in-process.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use syncd_ng::bus::{BusMessage, EventBus};
use syncd_ng::config::{BusConfig, SyncConfig};
use syncd_ng::consumers::{self, ConsumerContext};
use syncd_ng::db::Database;
use syncd_ng::error::{StartupError, SyncError};
use syncd_ng::notifier::Notifier;
use syncd_ng::state::TypingCache;
use syncd_ng::streams::Streams;
use syncd_ng::sync::{RequestPool, SyncRequest, SyncResponse};
use syncd_proto::StreamingToken;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct TestEngine {
    pub db: Database,
    pub streams: Arc<Streams>,
    pub notifier: Arc<Notifier>,
    pub bus: EventBus,
    pub pool: Arc<RequestPool>,
    pub cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl TestEngine {
    /// Engine over a fresh in-memory database.
    pub async fn spawn() -> Result<Self, StartupError> {
        let db = Database::new(":memory:").await?;
        Self::with_database(db).await
    }

    /// Engine over an existing database, as after a restart.
    pub async fn with_database(db: Database) -> Result<Self, StartupError> {
        let cancel = CancellationToken::new();
        let cache = Arc::new(TypingCache::new());
        let streams = Arc::new(Streams::new(&db, Arc::clone(&cache), &cancel).await?);
        let notifier = Arc::new(Notifier::new());
        let bus = EventBus::new(&BusConfig {
            topic_prefix: "test".into(),
            channel_capacity: 64,
        });

        let ctx = ConsumerContext::new(db.clone(), Arc::clone(&streams), Arc::clone(&notifier));
        let tasks = consumers::spawn_all(&ctx, &bus, cache, Duration::from_secs(30), &cancel)
            .expect("fresh bus has no subscribers");

        let pool = Arc::new(RequestPool::new(
            db.clone(),
            Arc::clone(&streams),
            Arc::clone(&notifier),
            SyncConfig::default(),
        ));

        Ok(Self {
            db,
            streams,
            notifier,
            bus,
            pool,
            cancel,
            tasks,
        })
    }

    pub async fn publish(&self, topic: &str, msg: BusMessage) {
        self.bus.publish(topic, msg).await.expect("bus open");
    }

    pub async fn sync(&self, req: SyncRequest) -> Result<SyncResponse, SyncError> {
        self.pool
            .on_incoming_sync_request(req, &CancellationToken::new())
            .await
    }

    /// Spawn a sync request and return once it is blocked in the notifier.
    pub async fn sync_in_background(
        &self,
        req: SyncRequest,
    ) -> JoinHandle<Result<SyncResponse, SyncError>> {
        let waiting = self.notifier.active_waiters();
        let pool = Arc::clone(&self.pool);
        let handle = tokio::spawn(async move {
            pool.on_incoming_sync_request(req, &CancellationToken::new())
                .await
        });
        wait_until(|| self.notifier.active_waiters() > waiting).await;
        handle
    }

    /// Wait until consumers have made `token` visible.
    pub async fn wait_for_latest(&self, check: impl Fn(&StreamingToken) -> bool) {
        wait_until(|| check(&self.streams.latest())).await;
    }

    /// Stop consumers and release the database.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for task in self.tasks {
            let _ = task.await;
        }
        self.db.close().await;
    }
}

/// Poll `cond` until it holds, failing the test after five seconds.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
