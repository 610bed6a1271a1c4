//! Common test utilities for storage-queue integration tests
//!
//! Every fixture runs against the in-memory service driven by a manual
//! clock, so visibility windows can be crossed without sleeping.

use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;
use storage_queue::{
    BlockingQueueClient, Endpoint, InMemoryConfig, InMemoryProvider, ManualTimeProvider,
    QueueClient, QueueConfig, QueueHandle,
};

/// Client, queue and the clock driving the service behind them
#[allow(dead_code)]
pub struct Fixture {
    pub client: QueueClient,
    pub queue: QueueHandle,
    pub clock: ManualTimeProvider,
}

#[allow(dead_code)]
impl Fixture {
    /// Move service time forward
    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    /// Blocking view over the same service
    pub fn blocking(&self) -> BlockingQueueClient {
        BlockingQueueClient::new(self.client.clone()).expect("Failed to create blocking client")
    }
}

/// Fixture with an existing, empty queue named `name`
#[allow(dead_code)]
pub async fn fixture_with_queue(name: &str) -> Fixture {
    let fixture = fixture(name);
    fixture
        .client
        .create_if_not_exists(&fixture.queue)
        .await
        .expect("Failed to create queue");
    fixture
}

/// Fixture whose queue has not been created yet
pub fn fixture(name: &str) -> Fixture {
    let clock =
        ManualTimeProvider::starting_at(Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap());
    let provider =
        InMemoryProvider::with_time_provider(InMemoryConfig::default(), Arc::new(clock.clone()));
    let client = QueueClient::new(Arc::new(provider), QueueConfig::default());

    Fixture {
        client,
        queue: queue_handle(name),
        clock,
    }
}

/// Handle for `name` on the in-memory endpoint
pub fn queue_handle(name: &str) -> QueueHandle {
    QueueHandle::parse(name, Endpoint::new("memory://local").unwrap()).expect("Invalid queue name")
}
