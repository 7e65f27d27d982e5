use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::application::services::step_runtime::{StepRuntime, StepRuntimeFactory};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SleepRecord {
    pub name: String,
    pub wake_at: DateTime<Utc>,
}

enum Clock {
    System,
    Simulated(Mutex<DateTime<Utc>>),
}

/// Runs steps inline and memoizes their output for the lifetime of the value.
///
/// Sleeps never block: they are recorded, and a simulated clock jumps to the wake time.
pub struct InMemoryStepRuntime {
    clock: Clock,
    journal: RwLock<HashMap<String, Value>>,
    executed: Mutex<Vec<String>>,
    sleeps: Mutex<Vec<SleepRecord>>,
}

impl InMemoryStepRuntime {
    pub fn system() -> Self {
        Self::with_clock(Clock::System)
    }

    pub fn simulated(start: DateTime<Utc>) -> Self {
        Self::with_clock(Clock::Simulated(Mutex::new(start)))
    }

    fn with_clock(clock: Clock) -> Self {
        Self {
            clock,
            journal: RwLock::new(HashMap::new()),
            executed: Mutex::new(Vec::new()),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    /// Moves a simulated clock forward, as wall time passing between steps.
    pub fn advance(&self, by: TimeDelta) {
        if let Clock::Simulated(now) = &self.clock {
            let mut now = lock(now);
            *now += by;
        }
    }

    /// Names of the steps that actually ran, in order. Replays are not listed.
    pub fn executed_steps(&self) -> Vec<String> {
        lock(&self.executed).clone()
    }

    pub fn sleeps(&self) -> Vec<SleepRecord> {
        lock(&self.sleeps).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl StepRuntime for InMemoryStepRuntime {
    fn now(&self) -> DateTime<Utc> {
        match &self.clock {
            Clock::System => Utc::now(),
            Clock::Simulated(now) => *lock(now),
        }
    }

    async fn run_raw(
        &self,
        name: &str,
        step: BoxFuture<'_, anyhow::Result<Value>>,
    ) -> anyhow::Result<Value> {
        if let Some(output) = self.journal.read().await.get(name) {
            debug!(step = name, "replaying memoized step");
            return Ok(output.clone());
        }

        let output = step.await?;
        lock(&self.executed).push(name.to_string());
        self.journal
            .write()
            .await
            .insert(name.to_string(), output.clone());
        Ok(output)
    }

    async fn sleep_until(&self, name: &str, wake_at: DateTime<Utc>) -> anyhow::Result<()> {
        let key = format!("sleep:{name}");
        if self.journal.read().await.contains_key(&key) {
            return Ok(());
        }

        debug!(step = name, %wake_at, "sleeping");
        lock(&self.sleeps).push(SleepRecord {
            name: name.to_string(),
            wake_at,
        });
        if let Clock::Simulated(now) = &self.clock {
            let mut now = lock(now);
            if wake_at > *now {
                *now = wake_at;
            }
        }
        self.journal
            .write()
            .await
            .insert(key, Value::String(wake_at.to_rfc3339()));
        Ok(())
    }
}

/// Opens a fresh system-clock runtime per run; used for dry runs that never sleep
/// for real.
#[derive(Default)]
pub struct InMemoryStepRuntimeFactory;

impl StepRuntimeFactory for InMemoryStepRuntimeFactory {
    fn create(&self, _run_id: Uuid) -> Arc<dyn StepRuntime> {
        Arc::new(InMemoryStepRuntime::system())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::application::services::step_runtime::run_step;

    #[tokio::test]
    async fn memoizes_steps_by_name() {
        let runtime = InMemoryStepRuntime::system();
        let first: u32 = run_step(&runtime, "count", async { Ok(1) }).await.unwrap();
        let replayed: u32 = run_step(&runtime, "count", async { Ok(2) }).await.unwrap();

        assert_eq!(first, 1);
        assert_eq!(replayed, 1);
        assert_eq!(runtime.executed_steps(), vec!["count".to_string()]);
    }

    #[tokio::test]
    async fn failed_steps_are_not_memoized() {
        let runtime = InMemoryStepRuntime::system();
        let failed: anyhow::Result<u32> =
            run_step(&runtime, "flaky", async { Err(anyhow::anyhow!("timeout")) }).await;
        assert!(failed.is_err());

        let retried: u32 = run_step(&runtime, "flaky", async { Ok(7) }).await.unwrap();
        assert_eq!(retried, 7);
    }

    #[tokio::test]
    async fn simulated_sleep_moves_the_clock() {
        let start = Utc.with_ymd_and_hms(2024, 11, 5, 12, 0, 0).unwrap();
        let runtime = InMemoryStepRuntime::simulated(start);
        let wake_at = start + TimeDelta::hours(3);

        runtime.sleep_until("nap", wake_at).await.unwrap();
        runtime.sleep_until("nap", wake_at + TimeDelta::hours(1)).await.unwrap();

        assert_eq!(runtime.now(), wake_at);
        assert_eq!(
            runtime.sleeps(),
            vec![SleepRecord {
                name: "nap".to_string(),
                wake_at
            }]
        );
    }
}
