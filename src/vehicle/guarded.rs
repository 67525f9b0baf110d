//! Time-bounded, retrying wrapper around any [`Vehicle`]

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::MissionConfig;
use crate::error::{Error, Result};
use crate::geo::{Coordinate, Position};
use crate::vehicle::Vehicle;

type CallFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Timeout and retry policy applied to vehicle calls
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkPolicy {
    /// Bound on `connect`
    pub connect_timeout: Duration,
    /// Bound on every other call, per attempt
    pub command_timeout: Duration,
    /// Extra attempts for arm, takeoff, goto and return-to-launch
    pub retries: u32,
    /// Pause before each retry
    pub backoff: Duration,
}

impl LinkPolicy {
    pub fn from_config(config: &MissionConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            command_timeout: config.command_timeout(),
            retries: config.command_retries,
            backoff: config.retry_backoff(),
        }
    }
}

impl Default for LinkPolicy {
    fn default() -> Self {
        Self::from_config(&MissionConfig::default())
    }
}

/// Runs `call`, turning an expired `limit` into [`Error::CommunicationTimeout`]
async fn bounded<T, F>(operation: &'static str, limit: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(Error::CommunicationTimeout(operation)),
    }
}

/// Vehicle wrapper enforcing a [`LinkPolicy`]
///
/// Connect and telemetry reads get a single bounded attempt. Commands are
/// retried after a backoff; the last error is returned once retries run out.
pub struct GuardedVehicle<V> {
    inner: V,
    policy: LinkPolicy,
}

impl<V: Vehicle> GuardedVehicle<V> {
    pub fn new(inner: V, policy: LinkPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> LinkPolicy {
        self.policy
    }

    pub fn inner(&self) -> &V {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut V {
        &mut self.inner
    }

    pub fn into_inner(self) -> V {
        self.inner
    }

    async fn command<F>(&mut self, operation: &'static str, mut call: F) -> Result<()>
    where
        F: for<'a> FnMut(&'a mut V) -> CallFuture<'a> + Send,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = bounded(operation, self.policy.command_timeout, call(&mut self.inner)).await;

            match result {
                Ok(()) => {
                    debug!(operation, attempt, "Vehicle command accepted");
                    return Ok(());
                }
                Err(err) if attempt <= self.policy.retries => {
                    warn!(operation, attempt, error = %err, "Vehicle command failed, retrying");
                    tokio::time::sleep(self.policy.backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[async_trait]
impl<V: Vehicle> Vehicle for GuardedVehicle<V> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn connect(&mut self, address: &str) -> Result<()> {
        bounded("connect", self.policy.connect_timeout, self.inner.connect(address)).await
    }

    async fn arm(&mut self) -> Result<()> {
        self.command("arm", |v| v.arm()).await
    }

    async fn disarm(&mut self) -> Result<()> {
        self.command("disarm", |v| v.disarm()).await
    }

    async fn takeoff(&mut self) -> Result<()> {
        self.command("takeoff", |v| v.takeoff()).await
    }

    async fn goto_location(&mut self, target: Coordinate, altitude_m: f64, heading_deg: f64) -> Result<()> {
        self.command("goto_location", move |v| v.goto_location(target, altitude_m, heading_deg))
            .await
    }

    async fn return_to_launch(&mut self) -> Result<()> {
        self.command("return_to_launch", |v| v.return_to_launch()).await
    }

    async fn read_position(&mut self) -> Result<Position> {
        bounded("read_position", self.policy.command_timeout, self.inner.read_position()).await
    }

    async fn read_battery(&mut self) -> Result<f64> {
        bounded("read_battery", self.policy.command_timeout, self.inner.read_battery()).await
    }
}
