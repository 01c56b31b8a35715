use crate::dissemination::types::DisseminationConfig;
use crate::error::{Result, SwimError};
use crate::failure::types::FailureDetectorConfig;
use crate::transport::protocol::{MAX_PACKET_SIZE, update_capacity};

use std::net::SocketAddr;
use std::time::Duration;

/// Everything a [`SwimNode`](super::service::SwimNode) needs to start.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_host: String,
    pub bind_port: u16,
    pub failure_detector: FailureDetectorConfig,
    pub dissemination: DisseminationConfig,
    /// Peers known before any gossip arrives.
    pub bootstrap_peers: Vec<SocketAddr>,
    /// Outstanding requests older than this are swept.
    pub request_ttl: Duration,
    /// `Dead` members are forgotten after this long.
    pub dead_member_ttl: Duration,
    pub sweep_interval: Duration,
}

impl Config {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_host, self.bind_port)
    }

    pub fn validate(&self) -> Result<()> {
        let fd = &self.failure_detector;
        if fd.period.is_zero() {
            return Err(SwimError::InvalidConfig("probe period must be non-zero".into()));
        }
        if fd.timeout.is_zero() {
            return Err(SwimError::InvalidConfig("probe timeout must be non-zero".into()));
        }

        let lambda = self.dissemination.lambda;
        if !lambda.is_finite() || lambda <= 0.0 {
            return Err(SwimError::InvalidConfig(format!(
                "lambda must be a positive number, got {}",
                lambda
            )));
        }
        let updates = self.dissemination.max_updates_per_packet;
        if updates == 0 {
            return Err(SwimError::InvalidConfig(
                "at least one update per packet is required".into(),
            ));
        }
        if updates > update_capacity() {
            return Err(SwimError::InvalidConfig(format!(
                "{} updates per packet exceed the {}-byte packet bound (at most {})",
                updates,
                MAX_PACKET_SIZE,
                update_capacity()
            )));
        }

        if self.dead_member_ttl.is_zero() {
            return Err(SwimError::InvalidConfig("dead member ttl must be non-zero".into()));
        }
        if self.sweep_interval.is_zero() {
            return Err(SwimError::InvalidConfig("sweep interval must be non-zero".into()));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_host: "127.0.0.1".to_string(),
            bind_port: 10000,
            failure_detector: FailureDetectorConfig::default(),
            dissemination: DisseminationConfig::default(),
            bootstrap_peers: Vec::new(),
            request_ttl: Duration::from_secs(1),
            dead_member_ttl: Duration::from_secs(30),
            sweep_interval: Duration::from_millis(500),
        }
    }
}
