//! Health status types and the check registry.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

/// Health of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
	Healthy,
	Unhealthy,
}

impl HealthStatus {
	pub fn is_healthy(&self) -> bool {
		matches!(self, HealthStatus::Healthy)
	}

	pub fn from_bool(healthy: bool) -> Self {
		if healthy {
			HealthStatus::Healthy
		} else {
			HealthStatus::Unhealthy
		}
	}
}

/// A named health probe.
#[async_trait::async_trait]
pub trait HealthCheck: Send + Sync {
	async fn check(&self) -> HealthStatus;
	fn name(&self) -> &str;
}

/// Registry of health checks; the aggregate behind `/health`.
pub struct HealthChecker {
	checks: Arc<RwLock<HashMap<String, Box<dyn HealthCheck>>>>,
}

impl HealthChecker {
	pub fn new() -> Self {
		Self {
			checks: Arc::new(RwLock::new(HashMap::new())),
		}
	}

	pub async fn register(&self, check: Box<dyn HealthCheck>) {
		let name = check.name().to_string();
		self.checks.write().await.insert(name, check);
	}

	/// Runs every registered check and returns the per-component view.
	pub async fn run_all(&self) -> HashMap<String, HealthStatus> {
		let checks = self.checks.read().await;
		let mut results = HashMap::new();

		for (name, check) in checks.iter() {
			let status = check.check().await;
			match status {
				HealthStatus::Healthy => debug!(component = %name, "health check passed"),
				HealthStatus::Unhealthy => error!(component = %name, "health check failed"),
			}
			results.insert(name.clone(), status);
		}

		results
	}

	/// Unhealthy when any component is unhealthy; healthy when empty.
	pub async fn overall(&self) -> HealthStatus {
		let results = self.run_all().await;
		let unhealthy = results.values().filter(|s| !s.is_healthy()).count();
		if unhealthy > 0 {
			warn!(unhealthy, total = results.len(), "service degraded");
			HealthStatus::Unhealthy
		} else {
			HealthStatus::Healthy
		}
	}
}

impl Default for HealthChecker {
	fn default() -> Self {
		Self::new()
	}
}
