use crate::collectors::{MetricsProvider, ProviderError, Snapshot};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use sysinfo::{CpuExt, CpuRefreshKind, RefreshKind, System, SystemExt};
use tokio::task;
use tokio::time;
use tracing::debug;

/// [`MetricsProvider`] backed by `sysinfo`.
///
/// The refresh runs on the blocking pool so that a stalled OS query is cut
/// off by `sample_timeout` instead of freezing the loop.
pub struct SysinfoProvider {
    system: Arc<Mutex<System>>,
    sample_timeout: Duration,
}

impl SysinfoProvider {
    pub fn new(sample_timeout: Duration) -> Self {
        let mut system = System::new_with_specifics(
            RefreshKind::new()
                .with_cpu(CpuRefreshKind::new().with_cpu_usage())
                .with_memory(),
        );
        // baseline for the first cpu delta
        system.refresh_cpu();
        Self {
            system: Arc::new(Mutex::new(system)),
            sample_timeout,
        }
    }
}

#[async_trait]
impl MetricsProvider for SysinfoProvider {
    async fn sample(&mut self) -> Result<Snapshot, ProviderError> {
        let system = self.system.clone();
        bounded(self.sample_timeout, move || read_system(&system)).await
    }
}

/// Runs `read` on the blocking pool and gives up after `timeout`. The
/// blocking thread itself is left to finish in the background.
async fn bounded<F>(timeout: Duration, read: F) -> Result<Snapshot, ProviderError>
where
    F: FnOnce() -> Result<Snapshot, ProviderError> + Send + 'static,
{
    match time::timeout(timeout, task::spawn_blocking(read)).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(ProviderError::Unavailable(format!(
            "sampling task failed: {join_err}"
        ))),
        Err(_elapsed) => Err(ProviderError::Timeout(timeout)),
    }
}

fn read_system(system: &Mutex<System>) -> Result<Snapshot, ProviderError> {
    let mut system = system
        .lock()
        .map_err(|_| ProviderError::Unavailable("system handle poisoned".to_string()))?;
    system.refresh_cpu();
    system.refresh_memory();
    let taken_at = SystemTime::now();

    let usages: Vec<f32> = system.cpus().iter().map(|c| c.cpu_usage()).collect();
    let cpu_percent = cpu_load_percent(&usages)
        .ok_or_else(|| ProviderError::Unavailable("no cpus reported".to_string()))?;
    let mem_percent = memory_load_percent(system.total_memory(), system.available_memory())
        .ok_or_else(|| ProviderError::Unavailable("total memory reported as zero".to_string()))?;

    debug!(cpu_percent, mem_percent, cores = usages.len(), "system sampled");
    Ok(Snapshot::new(taken_at, cpu_percent, mem_percent))
}

fn cpu_load_percent(per_core: &[f32]) -> Option<f64> {
    if per_core.is_empty() {
        return None;
    }
    let sum: f32 = per_core.iter().sum();
    Some((sum / per_core.len() as f32) as f64)
}

fn memory_load_percent(total: u64, available: u64) -> Option<f64> {
    if total == 0 {
        return None;
    }
    let used = total.saturating_sub(available);
    Some((used as f64 / total as f64) * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_load_is_mean_of_cores() {
        assert_eq!(cpu_load_percent(&[10.0, 30.0]), Some(20.0));
        assert_eq!(cpu_load_percent(&[]), None);
    }

    #[test]
    fn memory_load_uses_available() {
        assert_eq!(memory_load_percent(1000, 250), Some(75.0));
        assert_eq!(memory_load_percent(1000, 2000), Some(0.0));
        assert_eq!(memory_load_percent(0, 0), None);
    }

    #[tokio::test]
    async fn stalled_read_reports_timeout() {
        let result = bounded(Duration::from_millis(10), || {
            std::thread::sleep(Duration::from_millis(200));
            Ok(Snapshot::new(SystemTime::now(), 1.0, 1.0))
        })
        .await;

        match result {
            Err(ProviderError::Timeout(limit)) => assert_eq!(limit, Duration::from_millis(10)),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn panicking_read_reports_unavailable() {
        let result = bounded(Duration::from_secs(5), || panic!("os query blew up")).await;
        assert!(matches!(result, Err(ProviderError::Unavailable(_))));
    }

    #[tokio::test]
    async fn sysinfo_sample_is_in_range() {
        let mut provider = SysinfoProvider::new(Duration::from_secs(5));
        let snapshot = provider.sample().await.expect("sysinfo sample");
        snapshot.validate().expect("percentages in range");
    }
}
