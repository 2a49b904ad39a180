pub mod system;

use async_trait::async_trait;
use std::time::{Duration, SystemTime};
use thiserror::Error;

/// One reading of system-wide load. Both percentages are in `[0, 100]`
/// once [`Snapshot::validate`] has accepted them.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub taken_at: SystemTime,
    pub cpu_percent: f64,
    pub mem_percent: f64,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("metrics subsystem unavailable: {0}")]
    Unavailable(String),
    #[error("sampling did not finish within {0:?}")]
    Timeout(Duration),
    #[error("{metric} reading {value} is outside 0..=100")]
    OutOfRange { metric: &'static str, value: f64 },
}

impl ProviderError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "unavailable",
            Self::Timeout(_) => "timeout",
            Self::OutOfRange { .. } => "out_of_range",
        }
    }
}

impl Snapshot {
    pub fn new(taken_at: SystemTime, cpu_percent: f64, mem_percent: f64) -> Self {
        Self {
            taken_at,
            cpu_percent,
            mem_percent,
        }
    }

    pub fn validate(&self) -> Result<(), ProviderError> {
        check_percent("cpu", self.cpu_percent)?;
        check_percent("memory", self.mem_percent)
    }
}

fn check_percent(metric: &'static str, value: f64) -> Result<(), ProviderError> {
    if (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(ProviderError::OutOfRange { metric, value })
    }
}

/// Source of [`Snapshot`]s.
///
/// CPU load is utilization since the previous call, or since the provider
/// was created for the very first call. That first reading has no real
/// baseline and may be `0.0` or an instantaneous figure; callers must not
/// treat it as a measured average.
///
/// Implementations must bound every call and report an expired bound as
/// [`ProviderError::Timeout`] instead of blocking the caller.
#[async_trait]
pub trait MetricsProvider: Send {
    async fn sample(&mut self) -> Result<Snapshot, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_accepts_bounds() {
        let snap = Snapshot::new(SystemTime::UNIX_EPOCH, 0.0, 100.0);
        snap.validate().expect("bounds are inclusive");
    }

    #[test]
    fn validate_rejects_out_of_range_and_nan() {
        let cases = [(101.0, 50.0, "cpu"), (-0.5, 50.0, "cpu"), (10.0, f64::NAN, "memory")];
        for (cpu, mem, expected) in cases {
            let err = Snapshot::new(SystemTime::UNIX_EPOCH, cpu, mem)
                .validate()
                .unwrap_err();
            match err {
                ProviderError::OutOfRange { metric, .. } => assert_eq!(metric, expected),
                other => panic!("unexpected error {other:?}"),
            }
        }
    }

    #[test]
    fn error_kinds_are_distinct() {
        assert_eq!(ProviderError::Unavailable("x".into()).kind(), "unavailable");
        assert_eq!(
            ProviderError::Timeout(Duration::from_secs(1)).kind(),
            "timeout"
        );
        assert_eq!(
            ProviderError::OutOfRange {
                metric: "cpu",
                value: 120.0
            }
            .kind(),
            "out_of_range"
        );
    }
}
