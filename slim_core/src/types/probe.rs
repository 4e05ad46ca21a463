//! Probe measurement results.
//!
//! Content probes are best-effort: "we did not try" and "we tried and it
//! failed" are different signals for prediction confidence, so probes
//! return a three-state value instead of a nullable float.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "value")]
pub enum ProbeValue {
    /// Probe was not applicable or never attempted.
    #[default]
    Unmeasured,
    /// Probe ran and failed; treated as absent but lowers confidence.
    Failed,
    /// Probe produced a measurement.
    Value(f64),
}

impl ProbeValue {
    /// Wraps a fallible probe so failures become `Failed` instead of
    /// propagating. This is the single point where the swallow policy
    /// lives.
    pub fn from_result<E>(result: std::result::Result<f64, E>) -> Self {
        match result {
            Ok(v) => ProbeValue::Value(v),
            Err(_) => ProbeValue::Failed,
        }
    }

    pub fn from_option(option: Option<f64>) -> Self {
        match option {
            Some(v) => ProbeValue::Value(v),
            None => ProbeValue::Failed,
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            ProbeValue::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_measured(self) -> bool {
        matches!(self, ProbeValue::Value(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmeasured_is_default() {
        assert_eq!(ProbeValue::default(), ProbeValue::Unmeasured);
        assert!(ProbeValue::default().value().is_none());
    }

    #[test]
    fn test_failed_and_zero_are_distinct() {
        let failed = ProbeValue::Failed;
        let zero = ProbeValue::Value(0.0);
        assert_ne!(failed, zero);
        assert!(zero.is_measured());
        assert!(!failed.is_measured());
        assert_eq!(zero.value(), Some(0.0));
    }

    #[test]
    fn test_from_result_swallows_errors() {
        let ok: std::result::Result<f64, String> = Ok(0.42);
        let err: std::result::Result<f64, String> = Err("boom".into());
        assert_eq!(ProbeValue::from_result(ok), ProbeValue::Value(0.42));
        assert_eq!(ProbeValue::from_result(err), ProbeValue::Failed);
    }
}
