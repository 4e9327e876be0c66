//! Messages exchanged with an isolated context.
//!
//! The outbound message is the 3-tuple `[baseline, {name, code}, millis]`
//! and the inbound message is exactly one `{name, code, ops}`. Durations
//! travel as fractional milliseconds.

use core_types::Test;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The part of a [`Test`] an isolated context needs to see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialTest {
    /// Display label, echoed back in the reply
    pub name: String,
    /// Source text to execute repeatedly
    pub code: String,
}

impl From<&Test> for TrialTest {
    fn from(test: &Test) -> Self {
        Self {
            name: test.name.clone(),
            code: test.code.clone(),
        }
    }
}

/// One request to measure one test.
///
/// # Examples
///
/// ```
/// use core_types::Test;
/// use sandbox::TrialRequest;
/// use std::time::Duration;
///
/// let request = TrialRequest::new("let n = 1", &Test::new("a", "n++"), Duration::from_millis(3));
/// let json = serde_json::to_string(&request).unwrap();
/// assert_eq!(json, r#"["let n = 1",{"name":"a","code":"n++"},3.0]"#);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireRequest", try_from = "WireRequest")]
pub struct TrialRequest {
    /// Setup source run once before measuring
    pub baseline: String,
    /// Test to measure
    pub test: TrialTest,
    /// Wall-clock budget for the measurement loop
    pub duration: Duration,
}

impl TrialRequest {
    /// Build a request for `test` under `baseline`
    pub fn new(baseline: &str, test: &Test, duration: Duration) -> Self {
        Self {
            baseline: baseline.to_string(),
            test: test.into(),
            duration,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct WireRequest(String, TrialTest, f64);

impl From<TrialRequest> for WireRequest {
    fn from(request: TrialRequest) -> Self {
        WireRequest(
            request.baseline,
            request.test,
            request.duration.as_nanos() as f64 / 1_000_000.0,
        )
    }
}

impl TryFrom<WireRequest> for TrialRequest {
    type Error = String;

    fn try_from(WireRequest(baseline, test, millis): WireRequest) -> Result<Self, Self::Error> {
        if !millis.is_finite() || millis < 0.0 {
            return Err(format!("invalid duration {millis}"));
        }
        let duration = Duration::from_nanos((millis * 1_000_000.0).round() as u64);
        Ok(Self {
            baseline,
            test,
            duration,
        })
    }
}
