use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Flaky test as reported by the insights API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlakyTest {
    pub test_name: String,
    #[serde(default)]
    pub classname: String,
    pub times_flaky: u64,
    pub pipeline_run: Option<PipelineRun>,
}

/// Most recent pipeline run a flaky test was seen in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub workflow_id: String,
    pub pipeline_id: String,
    pub created_at: DateTime<Utc>,
}

/// Analyzed flakiness for one test.
#[derive(Debug, Clone)]
pub struct FlakyTestMetric {
    pub test_name: String,
    pub classname: String,
    pub times_flaky: u64,
    pub last_occurred: Option<DateTime<Utc>>,
}
