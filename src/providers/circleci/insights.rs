use super::types::{FlakyTest, FlakyTestMetric};

/// Maps raw flaky tests into report metrics, most flaky first. The sort is
/// stable, so tests with equal counts keep their API order.
pub fn process_flaky_tests(tests: Vec<FlakyTest>) -> Vec<FlakyTestMetric> {
    let mut results: Vec<FlakyTestMetric> = tests
        .into_iter()
        .map(|test| FlakyTestMetric {
            test_name: test.test_name,
            classname: test.classname,
            times_flaky: test.times_flaky,
            last_occurred: test.pipeline_run.map(|run| run.created_at),
        })
        .collect();

    results.sort_by(|a, b| b.times_flaky.cmp(&a.times_flaky));

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::circleci::types::PipelineRun;
    use chrono::{DateTime, Utc};

    fn flaky(name: &str, times: u64) -> FlakyTest {
        FlakyTest {
            test_name: name.to_string(),
            classname: "Suite".to_string(),
            times_flaky: times,
            pipeline_run: None,
        }
    }

    #[test]
    fn test_sorts_most_flaky_first() {
        let tests = vec![flaky("a", 2), flaky("b", 9), flaky("c", 5)];

        let results = process_flaky_tests(tests);

        let names: Vec<&str> = results.iter().map(|r| r.test_name.as_str()).collect();
        assert_eq!(names, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_equal_counts_keep_api_order() {
        let tests = vec![flaky("first", 3), flaky("second", 3), flaky("third", 3)];

        let results = process_flaky_tests(tests);

        let names: Vec<&str> = results.iter().map(|r| r.test_name.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_last_occurred_comes_from_pipeline_run() {
        let seen: DateTime<Utc> = "2024-05-01T10:00:00Z".parse().unwrap();
        let mut test = flaky("a", 1);
        test.pipeline_run = Some(PipelineRun {
            workflow_id: "wf".to_string(),
            pipeline_id: "pl".to_string(),
            created_at: seen,
        });

        let results = process_flaky_tests(vec![test, flaky("b", 1)]);

        assert_eq!(results[0].last_occurred, Some(seen));
        assert_eq!(results[1].last_occurred, None);
    }

    #[test]
    fn test_empty_input_yields_empty_output() {
        assert!(process_flaky_tests(Vec::new()).is_empty());
    }
}
