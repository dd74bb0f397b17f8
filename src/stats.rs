use chrono::Duration;

/// Median of a set of duration samples: the middle element for odd counts,
/// the mean of the two central elements for even counts. An empty input
/// yields zero; callers report "no data" off the sample count instead.
pub fn median(samples: &[Duration]) -> Duration {
    if samples.is_empty() {
        return Duration::zero();
    }

    let mut sorted = samples.to_vec();
    sorted.sort();

    let mid = sorted.len() / 2;
    if sorted.len() % 2 != 0 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2
    }
}

/// Arithmetic mean of duration samples; zero for an empty input.
pub fn mean(samples: &[Duration]) -> Duration {
    if samples.is_empty() {
        return Duration::zero();
    }

    let total = samples
        .iter()
        .fold(Duration::zero(), |total, sample| total + *sample);
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    let count = samples.len() as i32;
    total / count
}

/// Median of integer counts, as a fraction so even-sized inputs land
/// between the two central values.
#[allow(clippy::cast_precision_loss)]
pub fn median_count(values: &[u64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_unstable();

    let mid = sorted.len() / 2;
    if sorted.len() % 2 != 0 {
        sorted[mid] as f64
    } else {
        (sorted[mid - 1] + sorted[mid]) as f64 / 2.0
    }
}
