use std::future::Future;
use std::time::{Duration, Instant};

/// Runs `fut` and returns its output together with the elapsed wall time.
pub async fn timed<F: Future>(fut: F) -> (F::Output, Duration) {
    let start = Instant::now();
    let output = fut.await;
    (output, start.elapsed())
}

/// Formats a byte count with binary-unit steps (B, KiB, MiB, GiB).
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_counts_stay_in_bytes() {
        assert_eq!(human_bytes(0), "0 B");
        assert_eq!(human_bytes(512), "512 B");
        assert_eq!(human_bytes(1023), "1023 B");
    }

    #[test]
    fn unit_steps() {
        assert_eq!(human_bytes(1024), "1.0 KiB");
        assert_eq!(human_bytes(2048), "2.0 KiB");
        assert_eq!(human_bytes(8 * 1024 * 1024), "8.0 MiB");
        assert_eq!(human_bytes(3 * 1024 * 1024 * 1024), "3.0 GiB");
    }

    #[test]
    fn caps_at_largest_unit() {
        let five_tib = 5 * 1024u64.pow(4);
        assert_eq!(human_bytes(five_tib), "5120.0 GiB");
    }

    #[tokio::test]
    async fn timed_measures_and_passes_output_through() {
        let (value, duration) = timed(async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            42
        })
        .await;
        assert_eq!(value, 42);
        assert!(duration >= Duration::from_millis(10));
    }
}
