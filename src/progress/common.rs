use crate::progress::Reporter;
use crate::types::{ByteSize, Result};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Point-in-time view of an active transfer, for display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub uploaded_bytes: u64,
    pub total_bytes: u64,
    pub eta_seconds: Option<f64>,
}

/// Byte-level progress shared by all part-upload workers.
///
/// The uploaded counter only ever grows and is clamped to the total, so
/// display code never sees a regression regardless of the order in which
/// worker completions land. The ETA uses the cumulative average rate since
/// the transfer started; once the transfer leaves the uploading phase the
/// ETA is gone for good.
#[derive(Clone)]
pub struct TransferProgress {
    reporter: Reporter,
    session_id: String,
    step_number: u8,
    total_bytes: u64,
    start_time: Instant,
    uploaded_bytes: Arc<AtomicU64>,
    uploading_done: Arc<AtomicBool>,
}

impl TransferProgress {
    pub fn new(reporter: Reporter, session_id: String, step_number: u8, total_bytes: u64) -> Self {
        Self {
            reporter,
            session_id,
            step_number,
            total_bytes,
            start_time: Instant::now(),
            uploaded_bytes: Arc::new(AtomicU64::new(0)),
            uploading_done: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn new_noop(total_bytes: u64) -> Self {
        Self::new(Reporter::new_noop(), String::new(), 0, total_bytes)
    }

    /// Records a completed part. Returns the clamped running total.
    pub fn record_part_bytes(&self, bytes: u64) -> Result<u64> {
        let previous = self
            .uploaded_bytes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                Some(current.saturating_add(bytes).min(self.total_bytes))
            })
            .unwrap_or(0);
        let uploaded = previous.saturating_add(bytes).min(self.total_bytes);

        let progress_percent = if self.total_bytes > 0 {
            (uploaded as f64 / self.total_bytes as f64 * 100.0).min(100.0)
        } else {
            100.0
        };

        let speed_str = ProgressFormat::format_speed(self.bytes_per_second(uploaded));
        let eta_str = ProgressFormat::format_eta_seconds(self.eta_seconds())
            .unwrap_or_else(|| "--".to_string());

        let detail = format!(
            "{} / {} {} @ {} (ETA {})",
            ByteSize::new(uploaded),
            ByteSize::new(self.total_bytes),
            ProgressFormat::format_percent(progress_percent),
            speed_str,
            eta_str
        );

        self.reporter.step_progress(
            self.session_id.clone(),
            self.step_number,
            progress_percent,
            Some(detail),
        )?;

        Ok(uploaded)
    }

    /// Marks the uploading phase finished: counter pinned to the total and
    /// no further ETA.
    pub fn finish_uploading(&self) {
        self.uploaded_bytes.store(self.total_bytes, Ordering::SeqCst);
        self.uploading_done.store(true, Ordering::SeqCst);
    }

    fn bytes_per_second(&self, uploaded: u64) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            uploaded as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Remaining seconds at the cumulative average rate. `None` until at
    /// least one byte landed and measurable time has passed, and `None`
    /// again after the uploading phase ends.
    pub fn eta_seconds(&self) -> Option<f64> {
        if self.uploading_done.load(Ordering::SeqCst) {
            return None;
        }
        let uploaded = self.uploaded_bytes.load(Ordering::SeqCst);
        if uploaded == 0 {
            return None;
        }
        let rate = self.bytes_per_second(uploaded);
        if rate <= 0.0 {
            return None;
        }
        Some(self.total_bytes.saturating_sub(uploaded) as f64 / rate)
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            uploaded_bytes: self.uploaded_bytes.load(Ordering::SeqCst),
            total_bytes: self.total_bytes,
            eta_seconds: self.eta_seconds(),
        }
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn uploaded_bytes(&self) -> u64 {
        self.uploaded_bytes.load(Ordering::SeqCst)
    }
}

pub struct ProgressFormat;

impl ProgressFormat {
    pub fn format_speed(bytes_per_second: f64) -> String {
        if bytes_per_second < 1024.0 {
            format!("{:.1} B/s", bytes_per_second)
        } else if bytes_per_second < 1024.0 * 1024.0 {
            format!("{:.1} KB/s", bytes_per_second / 1024.0)
        } else if bytes_per_second < 1024.0 * 1024.0 * 1024.0 {
            format!("{:.1} MB/s", bytes_per_second / (1024.0 * 1024.0))
        } else {
            format!("{:.1} GB/s", bytes_per_second / (1024.0 * 1024.0 * 1024.0))
        }
    }

    /// Human ETA: "a few seconds", "40 sec", "2 min 5 sec", "1 hr 10 min".
    pub fn format_eta_seconds(eta: Option<f64>) -> Option<String> {
        let eta = eta?;
        if !eta.is_finite() || eta < 0.0 {
            return None;
        }
        let s = eta.round() as u64;
        if s == 0 {
            return Some("a few seconds".to_string());
        }
        if s < 60 {
            return Some(format!("{s} sec"));
        }
        let m = s / 60;
        let rem_s = s % 60;
        if m < 60 {
            if rem_s == 0 {
                return Some(format!("{m} min"));
            }
            return Some(format!("{m} min {rem_s} sec"));
        }
        let h = m / 60;
        let rem_m = m % 60;
        if rem_m == 0 {
            return Some(format!("{h} hr"));
        }
        Some(format!("{h} hr {rem_m} min"))
    }

    pub fn format_percent(value: f64) -> String {
        format!("{:>3.0}%", value.clamp(0.0, 100.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_is_monotone_and_clamped() {
        let progress = TransferProgress::new_noop(100);
        assert_eq!(progress.record_part_bytes(40).unwrap(), 40);
        assert_eq!(progress.record_part_bytes(40).unwrap(), 80);
        // Over-reporting never pushes past the total.
        assert_eq!(progress.record_part_bytes(40).unwrap(), 100);
        assert_eq!(progress.uploaded_bytes(), 100);
    }

    #[test]
    fn test_eta_is_none_until_bytes_arrive() {
        let progress = TransferProgress::new_noop(100);
        assert!(progress.eta_seconds().is_none());

        std::thread::sleep(std::time::Duration::from_millis(10));
        progress.record_part_bytes(50).unwrap();
        assert!(progress.eta_seconds().is_some());
    }

    #[test]
    fn test_eta_is_cleared_after_uploading_ends() {
        let progress = TransferProgress::new_noop(100);
        std::thread::sleep(std::time::Duration::from_millis(10));
        progress.record_part_bytes(50).unwrap();
        assert!(progress.eta_seconds().is_some());

        progress.finish_uploading();
        assert!(progress.eta_seconds().is_none());
        assert_eq!(progress.uploaded_bytes(), 100);
        assert_eq!(progress.snapshot().eta_seconds, None);
    }

    #[test]
    fn test_progress_format_speed() {
        assert_eq!(ProgressFormat::format_speed(512.0), "512.0 B/s");
        assert_eq!(ProgressFormat::format_speed(1536.0), "1.5 KB/s");
        assert_eq!(ProgressFormat::format_speed(1572864.0), "1.5 MB/s");
    }

    #[test]
    fn test_format_eta_seconds() {
        assert_eq!(
            ProgressFormat::format_eta_seconds(Some(0.2)).unwrap(),
            "a few seconds"
        );
        assert_eq!(ProgressFormat::format_eta_seconds(Some(42.0)).unwrap(), "42 sec");
        assert_eq!(
            ProgressFormat::format_eta_seconds(Some(125.0)).unwrap(),
            "2 min 5 sec"
        );
        assert_eq!(
            ProgressFormat::format_eta_seconds(Some(3600.0)).unwrap(),
            "1 hr"
        );
        assert_eq!(
            ProgressFormat::format_eta_seconds(Some(4200.0)).unwrap(),
            "1 hr 10 min"
        );
        assert!(ProgressFormat::format_eta_seconds(None).is_none());
        assert!(ProgressFormat::format_eta_seconds(Some(f64::NAN)).is_none());
    }

    #[test]
    fn test_progress_format_percent() {
        assert_eq!(ProgressFormat::format_percent(50.0), " 50%");
        assert_eq!(ProgressFormat::format_percent(150.0), "100%");
    }
}
