use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShotRecord {
    pub shot: u32,
    pub start_time: i64, // milliseconds since epoch
    pub roundtrip_ms: u64,
    pub success: bool,
    pub failure_reason: Option<String>,
    pub photo_url: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SessionSummary {
    pub total_shots: usize,
    pub uploaded: usize,
    pub failed: usize,
    pub failure_rate: f64,

    // Capture-to-acknowledgement round trip (milliseconds)
    pub roundtrip_min_ms: u64,
    pub roundtrip_max_ms: u64,
    pub roundtrip_avg_ms: f64,

    // Failure reasons breakdown
    pub failure_reasons: HashMap<String, usize>,
}

/// Per-session bookkeeping of capture/upload outcomes.
#[derive(Debug)]
pub struct CaptureStats {
    session_name: String,
    start_time: Instant,
    shots: Vec<ShotRecord>,
}

impl CaptureStats {
    pub fn new(session_name: String) -> Self {
        Self {
            session_name,
            start_time: Instant::now(),
            shots: Vec::new(),
        }
    }

    pub fn record_success(&mut self, shot: u32, roundtrip: Duration, photo_url: String) {
        self.shots.push(ShotRecord {
            shot,
            start_time: Utc::now().timestamp_millis(),
            roundtrip_ms: roundtrip.as_millis() as u64,
            success: true,
            failure_reason: None,
            photo_url: Some(photo_url),
        });
    }

    pub fn record_failure(&mut self, shot: u32, roundtrip: Duration, reason: String) {
        self.shots.push(ShotRecord {
            shot,
            start_time: Utc::now().timestamp_millis(),
            roundtrip_ms: roundtrip.as_millis() as u64,
            success: false,
            failure_reason: Some(reason),
            photo_url: None,
        });
    }

    pub fn summarize(&self) -> SessionSummary {
        let mut summary = SessionSummary::default();

        if self.shots.is_empty() {
            return summary;
        }

        summary.total_shots = self.shots.len();
        summary.uploaded = self.shots.iter().filter(|s| s.success).count();
        summary.failed = self.shots.iter().filter(|s| !s.success).count();
        summary.failure_rate = (summary.failed as f64 / summary.total_shots as f64) * 100.0;

        // Round-trip statistics from successful shots only
        let mut roundtrips: Vec<u64> = self
            .shots
            .iter()
            .filter(|s| s.success)
            .map(|s| s.roundtrip_ms)
            .collect();

        if !roundtrips.is_empty() {
            roundtrips.sort_unstable();
            summary.roundtrip_min_ms = roundtrips[0];
            summary.roundtrip_max_ms = roundtrips[roundtrips.len() - 1];
            summary.roundtrip_avg_ms =
                roundtrips.iter().sum::<u64>() as f64 / roundtrips.len() as f64;
        }

        for shot in self.shots.iter().filter(|s| !s.success) {
            if let Some(reason) = &shot.failure_reason {
                *summary.failure_reasons.entry(reason.clone()).or_insert(0) += 1;
            }
        }

        summary
    }

    pub fn export_to_json<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let summary = self.summarize();

        let output = serde_json::json!({
            "session_name": self.session_name,
            "session_duration_secs": self.start_time.elapsed().as_secs(),
            "summary": summary,
            "shots": self.shots,
        });

        let json_string = serde_json::to_string_pretty(&output)?;
        let mut file = File::create(path)?;
        file.write_all(json_string.as_bytes())?;

        Ok(())
    }
}
