// ===============================
// src/recorder.rs
// ===============================
//
// Lightweight JSONL event log:
// - one serde_json line per Event, appended to the target file
// - BufWriter to keep syscalls down, flush every 1000 events and on drop
// - parent directory created on demand
// - serialize failures skip the event, they never stop the run
//
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::Utc;
use tracing::{error, info};

use crate::domain::Event;

const FLUSH_EVERY_N_EVENTS: u32 = 1000;

pub struct Recorder {
    writer: BufWriter<File>,
    since_last_flush: u32,
}

impl Recorder {
    pub fn create(path: &str) -> std::io::Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        info!(%path, "recorder started");

        let mut rec = Self { writer: BufWriter::new(file), since_last_flush: 0 };
        rec.record(&Event::Note(format!("run started {}", Utc::now().to_rfc3339())));
        Ok(rec)
    }

    pub fn record(&mut self, event: &Event) {
        let line = match serde_json::to_string(event) {
            Ok(s) => s,
            Err(e) => {
                error!(?e, "recorder serialize error, skipping event");
                return;
            }
        };

        if let Err(e) = self.writer.write_all(line.as_bytes()).and_then(|_| self.writer.write_all(b"\n")) {
            error!(?e, "recorder write failed, dropping event");
            return;
        }

        self.since_last_flush += 1;
        if self.since_last_flush >= FLUSH_EVERY_N_EVENTS {
            let _ = self.writer.flush();
            self.since_last_flush = 0;
        }
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}
