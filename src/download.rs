use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::error::Result;

/// Transfer buffer size used by the broker's own reference client.
pub const CHUNK_SIZE: usize = 64_738;

/// Progress bar width in characters.
const BAR_WIDTH: usize = 50;

/// Byte-count milestone spacing when the total length is unknown.
const MILESTONE_BYTES: u64 = 1024 * 1024;

/// Floor for elapsed seconds when deriving throughput, so a chunk that lands
/// before the clock ticks cannot divide by zero.
const MIN_ELAPSED_SECS: f64 = 1e-6;

/// Outcome of one completed transfer.
#[derive(Debug, Clone)]
pub struct DownloadReport {
    pub path: PathBuf,
    pub bytes: u64,
    pub elapsed: Duration,
}

/// Per-chunk progress sink for a streamed transfer.
pub trait Progress {
    /// Called after each chunk lands. `total` is the expected body length when
    /// the broker advertised one.
    fn on_chunk(&mut self, downloaded: u64, total: Option<u64>, elapsed: Duration);

    fn on_finish(&mut self, downloaded: u64, elapsed: Duration) {
        let _ = (downloaded, elapsed);
    }
}

/// No-op progress sink.
#[derive(Debug, Default)]
pub struct Silent;

impl Progress for Silent {
    fn on_chunk(&mut self, _downloaded: u64, _total: Option<u64>, _elapsed: Duration) {}
}

/// Textual progress on stderr: a 50-character bar with percentage and
/// throughput when the total is known, 1 MiB byte-count milestones otherwise.
#[derive(Debug, Default)]
pub struct TextProgress {
    last_cells: usize,
    last_milestone: u64,
    drew_bar: bool,
}

impl TextProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Progress for TextProgress {
    fn on_chunk(&mut self, downloaded: u64, total: Option<u64>, elapsed: Duration) {
        let secs = elapsed.as_secs_f64().max(MIN_ELAPSED_SECS);
        let rate = downloaded as f64 / secs;

        match total {
            Some(t) if t > 0 => {
                let frac = (downloaded as f64 / t as f64).min(1.0);
                let cells = (frac * BAR_WIDTH as f64) as usize;
                if cells == self.last_cells && self.drew_bar {
                    return;
                }
                self.last_cells = cells;
                self.drew_bar = true;
                eprint!(
                    "\r[{}{}] {:5.1}% {}/s",
                    "#".repeat(cells),
                    "-".repeat(BAR_WIDTH - cells),
                    frac * 100.0,
                    human_bytes(rate as u64),
                );
                let _ = std::io::stderr().flush();
            }
            _ => {
                let milestone = downloaded / MILESTONE_BYTES;
                if milestone > self.last_milestone {
                    self.last_milestone = milestone;
                    eprintln!("... {} ({}/s)", human_bytes(downloaded), human_bytes(rate as u64));
                }
            }
        }
    }

    fn on_finish(&mut self, downloaded: u64, elapsed: Duration) {
        if self.drew_bar {
            eprintln!();
        }
        let secs = elapsed.as_secs_f64().max(MIN_ELAPSED_SECS);
        eprintln!(
            "{} in {:.1}s ({}/s)",
            human_bytes(downloaded),
            elapsed.as_secs_f64(),
            human_bytes((downloaded as f64 / secs) as u64),
        );
    }
}

/// Human-readable byte count (binary units).
pub fn human_bytes(n: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = n as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{n} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

/// Stream `source` to `dest` in fixed-size chunks.
///
/// Never buffers the whole body: reads up to [`CHUNK_SIZE`] bytes at a time
/// and writes each chunk as it arrives, reporting progress after every chunk.
pub fn stream_to_file<R: Read>(
    mut source: R,
    dest: &Path,
    expected_len: Option<u64>,
    progress: &mut dyn Progress,
) -> Result<DownloadReport> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(dest)?;

    let started = Instant::now();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut downloaded: u64 = 0;

    loop {
        let n = source.read(&mut buf)?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n])?;
        downloaded += n as u64;
        progress.on_chunk(downloaded, expected_len, started.elapsed());
    }

    file.flush()?;
    let elapsed = started.elapsed();
    progress.on_finish(downloaded, elapsed);

    Ok(DownloadReport {
        path: dest.to_path_buf(),
        bytes: downloaded,
        elapsed,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    /// Records every on_chunk call.
    #[derive(Default)]
    struct Recording {
        chunks: Vec<u64>,
        finished: Option<u64>,
    }

    impl Progress for Recording {
        fn on_chunk(&mut self, downloaded: u64, _total: Option<u64>, _elapsed: Duration) {
            self.chunks.push(downloaded);
        }

        fn on_finish(&mut self, downloaded: u64, _elapsed: Duration) {
            self.finished = Some(downloaded);
        }
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn writes_source_bytes_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");
        // Three full chunks plus a ragged tail.
        let body = pattern(CHUNK_SIZE * 3 + 517);

        let mut progress = Recording::default();
        let report = stream_to_file(
            Cursor::new(body.clone()),
            &dest,
            Some(body.len() as u64),
            &mut progress,
        )
        .unwrap();

        assert_eq!(report.bytes, body.len() as u64);
        assert_eq!(std::fs::read(&dest).unwrap(), body);
        assert!(report.elapsed > Duration::ZERO);
        assert_eq!(progress.finished, Some(body.len() as u64));
        // Cumulative counters are monotonic and end at the body length.
        assert!(progress.chunks.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(progress.chunks.last(), Some(&(body.len() as u64)));
    }

    #[test]
    fn empty_body_writes_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("empty.bin");
        let mut progress = Silent;
        let report = stream_to_file(Cursor::new(Vec::new()), &dest, Some(0), &mut progress).unwrap();
        assert_eq!(report.bytes, 0);
        assert_eq!(std::fs::metadata(&dest).unwrap().len(), 0);
    }

    #[test]
    fn text_progress_survives_zero_elapsed() {
        // Guard on the throughput division: must not panic or produce inf.
        let mut p = TextProgress::new();
        p.on_chunk(CHUNK_SIZE as u64, Some(CHUNK_SIZE as u64 * 2), Duration::ZERO);
        p.on_chunk(1024, None, Duration::ZERO);
        p.on_finish(CHUNK_SIZE as u64, Duration::ZERO);
    }

    #[test]
    fn human_bytes_units() {
        assert_eq!(human_bytes(512), "512 B");
        assert_eq!(human_bytes(2048), "2.0 KiB");
        assert_eq!(human_bytes(14_996_696), "14.3 MiB");
    }
}
