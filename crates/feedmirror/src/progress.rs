use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use feedmirror_fetch::{FetchPhase, Progress, ProgressCallback};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing_subscriber::fmt::MakeWriter;

const PB_STYLE: &str = "{spinner:.blue} {msg} {wide_bar:.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";

const TICK: &str = "⠁⠂⠄⡀⢀⠠⠐⠈ ";

const PB_CHARS: &str = "█▓▒░  ";

fn style() -> ProgressStyle {
    match ProgressStyle::with_template(PB_STYLE) {
        Ok(style) => style.tick_chars(TICK).progress_chars(PB_CHARS),
        Err(_) => ProgressStyle::default_bar(),
    }
}

/// One bar per download, drawn on stderr and cleared once the fetch ends.
///
/// Also serves as the log writer, so log lines never tear through a bar.
#[derive(Clone)]
pub struct DownloadTracker {
    current: Arc<Mutex<Option<ProgressBar>>>,
    hidden:  bool,
}

impl DownloadTracker {
    pub fn new(hidden: bool) -> Self {
        Self {
            current: Arc::default(),
            hidden,
        }
    }

    pub fn callback(&self) -> ProgressCallback {
        let tracker = self.clone();
        Arc::new(move |progress: &Progress| tracker.update(progress))
    }

    fn update(&self, progress: &Progress) {
        let Ok(mut current) = self.current.lock() else {
            return;
        };
        match progress.phase {
            FetchPhase::Connecting => {
                if let Some(stale) = current.take() {
                    stale.finish_and_clear();
                }
                *current = Some(self.start(progress));
            }
            FetchPhase::Downloading => {
                if let Some(pb) = current.as_ref() {
                    if let Some(total) = progress.total_bytes {
                        pb.set_length(total);
                    }
                    pb.set_position(progress.bytes_downloaded);
                }
            }
            FetchPhase::Committing => {}
            FetchPhase::Completed | FetchPhase::Failed => {
                if let Some(pb) = current.take() {
                    pb.finish_and_clear();
                }
            }
        }
    }

    fn start(&self, progress: &Progress) -> ProgressBar {
        let pb = match progress.total_bytes {
            Some(len) => ProgressBar::new(len),
            None => ProgressBar::no_length(),
        };
        if self.hidden {
            pb.set_draw_target(ProgressDrawTarget::hidden());
        }
        pb.set_style(style());
        let name = progress.url.rsplit('/').next().unwrap_or(&progress.url);
        pb.set_message(name.to_string());
        pb
    }

    #[cfg(test)]
    fn active(&self) -> Option<u64> {
        self.current.lock().ok()?.as_ref().map(ProgressBar::position)
    }
}

impl<'a> MakeWriter<'a> for DownloadTracker {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            bar:    self.current.lock().ok().and_then(|current| current.clone()),
            buffer: Vec::new(),
        }
    }
}

/// Buffers one log event and prints it to stderr with the active bar suspended.
pub struct LogWriter {
    bar:    Option<ProgressBar>,
    buffer: Vec<u8>,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> { Ok(()) }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let emit = || {
            let _ = io::stderr().write_all(&self.buffer);
        };
        match &self.bar {
            Some(bar) => bar.suspend(emit),
            None => emit(),
        }
    }
}
