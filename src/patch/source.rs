use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use rtrb::{Consumer, RingBuffer};

use super::{Patch, PatchError};

/// Human-visible marker appended to a patch artifact that failed to compile.
/// The previous patch stays active while the marker is present; it is
/// stripped from the file as soon as the artifact compiles again.
pub const INVALID_MARKER: &str = "\n\
//==========================//\n\
// This patch is not valid  //\n\
//==========================//\n";

/// The watched patch source artifact.
///
/// `poll` detects changes by comparing raw file content against the last seen
/// text, the cheapest fingerprint that also catches editors which rewrite
/// without bumping mtime. All file I/O lives here, off the render thread.
pub struct PatchSource {
    path: PathBuf,
    cached: String,
}

impl PatchSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached: String::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Forget the cached text so the next poll re-reads and re-emits.
    pub fn forget(&mut self) {
        self.cached.clear();
    }

    /// Check the artifact for changes.
    ///
    /// Returns `None` when nothing changed (or the file is momentarily
    /// unreadable), `Some(Ok)` with a freshly compiled patch, or `Some(Err)`
    /// after annotating the artifact with [`INVALID_MARKER`].
    pub fn poll(&mut self) -> Option<Result<Patch, PatchError>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) => {
                log::warn!("patch source {:?} unreadable: {err}", self.path);
                return None;
            }
        };
        if text == self.cached {
            return None;
        }
        self.cached = text.clone();

        // The marker itself is not part of the definition; strip it before
        // compiling so an annotated file can be fixed in place.
        let clean = text.replace(INVALID_MARKER, "");
        match Patch::from_source(&clean) {
            Ok(patch) => {
                if clean != text {
                    match fs::write(&self.path, &clean) {
                        Ok(()) => self.cached = clean,
                        Err(err) => log::warn!("could not strip invalid marker: {err}"),
                    }
                }
                Some(Ok(patch))
            }
            Err(err) => {
                if !text.contains(INVALID_MARKER) {
                    if let Err(write_err) = append_marker(&self.path) {
                        log::warn!("could not annotate invalid patch: {write_err}");
                    } else {
                        self.cached.push_str(INVALID_MARKER);
                    }
                }
                Some(Err(err))
            }
        }
    }
}

fn append_marker(path: &Path) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new().append(true).open(path)?;
    file.write_all(INVALID_MARKER.as_bytes())
}

/// Background thread that polls a patch artifact and ships compiled patches
/// to the render thread over a bounded SPSC queue.
///
/// Recompilation (file I/O, parsing, validation) happens entirely on this
/// thread; the render thread's periodic check is a non-blocking queue pop, so
/// only the swap itself touches the audio path.
pub struct PatchWatcher {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PatchWatcher {
    pub fn spawn(path: impl Into<PathBuf>, period: Duration) -> (Self, Consumer<Patch>) {
        let (mut tx, rx) = RingBuffer::<Patch>::new(4);
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let mut source = PatchSource::new(path);

        let handle = std::thread::spawn(move || {
            while !stop_flag.load(Ordering::Relaxed) {
                match source.poll() {
                    Some(Ok(patch)) => {
                        log::info!("patch source compiled, queueing swap");
                        if tx.push(patch).is_err() {
                            // Queue full: re-emit on the next poll rather than
                            // silently losing the newest edit.
                            log::warn!("patch queue full, retrying");
                            source.forget();
                        }
                    }
                    Some(Err(err)) => log::warn!("patch rejected: {err}"),
                    None => {}
                }
                std::thread::sleep(period);
            }
        });

        (
            Self {
                stop,
                handle: Some(handle),
            },
            rx,
        )
    }

    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for PatchWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
