//! Recording start/stop interface.
//!
//! Recording to disk is owned by the acquisition software. The runner only
//! needs to start a file when the experiment begins and stop it at the end.

use super::driver::ArrayError;
use std::path::{Path, PathBuf};
use tracing::info;

/// Starts and stops a recording.
pub trait RecordingSaver: Send {
    /// Start recording all routed channels to `path`.
    fn start(&mut self, path: &Path) -> Result<(), ArrayError>;

    /// Stop the current recording. No-op if not recording.
    fn stop(&mut self) -> Result<(), ArrayError>;
}

/// Saver that records nothing but remembers the requested path.
#[derive(Debug, Default)]
pub struct EmptyRecordingSaver {
    current: Option<PathBuf>,
}

impl EmptyRecordingSaver {
    /// Create an idle saver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Path of the active (pretend) recording.
    pub fn current(&self) -> Option<&Path> {
        self.current.as_deref()
    }
}

impl RecordingSaver for EmptyRecordingSaver {
    fn start(&mut self, path: &Path) -> Result<(), ArrayError> {
        info!("Recording disabled, ignoring start for {:?}", path);
        self.current = Some(path.to_path_buf());
        Ok(())
    }

    fn stop(&mut self) -> Result<(), ArrayError> {
        self.current = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_saver_tracks_start_stop() {
        let mut saver = EmptyRecordingSaver::new();
        assert!(saver.current().is_none());
        saver.start(Path::new("/tmp/run.raw.h5")).unwrap();
        assert_eq!(saver.current(), Some(Path::new("/tmp/run.raw.h5")));
        saver.stop().unwrap();
        saver.stop().unwrap();
        assert!(saver.current().is_none());
    }
}
