use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Scoped registry of temp paths created during a single job. Every path
/// registered is removed when the registry is dropped, on every exit path
/// including an early return, cancellation, or an unwinding panic.
#[derive(Default)]
pub struct CleanupRegistry {
    paths: Mutex<Vec<PathBuf>>,
}

impl CleanupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&self, path: impl Into<PathBuf>) {
        self.paths.lock().unwrap_or_else(|e| e.into_inner()).push(path.into());
    }

    pub fn tracked_count(&self) -> usize {
        self.paths.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn remove_all(&self) {
        let paths = std::mem::take(&mut *self.paths.lock().unwrap_or_else(|e| e.into_inner()));
        for path in paths {
            remove_path(&path);
        }
    }
}

fn remove_path(path: &Path) {
    if path.is_dir() {
        let _ = std::fs::remove_dir_all(path);
    } else {
        let _ = std::fs::remove_file(path);
    }
}

impl Drop for CleanupRegistry {
    fn drop(&mut self) {
        self.remove_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracked_file_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("scratch.bin");
        std::fs::write(&file, b"x").unwrap();

        {
            let registry = CleanupRegistry::new();
            registry.track(&file);
            assert!(file.exists());
        }

        assert!(!file.exists());
    }

    #[test]
    fn cleanup_runs_even_when_scope_panics() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("scratch.bin");
        std::fs::write(&file, b"x").unwrap();
        let file_for_thread = file.clone();

        let _ = std::thread::spawn(move || {
            let registry = CleanupRegistry::new();
            registry.track(&file_for_thread);
            panic!("simulated worker panic");
        })
        .join();

        assert!(!file.exists());
    }
}
