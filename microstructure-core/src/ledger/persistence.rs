//! Outcome record persistence.
//!
//! Generalizes `execution::journal::AsyncJournal`'s bounded-channel,
//! dedicated-writer-thread shape to multiple destination files instead of
//! one: each flushed batch carries its own `(path, line)` pairs so writes to
//! `detector_A/validation_2026-07-28.jsonl` and `detector_B/rejections_...`
//! share one writer thread without contending on a single file handle.

use crossbeam::channel::{bounded, Receiver, Sender};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::thread;
use tracing::{error, info, warn};

pub struct OutcomeWriter {
    sender: Option<Sender<Vec<(PathBuf, String)>>>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl OutcomeWriter {
    pub fn new() -> Self {
        let (sender, receiver) = bounded(256);
        let handle = thread::spawn(move || Self::writer_loop(receiver));
        Self {
            sender: Some(sender),
            thread_handle: Some(handle),
        }
    }

    fn writer_loop(receiver: Receiver<Vec<(PathBuf, String)>>) {
        for batch in receiver {
            for (path, line) in batch {
                if let Some(parent) = path.parent() {
                    if let Err(e) = std::fs::create_dir_all(parent) {
                        error!("failed to create outcome directory {:?}: {}", parent, e);
                        continue;
                    }
                }
                if let Err(e) = Self::append_line(&path, &line) {
                    warn!("outcome write failed for {:?}, retrying once: {}", path, e);
                    if let Err(e2) = Self::append_line(&path, &line) {
                        error!("dropping outcome record for {:?} after retry: {}", path, e2);
                    }
                }
            }
        }
        info!("outcome writer thread stopping");
    }

    fn append_line(path: &std::path::Path, line: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", line)
    }

    /// Send a batch to the writer thread. Non-blocking: if the channel is
    /// full the batch is dropped and logged, never stalling the caller.
    pub fn flush_batch(&self, batch: Vec<(PathBuf, String)>) {
        if batch.is_empty() {
            return;
        }
        if let Some(sender) = &self.sender {
            if let Err(e) = sender.try_send(batch) {
                error!("outcome writer buffer full or disconnected, dropping batch: {}", e);
            }
        }
    }
}

impl Default for OutcomeWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for OutcomeWriter {
    fn drop(&mut self) {
        let _ = self.sender.take();
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufRead;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn writes_batched_lines_to_their_own_files() {
        let dir = tempdir().unwrap();
        let writer = OutcomeWriter::new();
        let path_a = dir.path().join("a.jsonl");
        let path_b = dir.path().join("b.jsonl");
        writer.flush_batch(vec![
            (path_a.clone(), "{\"x\":1}".to_string()),
            (path_b.clone(), "{\"y\":2}".to_string()),
        ]);
        drop(writer);

        let read_lines = |p: &std::path::Path| -> Vec<String> {
            let file = std::fs::File::open(p).unwrap();
            std::io::BufReader::new(file)
                .lines()
                .collect::<Result<_, _>>()
                .unwrap()
        };
        assert_eq!(read_lines(&path_a), vec!["{\"x\":1}".to_string()]);
        assert_eq!(read_lines(&path_b), vec!["{\"y\":2}".to_string()]);
        let _ = Duration::from_secs(0);
    }
}
