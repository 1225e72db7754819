// Lecteur d'acquittements - drains device replies in the background
// Replies are free text, logged only, never used for control flow

use crate::device::status::{AtomicDeviceStatus, DeviceStatus};
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

/// Background thread reading acknowledgement lines from the device
pub struct AckReader {
    lines_read: Arc<AtomicU64>,
    thread: Option<thread::JoinHandle<()>>,
}

impl AckReader {
    /// Spawn the reader on the read half of the device stream
    ///
    /// The thread exits on EOF or on a read error and marks the device
    /// disconnected.
    pub fn spawn<R>(reader: R, status: AtomicDeviceStatus) -> Self
    where
        R: Read + Send + 'static,
    {
        let lines_read = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&lines_read);

        let thread = thread::spawn(move || {
            let mut reader = BufReader::new(reader);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf) {
                    Ok(0) => break,
                    Ok(_) => {
                        counter.fetch_add(1, Ordering::Relaxed);
                        // Serial noise is not valid UTF-8, replies are only logged
                        let text = String::from_utf8_lossy(&buf);
                        let line = text.trim_end();
                        if !line.is_empty() {
                            log::debug!("Device: {}", line);
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => {
                        log::error!("Device read failed: {}", e);
                        status.set(DeviceStatus::Error);
                        return;
                    }
                }
            }

            log::warn!("Device stream closed");
            status.set(DeviceStatus::Disconnected);
        });

        Self {
            lines_read,
            thread: Some(thread),
        }
    }

    /// Number of lines received so far
    pub fn lines_read(&self) -> u64 {
        self.lines_read.load(Ordering::Relaxed)
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(|t| t.is_finished())
    }

    /// Wait for the reader to hit EOF
    pub fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
