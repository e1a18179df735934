//! Single-slot, overwrite-latest frame handoff
//!
//! The capture thread writes every frame it receives; the processing loop
//! waits for the next one. The slot is not a queue: each write replaces the
//! previous frame, so a slow reader skips frames instead of building a
//! backlog.
//!
//! Writes are synchronous and safe to call from a plain OS thread. Reads are
//! async and wake together: every reader waiting when a write lands observes
//! that write.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use super::frame::RawFrame;

#[derive(Debug, Default)]
struct Slot {
    frame: Option<RawFrame>,
    /// Number of writes so far
    version: u64,
}

/// Latest-frame handoff between one producer and any number of readers
#[derive(Debug, Default)]
pub struct FrameBuffer {
    slot: Mutex<Slot>,
    notify: Notify,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `frame`, replacing any unread frame, and wake every waiting reader
    pub fn write(&self, frame: RawFrame) {
        {
            let mut slot = self.lock();
            slot.frame = Some(frame);
            slot.version += 1;
        }
        self.notify.notify_waiters();
    }

    /// Wait for a write that happens after this call, then return the latest frame
    pub async fn read(&self) -> RawFrame {
        let mut version = self.version();
        self.read_newer(&mut version).await
    }

    /// Wait until the slot holds a frame newer than `version`
    ///
    /// Returns immediately if such a frame is already present. On return
    /// `version` is advanced to the version of the returned frame, so a loop
    /// calling this repeatedly never sees the same frame twice.
    pub async fn read_newer(&self, version: &mut u64) -> RawFrame {
        loop {
            // Register interest before looking at the slot; a write between the
            // two is then either seen below or wakes `notified`.
            let notified = self.notify.notified();

            {
                let slot = self.lock();
                if slot.version > *version {
                    if let Some(frame) = slot.frame.as_ref() {
                        *version = slot.version;
                        return frame.clone();
                    }
                }
            }

            notified.await;
        }
    }

    /// Current frame without waiting
    pub fn latest(&self) -> Option<RawFrame> {
        self.lock().frame.clone()
    }

    /// Number of writes so far
    pub fn version(&self) -> u64 {
        self.lock().version
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        // Slot updates cannot be left half-done, so a poisoned lock is still usable
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use bytes::Bytes;
    use tokio::time::{sleep, timeout};

    use super::*;

    fn frame(sequence: u64) -> RawFrame {
        RawFrame::new(sequence, Bytes::from(vec![sequence as u8; 16]))
    }

    #[tokio::test]
    async fn test_read_waits_for_next_write() {
        let buffer = Arc::new(FrameBuffer::new());

        let reader = {
            let buffer = Arc::clone(&buffer);
            tokio::spawn(async move { buffer.read().await })
        };
        sleep(Duration::from_millis(10)).await;

        buffer.write(frame(1));

        let received = timeout(Duration::from_secs(1), reader)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.sequence, 1);
        assert_eq!(received.data, Bytes::from(vec![1u8; 16]));
    }

    #[tokio::test]
    async fn test_read_ignores_frames_written_before_waiting() {
        let buffer = Arc::new(FrameBuffer::new());
        buffer.write(frame(1));

        // Nothing new arrives, so the read must keep waiting
        let pending = timeout(Duration::from_millis(30), buffer.read()).await;
        assert!(pending.is_err());

        let reader = {
            let buffer = Arc::clone(&buffer);
            tokio::spawn(async move { buffer.read().await })
        };
        sleep(Duration::from_millis(10)).await;
        buffer.write(frame(2));

        let received = timeout(Duration::from_secs(1), reader)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.sequence, 2);
    }

    #[tokio::test]
    async fn test_all_waiting_readers_observe_same_write() {
        let buffer = Arc::new(FrameBuffer::new());

        let readers: Vec<_> = (0..3)
            .map(|_| {
                let buffer = Arc::clone(&buffer);
                tokio::spawn(async move { buffer.read().await })
            })
            .collect();
        sleep(Duration::from_millis(10)).await;

        buffer.write(frame(9));

        for reader in readers {
            let received = timeout(Duration::from_secs(1), reader)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(received.sequence, 9);
        }
    }

    #[tokio::test]
    async fn test_write_overwrites_unread_frame() {
        let buffer = FrameBuffer::new();
        buffer.write(frame(1));
        buffer.write(frame(2));

        assert_eq!(buffer.version(), 2);
        assert_eq!(buffer.latest().unwrap().sequence, 2);

        // A cursor behind both writes only gets the newest one
        let mut version = 0;
        let received = buffer.read_newer(&mut version).await;
        assert_eq!(received.sequence, 2);
        assert_eq!(version, 2);
    }

    #[tokio::test]
    async fn test_read_newer_never_repeats_a_frame() {
        let buffer = FrameBuffer::new();
        buffer.write(frame(1));

        let mut version = 0;
        assert_eq!(buffer.read_newer(&mut version).await.sequence, 1);

        let repeat = timeout(Duration::from_millis(30), buffer.read_newer(&mut version)).await;
        assert!(repeat.is_err());
    }

    #[tokio::test]
    async fn test_write_from_os_thread() {
        let buffer = Arc::new(FrameBuffer::new());

        let reader = {
            let buffer = Arc::clone(&buffer);
            tokio::spawn(async move {
                let mut version = 0;
                let first = buffer.read_newer(&mut version).await;
                let second = buffer.read_newer(&mut version).await;
                (first.sequence, second.sequence)
            })
        };

        let writer = {
            let buffer = Arc::clone(&buffer);
            std::thread::spawn(move || {
                buffer.write(frame(1));
                std::thread::sleep(Duration::from_millis(20));
                buffer.write(frame(2));
            })
        };

        let (first, second) = timeout(Duration::from_secs(1), reader)
            .await
            .unwrap()
            .unwrap();
        writer.join().unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[test]
    fn test_empty_buffer() {
        let buffer = FrameBuffer::new();
        assert!(buffer.latest().is_none());
        assert_eq!(buffer.version(), 0);
    }
}
