//! Shared-texture fast path bookkeeping: the import ring that turns
//! engine-exported GPU buffers into sampleable images without copying
//! through system memory.
//!
//! Incoming handles are identified by a stable buffer identity (device +
//! inode of the DMA-BUF fd) so a handle the engine recycles reuses its
//! existing import instead of creating a new one. Imports produced before a
//! resize are discarded during a short cooldown window. Every path that does
//! not complete an import closes the file descriptor (by dropping the
//! owning handle).

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::log;

/// Minimum ring length. Must exceed the web engine's internal buffer pool so
/// a still-in-flight import is never destroyed to make room.
pub const RING_SLOTS: usize = 6;

/// Shared-texture frames arriving within this window after a resize were
/// produced at the stale size and are discarded.
pub const RESIZE_COOLDOWN: Duration = Duration::from_millis(150);

/// Import failures tolerated before the fast path is disabled for the
/// session.
pub const MAX_IMPORT_FAILURES: u32 = 3;

/// Stable identity of an incoming shared buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u64);

/// An engine-exported GPU buffer pending import. Owns its file descriptor;
/// dropping the handle closes it.
#[derive(Debug)]
pub struct SharedTextureHandle {
    pub id: BufferId,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub offset: u64,
    pub modifier: u64,
    #[cfg(unix)]
    fd: std::os::fd::OwnedFd,
}

impl SharedTextureHandle {
    /// Wrap a duplicated DMA-BUF fd. The identity is derived from the fd's
    /// device and inode, the same way the engine's own pool is keyed.
    #[cfg(unix)]
    pub fn from_dmabuf(
        fd: std::os::fd::OwnedFd,
        width: u32,
        height: u32,
        stride: u32,
        offset: u64,
        modifier: u64,
    ) -> std::io::Result<Self> {
        use std::os::unix::fs::MetadataExt;
        let meta = std::fs::File::from(fd.try_clone()?).metadata()?;
        let id = BufferId((meta.dev() << 32) | (meta.ino() & 0xFFFF_FFFF));
        Ok(Self {
            id,
            width,
            height,
            stride,
            offset,
            modifier,
            fd,
        })
    }

    /// Borrow the descriptor for the import call.
    #[cfg(unix)]
    pub fn fd(&self) -> std::os::fd::BorrowedFd<'_> {
        use std::os::fd::AsFd;
        self.fd.as_fd()
    }

    #[cfg(test)]
    pub fn for_tests(id: u64, width: u32, height: u32) -> Self {
        #[cfg(unix)]
        let fd = {
            use std::os::fd::OwnedFd;
            let file = std::fs::File::open("/dev/null").expect("open /dev/null");
            OwnedFd::from(file)
        };
        Self {
            id: BufferId(id),
            width,
            height,
            stride: width * 4,
            offset: 0,
            modifier: 0,
            #[cfg(unix)]
            fd,
        }
    }
}

/// FIFO queue the engine's accelerated-paint callback pushes into from its
/// own threads; the render step drains it.
#[derive(Debug, Default)]
pub struct SharedTextureQueue {
    queue: Mutex<VecDeque<SharedTextureHandle>>,
}

impl SharedTextureQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, handle: SharedTextureHandle) {
        self.queue.lock().push_back(handle);
    }

    pub fn pop(&self) -> Option<SharedTextureHandle> {
        self.queue.lock().pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Drop all queued handles (closing their descriptors). Used on resize
    /// and shutdown.
    pub fn clear(&self) {
        self.queue.lock().clear();
    }
}

/// Why an import attempt produced no new image.
#[derive(Debug, PartialEq, Eq)]
pub enum ImportOutcome {
    /// Imported into a fresh slot.
    Imported,
    /// Identity matched an existing slot; the descriptor was closed and the
    /// existing image is current again.
    Reused,
    /// Frame predates the current size or arrived during the resize
    /// cooldown; descriptor closed.
    Discarded,
    /// Backend failed; descriptor closed. Repeated failures disable the
    /// path.
    Failed,
    /// Fast path is disabled for this session.
    Disabled,
}

/// Ring of imported images, generic over the backend's image type so the
/// bookkeeping is testable without a GPU device.
pub struct ImportRing<T> {
    /// Slots in allocation (FIFO) order.
    slots: Vec<Slot<T>>,
    /// Slot currently bound for sampling.
    current: Option<usize>,
    failures: u32,
    enabled: bool,
}

struct Slot<T> {
    id: BufferId,
    image: T,
}

impl<T> ImportRing<T> {
    pub fn new(enabled: bool) -> Self {
        Self {
            slots: Vec::with_capacity(RING_SLOTS),
            current: None,
            failures: 0,
            enabled,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// The image most recently imported or reused, if any.
    pub fn current(&self) -> Option<&T> {
        self.current.map(|i| &self.slots[i].image)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Release every import. Callers must have idled the device first.
    pub fn drain(&mut self) {
        self.slots.clear();
        self.current = None;
    }

    /// Import one queued handle. `import` runs only after the size and
    /// cooldown gates pass and no existing slot matches the identity.
    pub fn import_queued(
        &mut self,
        handle: SharedTextureHandle,
        current_size: (u32, u32),
        last_resize: Instant,
        now: Instant,
        import: impl FnOnce(&SharedTextureHandle) -> Result<T, String>,
    ) -> ImportOutcome {
        if !self.enabled {
            return ImportOutcome::Disabled;
        }
        // Frames produced before the resize settled are stale.
        if now.duration_since(last_resize) < RESIZE_COOLDOWN {
            return ImportOutcome::Discarded;
        }
        if (handle.width, handle.height) != current_size {
            return ImportOutcome::Discarded;
        }

        // Same buffer identity: reuse the existing import.
        if let Some(idx) = self.slots.iter().position(|s| s.id == handle.id) {
            self.current = Some(idx);
            return ImportOutcome::Reused;
        }

        if self.slots.len() >= RING_SLOTS {
            // Every slot holds a live buffer the engine may still scan out;
            // skip the frame rather than destroy one.
            log("shared_texture: ring full, skipping frame");
            return ImportOutcome::Discarded;
        }

        match import(&handle) {
            Ok(image) => {
                let idx = self.slots.len();
                self.slots.push(Slot {
                    id: handle.id,
                    image,
                });
                self.current = Some(idx);
                self.failures = 0;
                ImportOutcome::Imported
            }
            Err(e) => {
                self.failures += 1;
                log(&format!(
                    "shared_texture: import failed ({e}), failure {}/{}",
                    self.failures, MAX_IMPORT_FAILURES
                ));
                if self.failures >= MAX_IMPORT_FAILURES {
                    self.enabled = false;
                    log("shared_texture: disabling fast path for this session");
                }
                ImportOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn past() -> Instant {
        Instant::now() - Duration::from_secs(10)
    }

    #[test]
    fn import_then_reuse_same_identity() {
        let mut ring: ImportRing<u32> = ImportRing::new(true);
        let now = Instant::now();

        let outcome = ring.import_queued(
            SharedTextureHandle::for_tests(7, 1280, 720),
            (1280, 720),
            past(),
            now,
            |_| Ok(1),
        );
        assert_eq!(outcome, ImportOutcome::Imported);
        assert_eq!(ring.len(), 1);

        // Same identity again: at most one slot allocation.
        let outcome = ring.import_queued(
            SharedTextureHandle::for_tests(7, 1280, 720),
            (1280, 720),
            past(),
            now,
            |_| Ok(2),
        );
        assert_eq!(outcome, ImportOutcome::Reused);
        assert_eq!(ring.len(), 1);
        assert_eq!(ring.current(), Some(&1));
    }

    #[test]
    fn stale_size_is_discarded() {
        let mut ring: ImportRing<u32> = ImportRing::new(true);
        let outcome = ring.import_queued(
            SharedTextureHandle::for_tests(1, 1280, 720),
            (1920, 1080),
            past(),
            Instant::now(),
            |_| Ok(1),
        );
        assert_eq!(outcome, ImportOutcome::Discarded);
        assert!(ring.is_empty());
    }

    #[test]
    fn frames_during_resize_cooldown_are_discarded() {
        let mut ring: ImportRing<u32> = ImportRing::new(true);
        let resize_at = Instant::now();
        // 100 ms after the resize, inside the 150 ms cooldown.
        let outcome = ring.import_queued(
            SharedTextureHandle::for_tests(1, 1280, 720),
            (1280, 720),
            resize_at,
            resize_at + Duration::from_millis(100),
            |_| Ok(1),
        );
        assert_eq!(outcome, ImportOutcome::Discarded);

        let outcome = ring.import_queued(
            SharedTextureHandle::for_tests(1, 1280, 720),
            (1280, 720),
            resize_at,
            resize_at + Duration::from_millis(151),
            |_| Ok(1),
        );
        assert_eq!(outcome, ImportOutcome::Imported);
    }

    #[test]
    fn repeated_failures_disable_the_path() {
        let mut ring: ImportRing<u32> = ImportRing::new(true);
        for i in 0..MAX_IMPORT_FAILURES {
            let outcome = ring.import_queued(
                SharedTextureHandle::for_tests(u64::from(i), 1280, 720),
                (1280, 720),
                past(),
                Instant::now(),
                |_| Err("no backend".into()),
            );
            assert_eq!(outcome, ImportOutcome::Failed);
        }
        assert!(!ring.enabled());
        let outcome = ring.import_queued(
            SharedTextureHandle::for_tests(99, 1280, 720),
            (1280, 720),
            past(),
            Instant::now(),
            |_| Ok(1),
        );
        assert_eq!(outcome, ImportOutcome::Disabled);
    }

    #[test]
    fn full_ring_skips_instead_of_evicting() {
        let mut ring: ImportRing<u32> = ImportRing::new(true);
        for i in 0..RING_SLOTS {
            let outcome = ring.import_queued(
                SharedTextureHandle::for_tests(i as u64, 1280, 720),
                (1280, 720),
                past(),
                Instant::now(),
                |_| Ok(i as u32),
            );
            assert_eq!(outcome, ImportOutcome::Imported);
        }
        let outcome = ring.import_queued(
            SharedTextureHandle::for_tests(999, 1280, 720),
            (1280, 720),
            past(),
            Instant::now(),
            |_| Ok(0),
        );
        assert_eq!(outcome, ImportOutcome::Discarded);
        assert_eq!(ring.len(), RING_SLOTS);
        // Known identities still reuse.
        let outcome = ring.import_queued(
            SharedTextureHandle::for_tests(3, 1280, 720),
            (1280, 720),
            past(),
            Instant::now(),
            |_| Ok(0),
        );
        assert_eq!(outcome, ImportOutcome::Reused);
    }

    #[test]
    fn drain_releases_all_slots() {
        let mut ring: ImportRing<u32> = ImportRing::new(true);
        ring.import_queued(
            SharedTextureHandle::for_tests(1, 640, 480),
            (640, 480),
            past(),
            Instant::now(),
            |_| Ok(1),
        );
        ring.drain();
        assert!(ring.is_empty());
        assert!(ring.current().is_none());
    }

    #[test]
    fn queue_is_fifo() {
        let queue = SharedTextureQueue::new();
        queue.push(SharedTextureHandle::for_tests(1, 10, 10));
        queue.push(SharedTextureHandle::for_tests(2, 10, 10));
        assert_eq!(queue.pop().unwrap().id, BufferId(1));
        assert_eq!(queue.pop().unwrap().id, BufferId(2));
        assert!(queue.pop().is_none());
    }
}
