//! The drawing lock that serializes every device and surface mutation.

use std::sync::Arc;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

/// Re-entrant exclusive lock shared by everything that draws to one device.
///
/// Cloning yields another handle to the same lock, which is how several
/// factories that draw to one graphics device serialize against each other.
/// The same thread may lock again while already holding a session.
#[derive(Clone, Default)]
pub struct DrawingLock {
    inner: Arc<ReentrantMutex<()>>,
}

impl DrawingLock {
    /// Create a new, unshared lock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the lock is held and return the scoped session.
    #[must_use]
    pub fn lock(&self) -> DrawingLockSession<'_> {
        let guard = self.inner.lock();
        tracing::trace!("drawing lock acquired");
        DrawingLockSession { _guard: guard }
    }

    /// Whether `other` is a handle to the same lock.
    #[must_use]
    pub fn same_lock(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Whether the lock is held by any thread.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }
}

impl std::fmt::Debug for DrawingLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrawingLock")
            .field("locked", &self.is_locked())
            .field("handles", &Arc::strong_count(&self.inner))
            .finish()
    }
}

/// Proof that the drawing lock is held; released on drop.
///
/// Surface mutators take `&DrawingLockSession` so they cannot be called
/// without it.
pub struct DrawingLockSession<'a> {
    _guard: ReentrantMutexGuard<'a, ()>,
}

impl Drop for DrawingLockSession<'_> {
    fn drop(&mut self) {
        tracing::trace!("drawing lock released");
    }
}

impl std::fmt::Debug for DrawingLockSession<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DrawingLockSession")
    }
}
