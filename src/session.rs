//! The single statically allocated playback session.
//!
//! The interrupt handler needs a `'static` handle to the one engine that is
//! streaming. [`SessionSlot`] provides it with a two-step handoff:
//!
//! 1. [`SessionSlot::claim`] moves the session into static storage and gives
//!    the foreground exclusive access to set it up.
//! 2. [`SessionSlot::activate`] consumes that access and publishes the session
//!    to the interrupt context, which from then on is its only user.
//!
//! A slot can be claimed once per boot. There is no way to take the session
//! back out.

use core::ops::{Deref, DerefMut};
use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

use static_cell::StaticCell;

use crate::{Error, Result};

/// Static storage for one session, handed from the foreground to an
/// interrupt handler.
pub struct SessionSlot<T: 'static> {
    cell: StaticCell<T>,
    active: AtomicPtr<T>,
}

impl<T: 'static> SessionSlot<T> {
    /// Creates an empty slot.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cell: StaticCell::new(),
            active: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Moves `session` into the slot and returns exclusive foreground access.
    ///
    /// # Errors
    /// [`Error::SessionActive`] if the slot was already claimed. `session` is
    /// dropped.
    pub fn claim(&'static self, session: T) -> Result<Claimed<T>> {
        self.cell
            .try_init(session)
            .map(Claimed)
            .ok_or(Error::SessionActive)
    }

    /// Hands the claimed session to the interrupt context.
    ///
    /// `claimed` must have come from this slot.
    pub fn activate(&'static self, claimed: Claimed<T>) {
        let session: *mut T = claimed.0;
        self.active.store(session, Ordering::Release);
    }

    /// True once [`Self::activate`] has run.
    pub fn is_active(&self) -> bool {
        !self.active.load(Ordering::Acquire).is_null()
    }

    /// Runs `f` on the active session, or returns `None` before activation.
    ///
    /// # Safety
    /// Once a session is active, only one execution context may call this,
    /// and `f` must not call it again. In practice that is a single interrupt
    /// handler that cannot preempt itself.
    pub unsafe fn service<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let session = self.active.load(Ordering::Acquire);
        // SAFETY: non-null pointers come from `activate`, which consumed the
        // only other `&mut T`; the caller guarantees no aliasing access.
        unsafe { session.as_mut() }.map(f)
    }
}

impl<T: 'static> Default for SessionSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Foreground access to a claimed, not yet active session.
pub struct Claimed<T: 'static>(&'static mut T);

impl<T: 'static> Deref for Claimed<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.0
    }
}

impl<T: 'static> DerefMut for Claimed<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.0
    }
}
