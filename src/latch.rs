//! State shared between the transport's event context and the acquisition
//! loop. Both types are `const` constructible so they can live in `static`s,
//! and every access goes through a critical section.

use core::cell::Cell;

use critical_section::Mutex;

/// Single slot request latch.
///
/// Setting an already set latch is a no-op: requests that arrive before the
/// pending one has been serviced and cleared are coalesced into it, not queued.
pub struct RequestLatch(Mutex<Cell<bool>>);

impl RequestLatch {
    pub const fn new() -> Self {
        Self(Mutex::new(Cell::new(false)))
    }

    /// Mark a request as pending. Returns `false` if one already was, in
    /// which case this request is coalesced with it.
    pub fn set(&self) -> bool {
        critical_section::with(|cs| !self.0.borrow(cs).replace(true))
    }

    pub fn is_set(&self) -> bool {
        critical_section::with(|cs| self.0.borrow(cs).get())
    }

    pub fn clear(&self) {
        critical_section::with(|cs| self.0.borrow(cs).set(false));
    }
}

impl Default for RequestLatch {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether the transport currently reports a live connection.
pub struct LinkState(Mutex<Cell<bool>>);

impl LinkState {
    /// Starts disconnected.
    pub const fn new() -> Self {
        Self(Mutex::new(Cell::new(false)))
    }

    /// Returns `true` if this changed the state.
    pub fn set_connected(&self) -> bool {
        critical_section::with(|cs| !self.0.borrow(cs).replace(true))
    }

    /// Returns `true` if this changed the state.
    pub fn set_disconnected(&self) -> bool {
        critical_section::with(|cs| self.0.borrow(cs).replace(false))
    }

    pub fn is_connected(&self) -> bool {
        critical_section::with(|cs| self.0.borrow(cs).get())
    }
}

impl Default for LinkState {
    fn default() -> Self {
        Self::new()
    }
}
