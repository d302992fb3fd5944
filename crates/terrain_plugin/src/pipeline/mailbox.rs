//! Single-slot hand-off from the LOD worker back to the main thread.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Holds at most one value.
///
/// The producer never overwrites: a post into a full slot fails and hands the
/// value back, the consumer empties the slot with [`Mailbox::take`].
#[derive(Debug, Default)]
pub struct Mailbox<T> {
  slot: Mutex<Option<T>>,
}

impl<T> Mailbox<T> {
  pub fn new() -> Self {
    Self { slot: Mutex::new(None) }
  }

  /// Store `value` if the slot is empty, otherwise return it untouched.
  pub fn post(&self, value: T) -> Result<(), T> {
    let mut slot = self.lock();
    if slot.is_some() {
      return Err(value);
    }
    *slot = Some(value);
    Ok(())
  }

  /// Empty the slot.
  pub fn take(&self) -> Option<T> {
    self.lock().take()
  }

  pub fn is_empty(&self) -> bool {
    self.lock().is_none()
  }

  // A panic while holding the lock leaves a plain Option behind; it is still
  // consistent.
  fn lock(&self) -> MutexGuard<'_, Option<T>> {
    self.slot.lock().unwrap_or_else(PoisonError::into_inner)
  }
}
