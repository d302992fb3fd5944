//! Long-lived background thread running LOD cycles.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use glam::Vec3;

use crate::error::TerrainError;
use crate::lod::LodCalculator;

use super::mailbox::Mailbox;
use super::stages::{run_cycle, LodSnapshot, LodUpdate};

/// One cycle's inputs, moved into the worker.
pub struct LodTask {
  pub snapshot: LodSnapshot,
  pub locations: Vec<Vec3>,
  pub calculator: Arc<dyn LodCalculator>,
  /// Pull every patch back to level 0.
  pub lod_off: bool,
}

/// Owns the `terrain-lod` thread.
///
/// At most one task is ever in flight: [`LodWorker::submit`] refuses while the
/// running flag is set, and the flag is only cleared once the result (if any)
/// is in the mailbox.
pub struct LodWorker {
  sender: Option<Sender<LodTask>>,
  handle: Option<JoinHandle<()>>,
  running: Arc<AtomicBool>,
  mailbox: Arc<Mailbox<LodUpdate>>,
}

impl LodWorker {
  pub fn spawn() -> Result<Self, TerrainError> {
    let (sender, receiver) = crossbeam_channel::bounded::<LodTask>(1);
    let running = Arc::new(AtomicBool::new(false));
    let mailbox = Arc::new(Mailbox::new());

    let handle = thread::Builder::new().name("terrain-lod".into()).spawn({
      let running = Arc::clone(&running);
      let mailbox = Arc::clone(&mailbox);
      move || worker_loop(receiver, running, mailbox)
    })?;
    tracing::debug!("LOD worker started");

    Ok(Self {
      sender: Some(sender),
      handle: Some(handle),
      running,
      mailbox,
    })
  }

  /// A cycle has been submitted and its result is not in the mailbox yet.
  #[inline]
  pub fn is_running(&self) -> bool {
    self.running.load(Ordering::Acquire)
  }

  /// Hand a task to the worker. Returns `false` if a cycle is still running.
  pub fn submit(&self, task: LodTask) -> bool {
    let Some(sender) = &self.sender else {
      return false;
    };
    if self.running.swap(true, Ordering::AcqRel) {
      return false;
    }
    match sender.try_send(task) {
      Ok(()) => true,
      Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
        self.running.store(false, Ordering::Release);
        tracing::warn!("LOD worker unavailable, task dropped");
        false
      }
    }
  }

  /// Take the latest published update.
  pub fn take_result(&self) -> Option<LodUpdate> {
    self.mailbox.take()
  }
}

impl Drop for LodWorker {
  fn drop(&mut self) {
    // Closing the channel ends the loop after the current cycle.
    self.sender.take();
    if let Some(handle) = self.handle.take() {
      if handle.join().is_err() {
        tracing::error!("LOD worker thread terminated abnormally");
      }
    }
  }
}

fn worker_loop(receiver: Receiver<LodTask>, running: Arc<AtomicBool>, mailbox: Arc<Mailbox<LodUpdate>>) {
  for task in receiver.iter() {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
      #[cfg(feature = "profiling")]
      let _span = tracing::info_span!("lod::cycle", epoch = task.snapshot.epoch).entered();
      run_cycle(&task.snapshot, &task.locations, task.calculator.as_ref(), task.lod_off)
    }));

    match outcome {
      Ok(Ok(Some(update))) => {
        tracing::debug!(
          epoch = update.epoch,
          changes = update.stats.level_changes,
          edge_fixes = update.stats.edge_fixes,
          reindexed = update.stats.reindexed,
          total_us = update.stats.total_us(),
          "LOD cycle finished"
        );
        if let Err(rejected) = mailbox.post(update) {
          tracing::warn!(epoch = rejected.epoch, "mailbox still full, LOD update dropped");
        }
      }
      Ok(Ok(None)) => tracing::debug!(epoch = task.snapshot.epoch, "LOD cycle found no level changes"),
      Ok(Err(err)) => tracing::error!(%err, "LOD cycle failed"),
      Err(payload) => tracing::error!(reason = panic_reason(payload.as_ref()), "LOD worker panicked, cycle aborted"),
    }
    running.store(false, Ordering::Release);
  }
  tracing::debug!("LOD worker stopped");
}

fn panic_reason(payload: &(dyn Any + Send)) -> &str {
  if let Some(s) = payload.downcast_ref::<&str>() {
    s
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.as_str()
  } else {
    "unknown"
  }
}
