use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("media engine is already in use by another playback session")]
pub struct EngineBusy;

type Slot<E> = Arc<Mutex<Option<E>>>;

fn lock<E>(slot: &Slot<E>) -> MutexGuard<'_, Option<E>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Owns the process-wide engine between sessions.
///
/// A session borrows it with [`EngineHost::acquire`]; while that lease is
/// alive every further `acquire` fails, so two controllers can never drive
/// the same engine.
pub struct EngineHost<E> {
    slot: Slot<E>,
}

impl<E> Clone for EngineHost<E> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<E> EngineHost<E> {
    pub fn new(engine: E) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(engine))),
        }
    }

    pub fn acquire(&self) -> Result<EngineLease<E>, EngineBusy> {
        let engine = lock(&self.slot).take().ok_or(EngineBusy)?;
        tracing::debug!("engine lease acquired");
        Ok(EngineLease {
            engine: Some(engine),
            home: Arc::clone(&self.slot),
        })
    }

    pub fn is_leased(&self) -> bool {
        lock(&self.slot).is_none()
    }

    /// Run `f` on the idle engine.  Returns `None` while a lease is out.
    pub fn with_idle<R>(&self, f: impl FnOnce(&mut E) -> R) -> Option<R> {
        lock(&self.slot).as_mut().map(f)
    }
}

/// Borrowed engine; returned to its host on drop.
pub struct EngineLease<E> {
    engine: Option<E>,
    home: Slot<E>,
}

impl<E> Deref for EngineLease<E> {
    type Target = E;

    fn deref(&self) -> &E {
        match &self.engine {
            Some(e) => e,
            None => unreachable!("engine is only taken in drop"),
        }
    }
}

impl<E> DerefMut for EngineLease<E> {
    fn deref_mut(&mut self) -> &mut E {
        match &mut self.engine {
            Some(e) => e,
            None => unreachable!("engine is only taken in drop"),
        }
    }
}

impl<E> Drop for EngineLease<E> {
    fn drop(&mut self) {
        if let Some(engine) = self.engine.take() {
            *lock(&self.home) = Some(engine);
            tracing::debug!("engine lease released");
        }
    }
}
