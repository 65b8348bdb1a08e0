//! In-process memoization of compiled targets
//!
//! Each variant gets one slot per platform. The first caller for a key
//! compiles it; every other caller blocks on the slot until the result
//! (success or failure) is available and then receives the same `Arc`.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, ThreadId};
use std::time::Duration;

use crate::build::{CancelToken, Platform, Target};
use crate::error::{Error, Result};

/// Cache key combining variant name and target platform
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub variant: String,
    pub platform: Platform,
}

impl CacheKey {
    pub fn new(variant: &str, platform: &Platform) -> Self {
        Self {
            variant: variant.to_string(),
            platform: platform.clone(),
        }
    }
}

/// How often waiters wake up to check for cancellation.
const WAIT_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug)]
enum SlotState {
    Compiling { owner: ThreadId },
    Compiled(Arc<Target>),
    Failed(Arc<Error>),
}

#[derive(Debug)]
struct Slot {
    state: Mutex<SlotState>,
    ready: Condvar,
}

impl Slot {
    fn compiling() -> Self {
        Self {
            state: Mutex::new(SlotState::Compiling {
                owner: thread::current().id(),
            }),
            ready: Condvar::new(),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, SlotState>> {
        self.state.lock().map_err(|_| Error::LockPoisoned {
            context: "target cache slot".to_string(),
        })
    }

    fn finish(&self, state: SlotState) {
        // A poisoned slot still has to release its waiters
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = state;
        self.ready.notify_all();
    }
}

/// Marks the slot failed if its owner leaves without publishing a result,
/// including by unwinding.
struct Flight<'a> {
    slot: &'a Slot,
    name: &'a str,
    finished: bool,
}

impl Flight<'_> {
    fn publish(mut self, state: SlotState) {
        self.slot.finish(state);
        self.finished = true;
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.slot.finish(SlotState::Failed(Arc::new(Error::Cancelled {
                variant: self.name.to_string(),
            })));
        }
    }
}

/// At-most-once compilation table keyed by variant and platform
#[derive(Debug, Clone, Default)]
pub struct TargetCache {
    slots: Arc<Mutex<HashMap<CacheKey, Arc<Slot>>>>,
}

impl TargetCache {
    /// Create a new empty target cache
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_slots(&self) -> Result<MutexGuard<'_, HashMap<CacheKey, Arc<Slot>>>> {
        self.slots.lock().map_err(|_| Error::LockPoisoned {
            context: "target cache".to_string(),
        })
    }

    /// Get the compiled target for `key`, compiling it with `compile` if no
    /// other caller has started to.
    ///
    /// Failures are memoized too: every caller for a failed key receives the
    /// same error. A caller that requests a key its own thread is currently
    /// compiling gets a [`Error::CycleDetected`] instead of blocking forever.
    pub fn get_or_compile<F>(&self, key: &CacheKey, cancel: &CancelToken, compile: F) -> Result<Arc<Target>>
    where
        F: FnOnce() -> Result<Target>,
    {
        let name = key.variant.as_str();
        let (slot, owned) = {
            let mut slots = self.lock_slots()?;
            match slots.get(key) {
                Some(slot) => (Arc::clone(slot), false),
                None => {
                    let slot = Arc::new(Slot::compiling());
                    slots.insert(key.clone(), Arc::clone(&slot));
                    (slot, true)
                }
            }
        };

        if owned {
            let flight = Flight {
                slot: &slot,
                name,
                finished: false,
            };

            return match compile() {
                Ok(target) => {
                    let target = Arc::new(target);
                    flight.publish(SlotState::Compiled(Arc::clone(&target)));
                    Ok(target)
                }
                Err(error) => {
                    let error = Arc::new(error);
                    flight.publish(SlotState::Failed(Arc::clone(&error)));
                    Err(Error::shared(&error))
                }
            };
        }

        Self::wait(&slot, name, cancel)
    }

    fn wait(slot: &Slot, name: &str, cancel: &CancelToken) -> Result<Arc<Target>> {
        let current = thread::current().id();
        let mut state = slot.lock()?;

        loop {
            match &*state {
                SlotState::Compiled(target) => return Ok(Arc::clone(target)),
                SlotState::Failed(error) => return Err(Error::shared(error)),
                SlotState::Compiling { owner } if *owner == current => {
                    return Err(Error::CycleDetected {
                        cycle: format!("{} -> {}", name, name),
                    });
                }
                SlotState::Compiling { .. } => {}
            }

            if cancel.is_cancelled() {
                return Err(Error::Cancelled {
                    variant: name.to_string(),
                });
            }

            state = slot
                .ready
                .wait_timeout(state, WAIT_INTERVAL)
                .map_err(|_| Error::LockPoisoned {
                    context: "target cache slot".to_string(),
                })?
                .0;
        }
    }

    /// Get a compiled target without compiling
    pub fn get(&self, key: &CacheKey) -> Result<Option<Arc<Target>>> {
        let slot = match self.lock_slots()?.get(key) {
            Some(slot) => Arc::clone(slot),
            None => return Ok(None),
        };
        let state = slot.lock()?;
        Ok(match &*state {
            SlotState::Compiled(target) => Some(Arc::clone(target)),
            _ => None,
        })
    }

    /// Get the number of slots, compiled or not
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock_slots()?.len())
    }

    /// Check if cache is empty
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock_slots()?.is_empty())
    }
}
