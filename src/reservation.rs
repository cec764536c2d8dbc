//! Creation-slot reservation
//!
//! The factory runs outside the state lock, so a slot is claimed first by
//! bumping `pending` under the lock. A [`Reservation`] owns that claim: it is
//! either converted into a checked-out or idle instance, or rolled back when
//! dropped (factory error or panic).

use crate::pool::{Instance, Shared};
use crate::resource::PooledResource;

pub(crate) struct Reservation<'a, T: PooledResource> {
    shared: &'a Shared<T>,
    claimed: bool,
}

impl<'a, T: PooledResource> Reservation<'a, T> {
    /// Adopt a slot already counted in `pending`.
    pub(crate) fn claimed(shared: &'a Shared<T>) -> Self {
        Self {
            shared,
            claimed: true,
        }
    }

    /// Move the slot to the checked-out count.
    ///
    /// Hands the instance back if the pool was disposed meanwhile.
    pub(crate) fn check_out(mut self, instance: Instance<T>) -> Result<Instance<T>, Instance<T>> {
        let mut state = self.shared.state.lock();
        state.pending -= 1;
        self.claimed = false;
        if state.closed {
            return Err(instance);
        }
        state.checked_out += 1;
        Ok(instance)
    }

    /// Move the slot into the idle set.
    ///
    /// Hands the instance back if the pool was disposed meanwhile.
    pub(crate) fn park(mut self, instance: Instance<T>) -> Result<(), Instance<T>> {
        let mut state = self.shared.state.lock();
        state.pending -= 1;
        self.claimed = false;
        if state.closed {
            return Err(instance);
        }
        state.idle.push_back(instance);
        drop(state);
        self.shared.wake_one();
        Ok(())
    }
}

impl<T: PooledResource> Drop for Reservation<'_, T> {
    fn drop(&mut self) {
        if self.claimed {
            self.shared.state.lock().pending -= 1;
            self.shared.wake_one();
        }
    }
}
