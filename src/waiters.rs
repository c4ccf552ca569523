//! Internal waker storage shared by every primitive.
//!
//! Each pending wait occupies one slot in a [`WaiterSlab`]. Slots are
//! reused after removal so that cancelled waiters cannot grow the backing
//! vec without bound, and the tail is shrunk whenever vacant slots
//! accumulate at the end.
//!
//! Two wake disciplines coexist:
//!
//! - **Latched** (`notify_one` / `notify_all`): the wakeup *is* the
//!   delivery. The slot is marked `Notified` and the waiter resolves on its
//!   next poll without re-checking any shared condition. Used by `Signal`
//!   and `WaitGroup`, whose conditions are level-like.
//! - **Rouse** (`rouse_one`): the wakeup is only an invitation to re-check.
//!   The slot keeps its registration and the waiter claims the condition
//!   (admission token, semaphore slot) under the caller's lock, or goes
//!   back to sleep. Used by `AutoResetEvent` and `Semaphore`, whose
//!   conditions are consumed atomically by exactly one claimant.

use std::task::Waker;

/// State of one wait registration.
#[derive(Debug)]
pub(crate) enum WaiterSlot {
    /// Reusable hole left by a removed registration.
    Vacant,
    /// Registered and asleep.
    Waiting(Waker),
    /// Waker taken by `rouse_one`; the waiter will re-poll and either
    /// claim the condition or re-register its waker.
    Roused,
    /// Wakeup delivered; the waiter resolves on its next poll.
    Notified,
}

/// Slot-reusing storage for wait registrations.
#[derive(Debug, Default)]
pub(crate) struct WaiterSlab {
    slots: Vec<WaiterSlot>,
    free: Vec<usize>,
}

impl WaiterSlab {
    pub(crate) const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Registers a new waiter, reusing a vacant slot if one exists.
    pub(crate) fn insert(&mut self, waker: Waker) -> usize {
        if let Some(index) = self.free.pop() {
            self.slots[index] = WaiterSlot::Waiting(waker);
            index
        } else {
            self.slots.push(WaiterSlot::Waiting(waker));
            self.slots.len() - 1
        }
    }

    /// Re-arms a slot with a fresh waker.
    ///
    /// Valid for `Waiting` (waker replaced) and `Roused` (registration
    /// restored) slots; a `Notified` slot keeps its delivery.
    pub(crate) fn set_waker(&mut self, index: usize, waker: &Waker) {
        match &mut self.slots[index] {
            slot @ (WaiterSlot::Waiting(_) | WaiterSlot::Roused) => {
                *slot = WaiterSlot::Waiting(waker.clone());
            }
            WaiterSlot::Notified => {}
            WaiterSlot::Vacant => unreachable!("set_waker on vacant waiter slot"),
        }
    }

    /// Whether a latched wakeup has been delivered to this slot.
    pub(crate) fn is_notified(&self, index: usize) -> bool {
        matches!(self.slots[index], WaiterSlot::Notified)
    }

    /// Removes a registration, returning its slot to the free list.
    pub(crate) fn remove(&mut self, index: usize) {
        self.slots[index] = WaiterSlot::Vacant;
        self.free.push(index);

        // Shrink vacant slots off the tail so repeated register/cancel
        // cycles keep the vec bounded.
        while matches!(self.slots.last(), Some(WaiterSlot::Vacant)) {
            let tail = self.slots.len() - 1;
            self.slots.pop();
            if let Some(pos) = self.free.iter().position(|&i| i == tail) {
                self.free.swap_remove(pos);
            }
        }
    }

    /// Delivers a latched wakeup to one waiting slot.
    pub(crate) fn notify_one(&mut self) -> Option<Waker> {
        for slot in &mut self.slots {
            if matches!(slot, WaiterSlot::Waiting(_)) {
                let WaiterSlot::Waiting(waker) = std::mem::replace(slot, WaiterSlot::Notified)
                else {
                    unreachable!()
                };
                return Some(waker);
            }
        }
        None
    }

    /// Delivers a latched wakeup to every registered slot.
    ///
    /// Roused slots are marked too: their waiter is already awake and will
    /// observe the notification on its next poll.
    pub(crate) fn notify_all(&mut self) -> Vec<Waker> {
        let mut wakers = Vec::new();
        for slot in &mut self.slots {
            match std::mem::replace(slot, WaiterSlot::Notified) {
                WaiterSlot::Waiting(waker) => wakers.push(waker),
                WaiterSlot::Roused => {}
                other @ (WaiterSlot::Vacant | WaiterSlot::Notified) => *slot = other,
            }
        }
        wakers
    }

    /// Wakes one waiting slot without delivering anything; the waiter
    /// re-checks its condition under the owner's lock.
    pub(crate) fn rouse_one(&mut self) -> Option<Waker> {
        for slot in &mut self.slots {
            if matches!(slot, WaiterSlot::Waiting(_)) {
                let WaiterSlot::Waiting(waker) = std::mem::replace(slot, WaiterSlot::Roused)
                else {
                    unreachable!()
                };
                return Some(waker);
            }
        }
        None
    }

    /// Number of registrations still holding a live waker.
    pub(crate) fn waiting_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s, WaiterSlot::Waiting(_)))
            .count()
    }

    /// Number of registrations of any kind (waiting, roused, or notified).
    pub(crate) fn registered_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| !matches!(s, WaiterSlot::Vacant))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::task::Wake;

    struct NoopWaker;

    impl Wake for NoopWaker {
        fn wake(self: Arc<Self>) {}
        fn wake_by_ref(self: &Arc<Self>) {}
    }

    fn waker() -> Waker {
        Arc::new(NoopWaker).into()
    }

    #[test]
    fn insert_reuses_freed_slots() {
        let mut slab = WaiterSlab::new();
        let a = slab.insert(waker());
        let b = slab.insert(waker());
        assert_eq!((a, b), (0, 1));

        slab.remove(a);
        let c = slab.insert(waker());
        assert_eq!(c, 0);
        assert_eq!(slab.registered_count(), 2);
    }

    #[test]
    fn tail_shrinks_after_removal() {
        let mut slab = WaiterSlab::new();
        let a = slab.insert(waker());
        let b = slab.insert(waker());
        let c = slab.insert(waker());

        // Middle hole stays; tail holes are popped.
        slab.remove(b);
        assert_eq!(slab.slots.len(), 3);
        slab.remove(c);
        assert_eq!(slab.slots.len(), 1);
        slab.remove(a);
        assert_eq!(slab.slots.len(), 0);
        assert!(slab.free.is_empty());
    }

    #[test]
    fn notify_one_latches_delivery() {
        let mut slab = WaiterSlab::new();
        let a = slab.insert(waker());
        assert!(slab.notify_one().is_some());
        assert!(slab.is_notified(a));
        // Nothing left to notify.
        assert!(slab.notify_one().is_none());
    }

    #[test]
    fn rouse_keeps_registration() {
        let mut slab = WaiterSlab::new();
        let a = slab.insert(waker());
        assert!(slab.rouse_one().is_some());
        assert!(!slab.is_notified(a));
        assert_eq!(slab.waiting_count(), 0);
        assert_eq!(slab.registered_count(), 1);

        // Re-arm, then latched broadcast reaches it.
        slab.set_waker(a, &waker());
        let woken = slab.notify_all();
        assert_eq!(woken.len(), 1);
        assert!(slab.is_notified(a));
    }

    #[test]
    fn notify_all_marks_roused_slots() {
        let mut slab = WaiterSlab::new();
        let a = slab.insert(waker());
        let _ = slab.rouse_one();
        let woken = slab.notify_all();
        // No waker to hand out, but the delivery is latched.
        assert!(woken.is_empty());
        assert!(slab.is_notified(a));
    }
}
