//! Ownership of a self-rearming browser callback

use std::{
    cell::{Cell, RefCell},
    rc::{Rc, Weak},
};

/// Holds a callback that registers itself again every time it runs, plus the id of its
/// pending registration
///
/// The callback reaches itself only through a [`RearmHandle`], which holds it weakly, so
/// clearing or dropping the slot frees it.
pub struct CallbackSlot<C> {
    callback: Rc<RefCell<Option<C>>>,
    pending: Rc<Cell<Option<u32>>>,
}

impl<C> Default for CallbackSlot<C> {
    fn default() -> Self {
        Self {
            callback: Rc::new(RefCell::new(None)),
            pending: Rc::new(Cell::new(None)),
        }
    }
}

impl<C> CallbackSlot<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rearm_handle(&self) -> RearmHandle<C> {
        RearmHandle {
            callback: Rc::downgrade(&self.callback),
            pending: self.pending.clone(),
        }
    }

    pub fn install(&self, callback: C) {
        *self.callback.borrow_mut() = Some(callback);
    }

    pub fn is_installed(&self) -> bool {
        self.callback.borrow().is_some()
    }

    /// Registers the callback through `register`, remembering the id it returns
    pub fn register<E>(&self, register: impl FnOnce(&C) -> Result<Option<u32>, E>) -> Result<(), E> {
        if let Some(callback) = self.callback.borrow().as_ref() {
            self.pending.set(register(callback)?);
        }
        Ok(())
    }

    /// Id of the registration that has not fired yet, taken so it is cancelled only once
    pub fn take_pending(&self) -> Option<u32> {
        self.pending.take()
    }

    /// Drops the callback; pending registrations must be cancelled first
    pub fn clear(&self) {
        self.pending.set(None);
        self.callback.borrow_mut().take();
    }
}

/// Weak access to a [`CallbackSlot`]'s callback from inside the callback itself
pub struct RearmHandle<C> {
    callback: Weak<RefCell<Option<C>>>,
    pending: Rc<Cell<Option<u32>>>,
}

impl<C> RearmHandle<C> {
    /// Registers the callback again if its slot still holds it; returns whether it did
    pub fn rearm(&self, register: impl FnOnce(&C) -> Option<u32>) -> bool {
        let Some(callback) = self.callback.upgrade() else {
            return false;
        };
        let callback = callback.borrow();
        let Some(callback) = callback.as_ref() else {
            return false;
        };
        self.pending.set(register(callback));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_id_is_taken_once() {
        let slot = CallbackSlot::new();
        slot.install(());
        slot.register(|_| Ok::<_, ()>(Some(3))).unwrap();
        assert!(slot.rearm_handle().rearm(|_| Some(4)));

        assert_eq!(slot.take_pending(), Some(4));
        assert_eq!(slot.take_pending(), None);
    }

    #[test]
    fn cleared_slot_cannot_be_rearmed() {
        let slot = CallbackSlot::new();
        let tracker = Rc::new(());
        slot.install(tracker.clone());
        let handle = slot.rearm_handle();

        slot.clear();
        assert!(!slot.is_installed());
        assert_eq!(Rc::strong_count(&tracker), 1);
        assert!(!handle.rearm(|_| Some(1)));
        assert_eq!(slot.take_pending(), None);
    }

    #[test]
    fn callback_holding_its_own_handle_is_freed_with_the_slot() {
        let tracker = Rc::new(());
        let slot: CallbackSlot<Box<dyn Fn() -> bool>> = CallbackSlot::new();
        let handle = slot.rearm_handle();
        let captured = tracker.clone();
        slot.install(Box::new(move || {
            let _ = &captured;
            handle.rearm(|_| Some(2))
        }));
        assert_eq!(Rc::strong_count(&tracker), 2);
        slot.register(|callback| Ok::<_, ()>(callback().then_some(9))).unwrap();
        assert_eq!(slot.take_pending(), Some(9));

        drop(slot);
        assert_eq!(Rc::strong_count(&tracker), 1);
    }
}
