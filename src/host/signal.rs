//! A single-threaded notification source with explicit subscription handles.
//!
//! Host services expose their change notifications through [`Signal`]s.
//! Subscribers get back a [`SubscriptionId`] and release it themselves; there
//! is no implicit lifetime-tied auto-disconnect. Disconnecting is safe at any
//! point, including from inside a callback while the signal is emitting.

use std::cell::RefCell;
use std::rc::Rc;

use slotmap::SlotMap;

slotmap::new_key_type! {
    pub struct SubscriptionId;
}

type Slot<T> = Rc<dyn Fn(&T)>;

pub struct Signal<T> {
    slots: RefCell<SlotMap<SubscriptionId, Slot<T>>>,
}

impl<T> Default for Signal<T> {
    fn default() -> Self { Signal { slots: RefCell::new(SlotMap::with_key()) } }
}

impl<T> Signal<T> {
    pub fn new() -> Signal<T> { Signal::default() }

    pub fn connect(&self, callback: impl Fn(&T) + 'static) -> SubscriptionId {
        self.slots.borrow_mut().insert(Rc::new(callback))
    }

    /// Returns false if the handle was already released.
    pub fn disconnect(&self, id: SubscriptionId) -> bool {
        self.slots.borrow_mut().remove(id).is_some()
    }

    /// Delivers `value` to every current subscriber, in subscription order.
    ///
    /// The subscriber list is snapshotted first and each entry is re-checked
    /// for liveness before its callback runs, so a subscriber removed while
    /// the emission is in flight is never invoked.
    pub fn emit(&self, value: &T) {
        let snapshot: Vec<(SubscriptionId, Slot<T>)> =
            self.slots.borrow().iter().map(|(id, slot)| (id, slot.clone())).collect();
        for (id, slot) in snapshot {
            if self.slots.borrow().contains_key(id) {
                slot(value);
            }
        }
    }

    pub fn subscriber_count(&self) -> usize { self.slots.borrow().len() }
}
