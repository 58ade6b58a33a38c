//! FIFO ticket lock.

use std::ops::{Deref, DerefMut};

use parking_lot::{Condvar, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Tickets {
    next: u64,
    serving: u64,
}

/// A mutex that grants access strictly in arrival order.
///
/// Each caller draws a ticket and waits until it is served. The protected
/// value sits behind a second mutex that only the ticket holder ever
/// touches, so it is uncontended apart from the hand-over.
#[derive(Debug, Default)]
pub struct FairLock<T> {
    tickets: Mutex<Tickets>,
    turn: Condvar,
    value: Mutex<T>,
}

/// Access to the value of a [`FairLock`]; the next ticket is served on drop.
pub struct FairLockGuard<'a, T> {
    lock: &'a FairLock<T>,
    guard: MutexGuard<'a, T>,
}

impl<T> FairLock<T> {
    pub fn new(value: T) -> Self {
        FairLock {
            tickets: Mutex::new(Tickets::default()),
            turn: Condvar::new(),
            value: Mutex::new(value),
        }
    }

    /// Block until every earlier caller has released the lock.
    pub fn lock(&self) -> FairLockGuard<'_, T> {
        let mut tickets = self.tickets.lock();
        let ticket = tickets.next;
        tickets.next += 1;
        while tickets.serving != ticket {
            self.turn.wait(&mut tickets);
        }
        drop(tickets);

        FairLockGuard {
            lock: self,
            guard: self.value.lock(),
        }
    }

    /// Callers holding or waiting for the lock.
    pub fn queued(&self) -> u64 {
        let tickets = self.tickets.lock();
        tickets.next - tickets.serving
    }

    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T> Deref for FairLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for FairLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for FairLockGuard<'_, T> {
    fn drop(&mut self) {
        let mut tickets = self.lock.tickets.lock();
        tickets.serving += 1;
        self.lock.turn.notify_all();
    }
}
