use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Meeting point for a fixed number of parties, with a bounded wait.
///
/// Unlike `std::sync::Barrier`, a party that never arrives cannot hang the
/// others: waiting gives up once the deadline passes.
#[derive(Debug)]
pub(crate) struct Rendezvous {
    parties: usize,
    arrived: Mutex<usize>,
    all_here: Condvar,
}

impl Rendezvous {
    pub(crate) fn new(parties: usize) -> Self {
        Self {
            parties,
            arrived: Mutex::new(0),
            all_here: Condvar::new(),
        }
    }

    /// Waits until every party arrived. Returns `false` if `patience` ran out first.
    pub(crate) fn arrive(&self, patience: Duration) -> bool {
        let deadline = Instant::now() + patience;
        let mut arrived = self.arrived.lock();
        *arrived += 1;
        if *arrived >= self.parties {
            let _ = self.all_here.notify_all();
            return true;
        }

        while *arrived < self.parties {
            if self.all_here.wait_until(&mut arrived, deadline).timed_out() {
                return *arrived >= self.parties;
            }
        }
        true
    }
}
