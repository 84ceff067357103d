//! Next-tick and timer queues for the single-threaded reactor.
//!
//! Channels hold a clone of the [`Scheduler`] and ask for their own work to
//! be run later, addressed by their token. The reactor collects whatever is
//! due on each turn and hands it back to the owning channel.

use std::cell::RefCell;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};
use std::rc::Rc;
use std::time::{Duration, Instant};

use mio::Token;

/// Deferred work for a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Task {
    /// Open the connection to the channel's node.
    Connect,
    /// Write the next batch of queued requests.
    ProcessQueue,
}

#[derive(Default)]
struct Queues {
    ticks: VecDeque<(Token, Task)>,
    timers: BinaryHeap<Reverse<(Instant, u64, Token, Task)>>,
    sequence: u64,
}

/// Shared handle to the tick and timer queues.
#[derive(Clone, Default)]
pub struct Scheduler {
    queues: Rc<RefCell<Queues>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `task` on the next reactor turn.
    pub fn next_tick(&self, token: Token, task: Task) {
        self.queues.borrow_mut().ticks.push_back((token, task));
    }

    /// Runs `task` once `delay` has elapsed.
    pub fn after(&self, delay: Duration, token: Token, task: Task) {
        let mut queues = self.queues.borrow_mut();
        let sequence = queues.sequence;
        queues.sequence += 1;
        queues
            .timers
            .push(Reverse((Instant::now() + delay, sequence, token, task)));
    }

    /// Everything due at `now`: ticks queued so far, then expired timers in
    /// deadline order. Ticks queued while the result is processed wait for
    /// the next call.
    pub fn due(&self, now: Instant) -> Vec<(Token, Task)> {
        let mut queues = self.queues.borrow_mut();
        let mut due: Vec<_> = queues.ticks.drain(..).collect();

        while let Some(Reverse((deadline, _, token, task))) = queues.timers.peek().copied() {
            if deadline > now {
                break;
            }
            queues.timers.pop();
            due.push((token, task));
        }
        due
    }

    /// Earliest pending timer.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.queues
            .borrow()
            .timers
            .peek()
            .map(|Reverse((deadline, ..))| *deadline)
    }

    pub fn has_ticks(&self) -> bool {
        !self.queues.borrow().ticks.is_empty()
    }

    pub fn timer_count(&self) -> usize {
        self.queues.borrow().timers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticks_run_once_in_order() {
        let scheduler = Scheduler::new();
        scheduler.next_tick(Token(1), Task::Connect);
        scheduler.next_tick(Token(2), Task::ProcessQueue);

        let now = Instant::now();
        assert_eq!(
            scheduler.due(now),
            vec![(Token(1), Task::Connect), (Token(2), Task::ProcessQueue)]
        );
        assert!(scheduler.due(now).is_empty());
    }

    #[test]
    fn test_timers_wait_for_deadline() {
        let scheduler = Scheduler::new();
        scheduler.after(Duration::from_secs(1), Token(1), Task::Connect);

        assert_eq!(scheduler.timer_count(), 1);
        assert!(scheduler.due(Instant::now()).is_empty());
        assert!(scheduler.next_deadline().is_some());

        let later = Instant::now() + Duration::from_millis(1100);
        assert_eq!(scheduler.due(later), vec![(Token(1), Task::Connect)]);
        assert_eq!(scheduler.timer_count(), 0);
    }

    #[test]
    fn test_timers_fire_by_deadline() {
        let scheduler = Scheduler::new();
        scheduler.after(Duration::from_millis(20), Token(1), Task::Connect);
        scheduler.after(Duration::from_millis(10), Token(2), Task::Connect);

        let later = Instant::now() + Duration::from_secs(1);
        assert_eq!(
            scheduler.due(later),
            vec![(Token(2), Task::Connect), (Token(1), Task::Connect)]
        );
    }
}
