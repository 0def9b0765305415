//! Wake Signals
//!
//! Every role thread blocks on exactly one [`WakeSignal`]. A producer sets
//! it, the role's single consumer takes it. How many sets a signal retains
//! before its consumer runs is the [`WakePolicy`]:
//!
//! - `Coalesce`: any number of sets before the consumer wakes collapse into
//!   one wakeup. Two same-type requests that arrive before the first is
//!   serviced are seen as one.
//! - `Counting { depth }`: up to `depth` sets are retained and each produces
//!   its own wakeup; sets beyond that are dropped with a warning.
//!
//! Neither policy can run a role twice at once: there is one thread per
//! role and it only waits again after finishing its cycle.
//!
//! Closing a signal releases its consumer for good; this is how the bridge
//! shuts down.

use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Thread roles of the bridge, one Wake Signal each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Request Dispatcher, woken by the interrupt entry
    Dispatch,
    /// Console output of staged text
    TerminalWrite,
    /// Console line input into the Inbound window
    TerminalRead,
    /// Datagram send of staged text
    NetworkWrite,
    /// Datagram receive into the Inbound window
    NetworkRead,
    /// Operator-triggered window dump
    DebugDump,
}

impl Role {
    /// All roles, in signal index order.
    pub const ALL: [Self; 6] = [
        Self::Dispatch,
        Self::TerminalWrite,
        Self::TerminalRead,
        Self::NetworkWrite,
        Self::NetworkRead,
        Self::DebugDump,
    ];

    /// Thread name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Dispatch => "dispatch",
            Self::TerminalWrite => "term-write",
            Self::TerminalRead => "term-read",
            Self::NetworkWrite => "inet-write",
            Self::NetworkRead => "inet-read",
            Self::DebugDump => "debug-dump",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How many pending wake-ups a signal retains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WakePolicy {
    /// One-shot flag; repeated sets collapse.
    #[default]
    Coalesce,
    /// Counting signal bounded at `depth` pending wake-ups (minimum 1).
    Counting {
        /// Maximum retained wake-ups
        depth: usize,
    },
}

impl WakePolicy {
    fn limit(self) -> usize {
        match self {
            Self::Coalesce => 1,
            Self::Counting { depth } => depth.max(1),
        }
    }
}

#[derive(Debug, Default)]
struct Pending {
    count: usize,
    closed: bool,
}

/// One role's wake signal.
#[derive(Debug)]
pub struct WakeSignal {
    role: Role,
    policy: WakePolicy,
    pending: Mutex<Pending>,
    ready: Condvar,
}

impl WakeSignal {
    /// Unset signal for `role`.
    pub fn new(role: Role, policy: WakePolicy) -> Self {
        Self {
            role,
            policy,
            pending: Mutex::new(Pending::default()),
            ready: Condvar::new(),
        }
    }

    fn pending(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the signal. Returns `false` if the set added no new wake-up
    /// (coalesced, over depth, or closed).
    pub fn set(&self) -> bool {
        let mut pending = self.pending();
        if pending.closed {
            return false;
        }
        if pending.count >= self.policy.limit() {
            if let WakePolicy::Counting { depth } = self.policy {
                tracing::warn!("{}: {depth} wake-ups already pending, dropping one", self.role);
            } else {
                tracing::debug!("{}: wake-up coalesced", self.role);
            }
            return false;
        }
        pending.count += 1;
        drop(pending);
        self.ready.notify_one();
        true
    }

    /// Block until set, consuming one wake-up. Returns `false` once the
    /// signal is closed.
    pub fn wait(&self) -> bool {
        let mut pending = self.pending();
        loop {
            if pending.closed {
                return false;
            }
            if pending.count > 0 {
                pending.count -= 1;
                return true;
            }
            pending = self
                .ready
                .wait(pending)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Consume one wake-up if one is pending, without blocking.
    pub fn try_wait(&self) -> bool {
        let mut pending = self.pending();
        if pending.closed || pending.count == 0 {
            return false;
        }
        pending.count -= 1;
        true
    }

    /// Release the consumer permanently.
    pub fn close(&self) {
        self.pending().closed = true;
        self.ready.notify_all();
    }

    /// Whether [`Self::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.pending().closed
    }

    /// Wake-ups not yet consumed.
    pub fn pending_count(&self) -> usize {
        self.pending().count
    }

    /// Role this signal wakes.
    pub const fn role(&self) -> Role {
        self.role
    }
}

/// The six role signals of one bridge.
#[derive(Debug)]
pub struct Signals {
    signals: [WakeSignal; 6],
}

impl Signals {
    /// One unset signal per role, all with `policy`.
    pub fn new(policy: WakePolicy) -> Self {
        Self {
            signals: Role::ALL.map(|role| WakeSignal::new(role, policy)),
        }
    }

    /// Signal of `role`.
    pub fn get(&self, role: Role) -> &WakeSignal {
        &self.signals[role.index()]
    }

    /// Set the signal of `role`.
    pub fn set(&self, role: Role) -> bool {
        self.get(role).set()
    }

    /// Close every signal.
    pub fn close_all(&self) {
        for signal in &self.signals {
            signal.close();
        }
    }

    /// Pending wake-ups per role, in [`Role::ALL`] order.
    pub fn snapshot(&self) -> [usize; 6] {
        Role::ALL.map(|role| self.get(role).pending_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn coalesced_sets_wake_once() {
        let signal = WakeSignal::new(Role::TerminalWrite, WakePolicy::Coalesce);
        assert!(signal.set());
        assert!(!signal.set());
        assert!(signal.try_wait());
        assert!(!signal.try_wait());
    }

    #[test]
    fn counting_retains_up_to_depth() {
        let signal = WakeSignal::new(Role::NetworkRead, WakePolicy::Counting { depth: 2 });
        assert!(signal.set());
        assert!(signal.set());
        assert!(!signal.set());
        assert_eq!(signal.pending_count(), 2);
        assert!(signal.wait());
        assert!(signal.wait());
        assert!(!signal.try_wait());
    }

    #[test]
    fn zero_depth_behaves_like_coalesce() {
        let signal = WakeSignal::new(Role::Dispatch, WakePolicy::Counting { depth: 0 });
        assert!(signal.set());
        assert!(!signal.set());
    }

    #[test]
    fn close_releases_blocked_waiter() {
        let signal = Arc::new(WakeSignal::new(Role::DebugDump, WakePolicy::Coalesce));
        let waiter = {
            let signal = signal.clone();
            std::thread::spawn(move || signal.wait())
        };
        std::thread::sleep(Duration::from_millis(20));
        signal.close();
        assert!(!waiter.join().unwrap());
        assert!(!signal.set());
        assert!(signal.is_closed());
    }

    #[test]
    fn set_wakes_blocked_waiter() {
        let signal = Arc::new(WakeSignal::new(Role::TerminalRead, WakePolicy::Coalesce));
        let waiter = {
            let signal = signal.clone();
            std::thread::spawn(move || signal.wait())
        };
        signal.set();
        assert!(waiter.join().unwrap());
        assert_eq!(signal.pending_count(), 0);
    }

    #[test]
    fn signals_are_indexed_by_role() {
        let signals = Signals::new(WakePolicy::Coalesce);
        signals.set(Role::NetworkWrite);
        assert_eq!(signals.snapshot(), [0, 0, 0, 1, 0, 0]);
        for role in Role::ALL {
            assert_eq!(signals.get(role).role(), role);
        }
        signals.close_all();
        assert!(Role::ALL.iter().all(|&r| signals.get(r).is_closed()));
    }
}
