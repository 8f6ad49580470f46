//! Upgradeable read/write lock with a broadcast wake-up signal.
//!
//! [`SignalLock`] coordinates the state transitions of a connection. Any
//! number of threads may hold it for reading; one thread may hold it for
//! writing, and that thread may also hold reads. A thread holding a read may
//! upgrade to a write once every other reader has left. Both levels are
//! reentrant: a thread acquiring either level several times must release it
//! the same number of times.
//!
//! [`SignalLock::wait_for_signal`] lets a holder give up every level it holds,
//! sleep until another thread calls [`SignalLock::post_signal`] (or a timeout
//! elapses), and then take its levels back. Connections post a signal after
//! each state change so waiters in `join` observe it.
//!
//! Misuse, such as releasing a level the thread does not hold, is a
//! programming error and panics.

use std::{
    cell::RefCell,
    collections::HashMap,
    fmt,
    marker::PhantomData,
    sync::{
        Condvar,
        Mutex,
        MutexGuard,
        PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

static NEXT_LOCK_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static HOLDINGS: RefCell<HashMap<u64, Holdings>> = RefCell::new(HashMap::new());
}

/// Per-thread acquisition counts for one lock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Holdings {
    read: usize,
    write: usize,
}

impl Holdings {
    fn is_empty(self) -> bool { self.read == 0 && self.write == 0 }
}

#[derive(Debug, Default)]
struct LockState {
    /// Threads holding at least one read level.
    readers: usize,
    /// Whether some thread holds the write level.
    writer: bool,
    /// Threads blocked in `acquire_write`.
    pending_writers: usize,
    signal_epoch: u64,
}

/// Reentrant, upgradeable read/write lock with a signal facility.
///
/// # Examples
///
/// ```
/// use chatnet::sync::SignalLock;
///
/// let lock = SignalLock::new();
/// let read = lock.read();
/// let write = lock.write();
/// assert_eq!((lock.read_level(), lock.write_level()), (1, 1));
/// drop(write);
/// drop(read);
/// assert_eq!(lock.read_level(), 0);
/// ```
pub struct SignalLock {
    id: u64,
    state: Mutex<LockState>,
    changed: Condvar,
}

impl Default for SignalLock {
    fn default() -> Self { Self::new() }
}

impl fmt::Debug for SignalLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock_state();
        f.debug_struct("SignalLock")
            .field("readers", &state.readers)
            .field("writer", &state.writer)
            .field("pending_writers", &state.pending_writers)
            .finish()
    }
}

impl SignalLock {
    /// Create an unheld lock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: NEXT_LOCK_ID.fetch_add(1, Ordering::Relaxed),
            state: Mutex::new(LockState::default()),
            changed: Condvar::new(),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, LockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, LockState>) -> MutexGuard<'a, LockState> {
        self.changed
            .wait(guard)
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_until<'a>(
        &self,
        guard: MutexGuard<'a, LockState>,
        deadline: Instant,
    ) -> MutexGuard<'a, LockState> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        self.changed
            .wait_timeout(guard, remaining)
            .unwrap_or_else(PoisonError::into_inner)
            .0
    }

    fn holdings(&self) -> Holdings {
        HOLDINGS.with(|map| map.borrow().get(&self.id).copied().unwrap_or_default())
    }

    fn set_holdings(&self, holdings: Holdings) {
        HOLDINGS.with(|map| {
            let mut map = map.borrow_mut();
            if holdings.is_empty() {
                map.remove(&self.id);
            } else {
                map.insert(self.id, holdings);
            }
        });
    }

    /// Acquire one read level.
    ///
    /// Blocks while another thread holds the write level. With `wait` set to
    /// `false` the call returns `false` instead of blocking.
    pub fn acquire_read(&self, wait: bool) -> bool {
        let mut state = self.lock_state();
        let mut held = self.holdings();
        while state.writer && held.write == 0 {
            if !wait {
                return false;
            }
            state = self.wait(state);
        }
        if held.read == 0 {
            state.readers += 1;
        }
        held.read += 1;
        self.set_holdings(held);
        true
    }

    /// Release one read level.
    ///
    /// # Panics
    ///
    /// Panics if the calling thread holds no read level.
    pub fn release_read(&self) {
        let mut state = self.lock_state();
        let mut held = self.holdings();
        assert!(
            held.read > 0,
            "release_read called by a thread that holds no read lock"
        );
        held.read -= 1;
        if held.read == 0 {
            state.readers -= 1;
            self.changed.notify_all();
        }
        self.set_holdings(held);
    }

    /// Acquire one write level.
    ///
    /// Blocks while any other thread holds a read level or the write level.
    /// A read level held by the caller does not block it, which makes this an
    /// upgrade. With `wait` set to `false` the call returns `false` instead of
    /// blocking.
    pub fn acquire_write(&self, wait: bool) -> bool {
        let mut state = self.lock_state();
        let mut held = self.holdings();
        state.pending_writers += 1;
        let acquired = loop {
            let other_readers = state.readers - usize::from(held.read > 0);
            let other_writer = state.writer && held.write == 0;
            if other_readers == 0 && !other_writer {
                break true;
            }
            if !wait {
                break false;
            }
            state = self.wait(state);
        };
        state.pending_writers -= 1;
        if acquired {
            state.writer = true;
            held.write += 1;
            self.set_holdings(held);
        }
        acquired
    }

    /// Release one write level.
    ///
    /// # Panics
    ///
    /// Panics if the calling thread holds no write level.
    pub fn release_write(&self) {
        let mut state = self.lock_state();
        let mut held = self.holdings();
        assert!(
            held.write > 0,
            "release_write called by a thread that holds no write lock"
        );
        held.write -= 1;
        if held.write == 0 {
            state.writer = false;
            self.changed.notify_all();
        }
        self.set_holdings(held);
    }

    /// Release every level held by this thread and wait for a signal.
    ///
    /// Returns `true` if [`post_signal`](Self::post_signal) was called while
    /// waiting and `false` if `timeout` elapsed first. `None` waits without a
    /// bound. Before returning the thread takes back exactly the levels it
    /// held, write first and read second, blocking as the acquire calls do.
    pub fn wait_for_signal(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let mut state = self.lock_state();
        let held = self.holdings();
        if held.read > 0 {
            state.readers -= 1;
        }
        if held.write > 0 {
            state.writer = false;
        }
        self.set_holdings(Holdings::default());
        if !held.is_empty() {
            self.changed.notify_all();
        }

        let epoch = state.signal_epoch;
        while state.signal_epoch == epoch {
            match deadline {
                None => state = self.wait(state),
                Some(deadline) if Instant::now() >= deadline => break,
                Some(deadline) => state = self.wait_until(state, deadline),
            }
        }
        let signalled = state.signal_epoch != epoch;

        if held.write > 0 {
            while state.writer || state.readers > 0 {
                state = self.wait(state);
            }
            state.writer = true;
        }
        if held.read > 0 {
            while state.writer && held.write == 0 {
                state = self.wait(state);
            }
            state.readers += 1;
        }
        self.set_holdings(held);
        signalled
    }

    /// Wake every thread currently blocked in
    /// [`wait_for_signal`](Self::wait_for_signal).
    pub fn post_signal(&self) {
        let mut state = self.lock_state();
        state.signal_epoch = state.signal_epoch.wrapping_add(1);
        self.changed.notify_all();
    }

    /// Read levels held by the calling thread.
    #[must_use]
    pub fn read_level(&self) -> usize { self.holdings().read }

    /// Write levels held by the calling thread.
    #[must_use]
    pub fn write_level(&self) -> usize { self.holdings().write }

    /// Threads currently blocked waiting for the write level.
    #[must_use]
    pub fn pending_writers(&self) -> usize { self.lock_state().pending_writers }

    /// Acquire a read level released when the guard drops.
    pub fn read(&self) -> ReadGuard<'_> {
        self.acquire_read(true);
        ReadGuard {
            lock: self,
            _thread_bound: PhantomData,
        }
    }

    /// Acquire a read level without blocking.
    pub fn try_read(&self) -> Option<ReadGuard<'_>> {
        self.acquire_read(false).then(|| ReadGuard {
            lock: self,
            _thread_bound: PhantomData,
        })
    }

    /// Acquire a write level released when the guard drops.
    pub fn write(&self) -> WriteGuard<'_> {
        self.acquire_write(true);
        WriteGuard {
            lock: self,
            _thread_bound: PhantomData,
        }
    }

    /// Acquire a write level without blocking.
    pub fn try_write(&self) -> Option<WriteGuard<'_>> {
        self.acquire_write(false).then(|| WriteGuard {
            lock: self,
            _thread_bound: PhantomData,
        })
    }
}

/// Scoped read level on a [`SignalLock`].
///
/// Levels are tracked per thread, so guards cannot leave the thread that
/// created them.
#[must_use = "the read level is released as soon as the guard drops"]
pub struct ReadGuard<'a> {
    lock: &'a SignalLock,
    _thread_bound: PhantomData<*const ()>,
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) { self.lock.release_read(); }
}

/// Scoped write level on a [`SignalLock`].
#[must_use = "the write level is released as soon as the guard drops"]
pub struct WriteGuard<'a> {
    lock: &'a SignalLock,
    _thread_bound: PhantomData<*const ()>,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) { self.lock.release_write(); }
}
