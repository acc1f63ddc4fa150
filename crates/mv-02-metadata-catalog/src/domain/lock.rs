//! # File Lock
//!
//! Reentrant reader/writer lock guarding one logical file's block sequence.
//!
//! Hold counts are tracked per thread, which makes two things possible:
//!
//! - a thread may re-enter the lock (read under read, read or write under
//!   write, and write under its own sole read hold);
//! - `release_all` hands back a `LockDepth` that `restore` uses to reacquire
//!   exactly the same number of read and write holds.
//!
//! There is no writer preference: a new reader only waits while another
//! thread owns the write side.

use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::thread::{self, ThreadId};

/// Read and write holds of one thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockDepth {
    pub reads: usize,
    pub writes: usize,
}

impl LockDepth {
    pub fn is_empty(&self) -> bool {
        self.reads == 0 && self.writes == 0
    }
}

#[derive(Debug, Default)]
struct Holders {
    readers: HashMap<ThreadId, usize>,
    writer: Option<(ThreadId, usize)>,
}

impl Holders {
    fn writer_free_for(&self, me: ThreadId) -> bool {
        match self.writer {
            None => true,
            Some((owner, _)) => owner == me,
        }
    }

    fn no_other_readers(&self, me: ThreadId) -> bool {
        self.readers.keys().all(|&reader| reader == me)
    }

    fn can_read(&self, me: ThreadId) -> bool {
        self.writer_free_for(me)
    }

    fn can_write(&self, me: ThreadId) -> bool {
        self.writer_free_for(me) && self.no_other_readers(me)
    }

    fn depth_of(&self, me: ThreadId) -> LockDepth {
        LockDepth {
            reads: self.readers.get(&me).copied().unwrap_or(0),
            writes: match self.writer {
                Some((owner, count)) if owner == me => count,
                _ => 0,
            },
        }
    }
}

/// Reentrant, depth-tracking reader/writer lock.
#[derive(Debug, Default)]
pub struct FileLock {
    holders: Mutex<Holders>,
    released: Condvar,
}

impl FileLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire a read hold; released when the guard drops.
    pub fn read(&self) -> ReadGuard<'_> {
        self.acquire_read();
        ReadGuard {
            lock: self,
            _not_send: PhantomData,
        }
    }

    /// Acquire a write hold; released when the guard drops.
    ///
    /// Upgrading from a read hold waits until every other reader has left.
    pub fn write(&self) -> WriteGuard<'_> {
        self.acquire_write();
        WriteGuard {
            lock: self,
            _not_send: PhantomData,
        }
    }

    /// Holds of the calling thread.
    pub fn hold_counts(&self) -> LockDepth {
        self.holders.lock().depth_of(thread::current().id())
    }

    /// Whether any thread currently owns the write side.
    pub fn is_write_locked(&self) -> bool {
        self.holders.lock().writer.is_some()
    }

    /// Number of threads holding a read.
    pub fn reader_count(&self) -> usize {
        self.holders.lock().readers.len()
    }

    /// Drop every hold of the calling thread, returning what was held.
    ///
    /// Outstanding guards stay valid only if `restore` is called with the
    /// returned depth before they drop.
    pub fn release_all(&self) -> LockDepth {
        let me = thread::current().id();
        let mut holders = self.holders.lock();
        let depth = holders.depth_of(me);
        holders.readers.remove(&me);
        if depth.writes > 0 {
            holders.writer = None;
        }
        drop(holders);

        if !depth.is_empty() {
            self.released.notify_all();
        }
        depth
    }

    /// Reacquire holds released by `release_all`. Blocks until the write side
    /// (if any was held) and the read side are both available.
    pub fn restore(&self, depth: LockDepth) {
        if depth.is_empty() {
            return;
        }
        let me = thread::current().id();
        let mut holders = self.holders.lock();
        loop {
            let ready = if depth.writes > 0 {
                holders.can_write(me)
            } else {
                holders.can_read(me)
            };
            if ready {
                break;
            }
            self.released.wait(&mut holders);
        }

        if depth.writes > 0 {
            let held = holders.depth_of(me).writes;
            holders.writer = Some((me, held + depth.writes));
        }
        if depth.reads > 0 {
            *holders.readers.entry(me).or_insert(0) += depth.reads;
        }
    }

    fn acquire_read(&self) {
        let me = thread::current().id();
        let mut holders = self.holders.lock();
        while !holders.can_read(me) {
            self.released.wait(&mut holders);
        }
        *holders.readers.entry(me).or_insert(0) += 1;
    }

    fn acquire_write(&self) {
        let me = thread::current().id();
        let mut holders = self.holders.lock();
        while !holders.can_write(me) {
            self.released.wait(&mut holders);
        }
        let held = holders.depth_of(me).writes;
        holders.writer = Some((me, held + 1));
    }

    fn release_read(&self) {
        let me = thread::current().id();
        let mut holders = self.holders.lock();
        let emptied = match holders.readers.get_mut(&me) {
            Some(count) => {
                *count -= 1;
                *count == 0
            }
            None => false,
        };
        if emptied {
            holders.readers.remove(&me);
            drop(holders);
            self.released.notify_all();
        }
    }

    fn release_write(&self) {
        let me = thread::current().id();
        let mut holders = self.holders.lock();
        let freed = match holders.writer.as_mut() {
            Some((owner, count)) if *owner == me => {
                *count -= 1;
                *count == 0
            }
            _ => false,
        };
        if freed {
            holders.writer = None;
            drop(holders);
            self.released.notify_all();
        }
    }
}

/// Read hold on a `FileLock`. Must be dropped on the acquiring thread.
#[must_use = "the read hold is released as soon as the guard is dropped"]
pub struct ReadGuard<'a> {
    lock: &'a FileLock,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        self.lock.release_read();
    }
}

/// Write hold on a `FileLock`. Must be dropped on the acquiring thread.
#[must_use = "the write hold is released as soon as the guard is dropped"]
pub struct WriteGuard<'a> {
    lock: &'a FileLock,
    _not_send: PhantomData<*const ()>,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        self.lock.release_write();
    }
}
