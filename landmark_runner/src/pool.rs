//! Bounded pool of reusable frame buffers.
//!
//! Buffers are allocated lazily up to `capacity` and handed out as
//! [`FrameLease`]s.  Dropping a lease puts its buffer back, so every exit
//! path of the dispatcher (success, skip, error, stop) releases exactly once.

use std::cell::RefCell;
use std::ops::{Deref, DerefMut};
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::frame::FrameBuffer;

#[derive(Debug)]
struct PoolInner {
    free:      Vec<FrameBuffer>,
    allocated: usize,
    closed:    bool,
    width:     u32,
    height:    u32,
}

#[derive(Debug)]
pub struct FramePool {
    inner:    Rc<RefCell<PoolInner>>,
    capacity: usize,
}

impl FramePool {
    pub fn new(capacity: usize, width: u32, height: u32) -> Self {
        FramePool {
            inner: Rc::new(RefCell::new(PoolInner {
                free: Vec::with_capacity(capacity),
                allocated: 0,
                closed: false,
                width,
                height,
            })),
            capacity,
        }
    }

    /// A free buffer, or `None` when all `capacity` buffers are out.
    pub fn try_acquire(&self) -> Option<FrameLease> {
        let mut inner = self.inner.borrow_mut();
        if inner.closed {
            return None;
        }
        let buffer = match inner.free.pop() {
            Some(b) => b,
            None if inner.allocated < self.capacity => {
                inner.allocated += 1;
                debug!(allocated = inner.allocated, capacity = self.capacity, "frame buffer allocated");
                FrameBuffer::new(inner.width, inner.height)
            }
            None => return None,
        };
        Some(FrameLease { buffer: Some(buffer), pool: Rc::downgrade(&self.inner) })
    }

    /// Buffers that could be acquired right now.
    pub fn available(&self) -> usize {
        let inner = self.inner.borrow();
        if inner.closed {
            return 0;
        }
        inner.free.len() + (self.capacity - inner.allocated)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_closed(&self) -> bool {
        self.inner.borrow().closed
    }

    /// Free all idle buffers and refuse further acquisitions.  Buffers still
    /// leased are dropped when their lease ends.
    pub fn close(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.closed = true;
        inner.free.clear();
    }
}

/// Exclusive use of one pooled buffer.
#[derive(Debug)]
pub struct FrameLease {
    buffer: Option<FrameBuffer>,
    pool:   Weak<RefCell<PoolInner>>,
}

impl Deref for FrameLease {
    type Target = FrameBuffer;

    fn deref(&self) -> &FrameBuffer {
        // Only taken in Drop.
        self.buffer.as_ref().unwrap_or_else(|| unreachable!("lease used after release"))
    }
}

impl DerefMut for FrameLease {
    fn deref_mut(&mut self) -> &mut FrameBuffer {
        self.buffer.as_mut().unwrap_or_else(|| unreachable!("lease used after release"))
    }
}

impl Drop for FrameLease {
    fn drop(&mut self) {
        let Some(buffer) = self.buffer.take() else { return };
        if let Some(pool) = self.pool.upgrade() {
            let mut inner = pool.borrow_mut();
            if !inner.closed {
                inner.free.push(buffer);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhaustion_and_release() {
        let pool = FramePool::new(2, 4, 4);
        let a = pool.try_acquire().unwrap();
        let b = pool.try_acquire().unwrap();
        assert!(pool.try_acquire().is_none());
        assert_eq!(pool.available(), 0);

        drop(a);
        assert_eq!(pool.available(), 1);
        let c = pool.try_acquire().unwrap();
        assert_eq!(c.width(), 4);
        // one release buys exactly one acquisition
        assert!(pool.try_acquire().is_none());
        drop(b);
        drop(c);
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn buffers_are_reused() {
        let pool = FramePool::new(1, 2, 2);
        {
            let mut lease = pool.try_acquire().unwrap();
            lease.write_readback(&[9u8; 16], Default::default()).unwrap();
        }
        let lease = pool.try_acquire().unwrap();
        assert_eq!(lease.pixels()[0], 9);
    }

    #[test]
    fn closed_pool_refuses_and_swallows_returns() {
        let pool = FramePool::new(3, 1, 1);
        let held = pool.try_acquire().unwrap();
        pool.close();
        assert!(pool.try_acquire().is_none());
        drop(held);
        assert_eq!(pool.available(), 0);
        assert!(pool.is_closed());
    }

    #[test]
    fn lease_outlives_pool() {
        let pool = FramePool::new(1, 1, 1);
        let lease = pool.try_acquire().unwrap();
        drop(pool);
        assert_eq!(lease.height(), 1);
        drop(lease);
    }
}
