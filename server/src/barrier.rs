//! One-shot acknowledgement barrier.
//!
//! Broadcast-then-wait steps (pattern choices sent, dice drafted) block the
//! match until every active player acks or a fallback timer fires. Whichever
//! happens first releases the barrier; the other path becomes a no-op.

#[derive(Debug)]
pub struct AckBarrier {
    needed: usize,
    count: usize,
    released: bool,
}

impl AckBarrier {
    pub fn new(needed: usize) -> Self {
        Self {
            needed,
            count: 0,
            released: false,
        }
    }

    /// Records one acknowledgement. Returns true when this ack releases the
    /// barrier; once released, further acks are ignored.
    pub fn ack(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.count += 1;
        if self.count >= self.needed {
            self.released = true;
            true
        } else {
            false
        }
    }

    /// Timer fallback. Returns true unless the barrier already released.
    pub fn force(&mut self) -> bool {
        if self.released {
            false
        } else {
            self.released = true;
            true
        }
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn remaining(&self) -> usize {
        self.needed.saturating_sub(self.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_releases_on_final_ack() {
        let mut barrier = AckBarrier::new(3);
        assert!(!barrier.ack());
        assert!(!barrier.ack());
        assert_eq!(barrier.remaining(), 1);
        assert!(barrier.ack());
        assert!(barrier.is_released());
    }

    #[test]
    fn test_force_then_ack_fires_once() {
        let mut barrier = AckBarrier::new(2);
        assert!(barrier.force());
        assert!(!barrier.ack());
        assert!(!barrier.force());
    }

    #[test]
    fn test_zero_needed_releases_immediately() {
        let mut barrier = AckBarrier::new(0);
        assert_eq!(barrier.remaining(), 0);
        assert!(barrier.force());
    }
}
