//! Sequence reconciliation
//!
//! Compares the newest sequence number of an incoming burst with the
//! peer's cursor and decides how many burst slots to admit.
//!
//! | gap            | outcome                               |
//! |----------------|---------------------------------------|
//! | `< 0`          | [`Reconciliation::Stale`]             |
//! | `0`            | [`Reconciliation::Idle`]              |
//! | `1..=window`   | [`Reconciliation::Admit`] `gap` slots |
//! | `> window`     | [`Reconciliation::Overrun`]           |

/// What to do with an incoming burst
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// Older than the cursor: a late or duplicated datagram
    Stale { behind: u64 },
    /// Re-announcement of the packet the cursor already points at
    Idle,
    /// Admit this many slots, oldest first
    Admit(usize),
    /// More packets were lost than a burst can carry
    Overrun { gap: u64 },
}

impl Reconciliation {
    /// Number of slots to forward
    pub fn admitted(&self) -> usize {
        match self {
            Reconciliation::Admit(count) => *count,
            _ => 0,
        }
    }
}

/// Reconcile a burst whose newest packet is `newest` against `cursor`
pub fn reconcile(cursor: u64, newest: u64, window: usize) -> Reconciliation {
    if newest < cursor {
        return Reconciliation::Stale {
            behind: cursor - newest,
        };
    }

    let gap = newest - cursor;
    if gap == 0 {
        Reconciliation::Idle
    } else if gap <= window as u64 {
        Reconciliation::Admit(gap as usize)
    } else {
        Reconciliation::Overrun { gap }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::WINDOW_SIZE;

    #[test]
    fn test_next_in_sequence() {
        assert_eq!(reconcile(0, 1, WINDOW_SIZE), Reconciliation::Admit(1));
    }

    #[test]
    fn test_recoverable_gap() {
        assert_eq!(reconcile(1, 3, WINDOW_SIZE), Reconciliation::Admit(2));
        assert_eq!(
            reconcile(1, 1 + WINDOW_SIZE as u64, WINDOW_SIZE),
            Reconciliation::Admit(WINDOW_SIZE)
        );
    }

    #[test]
    fn test_overrun() {
        let gap = WINDOW_SIZE as u64 + 1;
        assert_eq!(
            reconcile(1, 1 + gap, WINDOW_SIZE),
            Reconciliation::Overrun { gap }
        );
        assert_eq!(reconcile(1, 1 + gap, WINDOW_SIZE).admitted(), 0);
    }

    #[test]
    fn test_idle_and_stale() {
        assert_eq!(reconcile(7, 7, WINDOW_SIZE), Reconciliation::Idle);
        assert_eq!(
            reconcile(7, 4, WINDOW_SIZE),
            Reconciliation::Stale { behind: 3 }
        );
        assert_eq!(reconcile(7, 4, WINDOW_SIZE).admitted(), 0);
    }

    #[test]
    fn test_extreme_sequences() {
        assert_eq!(
            reconcile(0, u64::MAX, WINDOW_SIZE),
            Reconciliation::Overrun { gap: u64::MAX }
        );
        assert_eq!(
            reconcile(u64::MAX, 0, WINDOW_SIZE),
            Reconciliation::Stale { behind: u64::MAX }
        );
    }
}
