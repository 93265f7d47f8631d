//! Pending request set shared by the deposit and redeem sides: ordered ids
//! assigned from 1, never reused; a request is read-only until its single
//! terminal transition (cancellation or execution) removes it.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::errors::FundError;
use crate::AccountId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingRequest {
    pub id: u64,
    pub controller: AccountId,
    pub amount: u128,
    pub can_cancel_after: u64,
}

pub struct RequestQueue {
    next_id: u64,
    pending: FxHashMap<u64, PendingRequest>,
    min_request_duration: u64,
}

impl RequestQueue {
    pub fn new(min_request_duration: u64) -> Self {
        Self { next_id: 1, pending: FxHashMap::default(), min_request_duration }
    }

    pub fn min_request_duration(&self) -> u64 {
        self.min_request_duration
    }

    pub fn submit(
        &mut self,
        controller: AccountId,
        amount: u128,
        now: u64,
    ) -> Result<u64, FundError> {
        if amount == 0 {
            return Err(FundError::InvalidAmount("request amount must be positive".into()));
        }
        let id = self.next_id;
        self.next_id += 1;
        self.pending.insert(
            id,
            PendingRequest {
                id,
                controller,
                amount,
                can_cancel_after: now + self.min_request_duration,
            },
        );
        Ok(id)
    }

    /// Check the cancellation preconditions without mutating: the caller
    /// must be the controller and the holding period must have elapsed.
    pub fn check_cancellable(
        &self,
        caller: AccountId,
        id: u64,
        now: u64,
    ) -> Result<&PendingRequest, FundError> {
        let request = self.pending.get(&id).ok_or(FundError::RequestNotFound(id))?;
        if request.controller != caller {
            return Err(FundError::Unauthorized { account: caller, required: "request controller" });
        }
        if now < request.can_cancel_after {
            return Err(FundError::TimingNotElapsed {
                can_cancel_after: request.can_cancel_after,
                now,
            });
        }
        Ok(request)
    }

    /// Remove a request for fulfillment or after a validated cancellation.
    /// A missing id resolves the cancel-vs-execute race: whichever
    /// transition finalized first wins, the other observes `RequestNotFound`.
    pub fn take(&mut self, id: u64) -> Result<PendingRequest, FundError> {
        self.pending.remove(&id).ok_or(FundError::RequestNotFound(id))
    }

    pub fn get(&self, id: u64) -> Option<&PendingRequest> {
        self.pending.get(&id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.pending.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_monotonic_from_one() {
        let mut queue = RequestQueue::new(60);
        assert_eq!(queue.submit(1, 100, 0).unwrap(), 1);
        assert_eq!(queue.submit(2, 100, 0).unwrap(), 2);
        queue.take(1).unwrap();
        // ids are never reused, even after removal
        assert_eq!(queue.submit(1, 100, 0).unwrap(), 3);
    }

    #[test]
    fn test_zero_amount_rejected() {
        let mut queue = RequestQueue::new(60);
        assert!(matches!(queue.submit(1, 0, 0), Err(FundError::InvalidAmount(_))));
    }

    #[test]
    fn test_cancellation_preconditions() {
        let mut queue = RequestQueue::new(60);
        let id = queue.submit(1, 100, 1000).unwrap();

        // wrong caller
        assert!(matches!(
            queue.check_cancellable(2, id, 2000),
            Err(FundError::Unauthorized { .. })
        ));
        // too early
        assert!(matches!(
            queue.check_cancellable(1, id, 1059),
            Err(FundError::TimingNotElapsed { can_cancel_after: 1060, now: 1059 })
        ));
        // exactly at the boundary succeeds
        assert!(queue.check_cancellable(1, id, 1060).is_ok());
    }

    #[test]
    fn test_take_twice_fails() {
        let mut queue = RequestQueue::new(0);
        let id = queue.submit(1, 100, 0).unwrap();
        queue.take(id).unwrap();
        assert!(matches!(queue.take(id), Err(FundError::RequestNotFound(_))));
    }
}
