//! Pre-flight budget reservations.

use super::TenantAccount;
use parking_lot::Mutex;
use std::sync::Arc;

/// Budget held for one in-flight request.
///
/// Created by [`BudgetLedger::reserve`](super::BudgetLedger::reserve) after
/// the pre-flight check passes. While alive, the estimate counts against the
/// tenant's limits so concurrent requests cannot jointly overshoot. Consumed
/// by [`BudgetLedger::commit`](super::BudgetLedger::commit); dropping it
/// uncommitted gives the budget back.
#[derive(Debug)]
pub struct BudgetReservation {
    pub(super) tenant_id: String,
    pub(super) model: String,
    pub(super) estimated_cost: f64,
    pub(super) estimated_tokens: u64,
    pub(super) account: Arc<Mutex<TenantAccount>>,
    pub(super) released: bool,
}

impl BudgetReservation {
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Model the estimate was priced against
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn estimated_cost(&self) -> f64 {
        self.estimated_cost
    }

    pub fn estimated_tokens(&self) -> u64 {
        self.estimated_tokens
    }

    /// Remove this reservation from the pending totals of an already-locked account.
    pub(super) fn release_locked(&mut self, account: &mut TenantAccount) {
        if !self.released {
            account
                .pending
                .release(self.estimated_cost, self.estimated_tokens);
            self.released = true;
        }
    }
}

impl Drop for BudgetReservation {
    fn drop(&mut self) {
        if !self.released {
            let account = Arc::clone(&self.account);
            let mut guard = account.lock();
            self.release_locked(&mut guard);
            tracing::debug!(
                tenant_id = %self.tenant_id,
                estimated_cost = self.estimated_cost,
                "Released unused budget reservation"
            );
        }
    }
}
