//! Fund orchestrator: wires the share ledger, fee ledger, valuation engine,
//! asset book and the two request queues behind the public entry points.
//!
//! Every operation is one indivisible unit of work. The discipline
//! throughout: read all external state (price, rates, position values) into
//! plain values first, then mutate component state; no component is called
//! back into mid-mutation. Batch execution plans every request against a
//! single price snapshot and commits only once the whole plan has resolved,
//! so a failure anywhere leaves nothing applied.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::asset_book::AssetBook;
use crate::clock::Clock;
use crate::errors::FundError;
use crate::events::{EventLog, FundEvent};
use crate::fee_ledger::{FeeConfig, FeeLedger};
use crate::fixed::{self, PRECISION};
use crate::registry::Role;
use crate::request_queue::{PendingRequest, RequestQueue};
use crate::share_ledger::{ShareLedger, TransferValidator};
use crate::state_store::{AccrualCheckpoint, StateStore};
use crate::valuation::{PriceSnapshot, Valuator};
use crate::{log_info, AccountId, AssetId};

#[derive(Debug, Clone, Copy)]
pub struct FundParams {
    /// The deposit asset; must be registered with the valuator.
    pub fund_asset: AssetId,
    /// Bootstrap per-unit price used while no units are outstanding.
    pub default_share_price: u128,
    /// Destination of swept deposits and source of redemptions/claims.
    pub treasury: AccountId,
    /// The only account allowed to settle dynamic fees.
    pub fee_settler: AccountId,
    /// Escrow identity the queues operate under; registered as the
    /// authorized minter and burner at construction.
    pub queue_account: AccountId,
    pub min_request_duration: u64,
}

struct PlannedDeposit {
    id: u64,
    controller: AccountId,
    assets: u128,
    gross_units: u128,
    fee_units: u128,
    net_units: u128,
}

struct PlannedRedemption {
    id: u64,
    controller: AccountId,
    gross_units: u128,
    fee_units: u128,
    net_units: u128,
    assets_out: u128,
}

pub struct Fund {
    params: FundParams,
    shares: ShareLedger,
    fees: FeeLedger,
    valuator: Valuator,
    assets: AssetBook,
    deposits: RequestQueue,
    redemptions: RequestQueue,
    events: EventLog,
    clock: Arc<dyn Clock>,
    store: Option<StateStore>,
}

impl Fund {
    pub fn new(
        owner: AccountId,
        params: FundParams,
        fee_config: FeeConfig,
        valuator: Valuator,
        assets: AssetBook,
        validator: Box<dyn TransferValidator>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, FundError> {
        let mut shares = ShareLedger::new(owner, validator);
        shares.registry_mut().grant(owner, params.queue_account, Role::Minter)?;
        shares.registry_mut().grant(owner, params.queue_account, Role::Burner)?;

        Ok(Self {
            shares,
            fees: FeeLedger::new(fee_config)?,
            valuator,
            assets,
            deposits: RequestQueue::new(params.min_request_duration),
            redemptions: RequestQueue::new(params.min_request_duration),
            events: EventLog::new(),
            clock,
            store: None,
            params,
        })
    }

    /// Resume accrual state from a checkpoint and persist it from now on.
    pub fn attach_store(&mut self, store: StateStore) -> Result<(), FundError> {
        let checkpoint = store.load()?;
        if checkpoint.last_settled != 0 {
            self.fees.reset_last_settled(checkpoint.last_settled)?;
        }
        if checkpoint.high_water_mark != 0 {
            self.fees.reset_high_water_mark(checkpoint.high_water_mark)?;
        }
        self.events = EventLog::with_start_seq(checkpoint.next_event_seq);
        self.store = Some(store);
        Ok(())
    }

    // ==========================================
    // Deposit queue
    // ==========================================

    /// Enqueue a deposit, escrowing the asset amount with the queue.
    /// Delegated requests (`controller != owner`) are not supported.
    pub fn request_deposit(
        &mut self,
        caller: AccountId,
        amount: u128,
        controller: AccountId,
        owner: AccountId,
    ) -> Result<u64, FundError> {
        if owner != caller || controller != caller {
            return Err(FundError::Unauthorized {
                account: caller,
                required: "owner == caller == controller",
            });
        }
        if amount == 0 {
            return Err(FundError::InvalidAmount("deposit amount must be positive".into()));
        }
        if !self.shares.registry().is_holder_admitted(controller) {
            return Err(FundError::Unauthorized { account: controller, required: "admitted holder" });
        }

        let now = self.clock.now();
        self.assets.transfer(caller, self.params.queue_account, amount)?;
        let id = self.deposits.submit(controller, amount, now)?;
        let can_cancel_after = now + self.deposits.min_request_duration();

        log_info!("queue", "deposit request {} from {} for {}", id, controller, amount);
        self.events.emit(
            now,
            FundEvent::DepositRequested { id, controller, assets: amount, can_cancel_after },
        );
        self.checkpoint()?;
        Ok(id)
    }

    /// Cancel a pending deposit after its holding period; refunds exactly
    /// the recorded amount, fee-free.
    pub fn cancel_deposit(&mut self, caller: AccountId, id: u64) -> Result<(), FundError> {
        let now = self.clock.now();
        let amount = self.deposits.check_cancellable(caller, id, now)?.amount;
        self.assets.transfer(self.params.queue_account, caller, amount)?;
        let request = self.deposits.take(id)?;

        self.events.emit(
            now,
            FundEvent::DepositCancelled { id, controller: request.controller, assets: amount },
        );
        self.checkpoint()?;
        Ok(())
    }

    /// Execute a caller-chosen batch of deposit requests at one price
    /// snapshot. Order is caller-determined; a zero-net-units outcome for
    /// any id aborts the whole batch.
    pub fn execute_deposit_requests(
        &mut self,
        caller: AccountId,
        ids: &[u64],
    ) -> Result<(), FundError> {
        self.shares.registry().require_privileged(caller)?;
        if ids.is_empty() {
            return Err(FundError::InvalidAmount("empty batch".into()));
        }
        let snapshot = self.execution_price()?;
        let now = snapshot.as_of;

        // Plan the whole batch before touching any state.
        let mut plan: Vec<PlannedDeposit> = Vec::with_capacity(ids.len());
        let mut consumed: FxHashSet<u64> = FxHashSet::default();
        let mut total_assets: u128 = 0;
        let mut supply_after = self.shares.total_supply();
        for &id in ids {
            if !consumed.insert(id) {
                return Err(FundError::RequestNotFound(id));
            }
            let request = self.deposits.get(id).ok_or(FundError::RequestNotFound(id))?;
            let value =
                self.valuator.convert_asset_to_value(self.params.fund_asset, request.amount, now)?;
            let gross_units = fixed::mul_div(value, PRECISION, snapshot.price_per_unit)?;
            let fee_units = self.fees.settle_entrance_fee(gross_units)?;
            let net_units = gross_units - fee_units;
            if net_units == 0 {
                return Err(FundError::ZeroShareIssuance(id));
            }
            supply_after = supply_after
                .checked_add(gross_units)
                .ok_or(FundError::MathOverflow("supply after deposit batch"))?;
            total_assets = total_assets
                .checked_add(request.amount)
                .ok_or(FundError::MathOverflow("deposit batch total"))?;
            plan.push(PlannedDeposit {
                id,
                controller: request.controller,
                assets: request.amount,
                gross_units,
                fee_units,
                net_units,
            });
        }

        // Commit. The checks above guarantee none of this can fail, so the
        // batch is applied in full.
        self.assets.transfer(self.params.queue_account, self.params.treasury, total_assets)?;
        let entrance_recipient = self.fees.recipients().entrance;
        for planned in &plan {
            self.deposits.take(planned.id)?;
            self.shares.mint_for(self.params.queue_account, planned.controller, planned.net_units)?;
            if planned.fee_units > 0 {
                self.shares.mint_for(
                    self.params.queue_account,
                    entrance_recipient,
                    planned.fee_units,
                )?;
            }
            self.events.emit(
                now,
                FundEvent::DepositExecuted {
                    id: planned.id,
                    controller: planned.controller,
                    assets: planned.assets,
                    gross_units: planned.gross_units,
                    fee_units: planned.fee_units,
                    net_units: planned.net_units,
                    price_per_unit: snapshot.price_per_unit,
                },
            );
        }

        log_info!(
            "queue",
            "executed {} deposit requests at price {}: {} assets swept, supply now {}",
            plan.len(),
            snapshot.price_per_unit,
            total_assets,
            supply_after
        );
        self.checkpoint()?;
        Ok(())
    }

    // ==========================================
    // Redeem queue
    // ==========================================

    /// Enqueue a redemption, escrowing the units with the queue through the
    /// unvalidated transfer path.
    pub fn request_redeem(
        &mut self,
        caller: AccountId,
        units: u128,
        controller: AccountId,
        owner: AccountId,
    ) -> Result<u64, FundError> {
        if owner != caller || controller != caller {
            return Err(FundError::Unauthorized {
                account: caller,
                required: "owner == caller == controller",
            });
        }
        if units == 0 {
            return Err(FundError::InvalidAmount("redeem amount must be positive".into()));
        }

        let now = self.clock.now();
        self.shares.auth_transfer(self.params.queue_account, caller, self.params.queue_account, units)?;
        let id = self.redemptions.submit(controller, units, now)?;
        let can_cancel_after = now + self.redemptions.min_request_duration();

        log_info!("queue", "redeem request {} from {} for {} units", id, controller, units);
        self.events.emit(
            now,
            FundEvent::RedeemRequested { id, controller, units, can_cancel_after },
        );
        self.checkpoint()?;
        Ok(id)
    }

    pub fn cancel_redeem(&mut self, caller: AccountId, id: u64) -> Result<(), FundError> {
        let now = self.clock.now();
        let units = self.redemptions.check_cancellable(caller, id, now)?.amount;
        self.shares.auth_transfer(self.params.queue_account, self.params.queue_account, caller, units)?;
        let request = self.redemptions.take(id)?;

        self.events.emit(
            now,
            FundEvent::RedeemCancelled { id, controller: request.controller, units },
        );
        self.checkpoint()?;
        Ok(())
    }

    /// Execute a batch of redemptions at one price snapshot: units burn net
    /// of the exit fee and the asset leg is pushed to each controller
    /// individually, since the recipient varies per request.
    pub fn execute_redeem_requests(
        &mut self,
        caller: AccountId,
        ids: &[u64],
    ) -> Result<(), FundError> {
        self.shares.registry().require_privileged(caller)?;
        if ids.is_empty() {
            return Err(FundError::InvalidAmount("empty batch".into()));
        }
        let snapshot = self.price_snapshot()?;
        let now = snapshot.as_of;

        let mut plan: Vec<PlannedRedemption> = Vec::with_capacity(ids.len());
        let mut consumed: FxHashSet<u64> = FxHashSet::default();
        let mut total_out: u128 = 0;
        for &id in ids {
            if !consumed.insert(id) {
                return Err(FundError::RequestNotFound(id));
            }
            let request = self.redemptions.get(id).ok_or(FundError::RequestNotFound(id))?;
            let gross_units = request.amount;
            let fee_units = self.fees.settle_exit_fee(gross_units)?;
            let net_units = gross_units - fee_units;
            if net_units == 0 {
                return Err(FundError::ZeroShareIssuance(id));
            }
            let value = fixed::mul_div(net_units, snapshot.price_per_unit, PRECISION)?;
            let assets_out =
                self.valuator.convert_value_to_asset(value, self.params.fund_asset, now)?;
            total_out = total_out
                .checked_add(assets_out)
                .ok_or(FundError::MathOverflow("redemption batch total"))?;
            plan.push(PlannedRedemption {
                id,
                controller: request.controller,
                gross_units,
                fee_units,
                net_units,
                assets_out,
            });
        }

        // The treasury must cover the whole batch before anything moves.
        let treasury_balance = self.assets.balance_of(self.params.treasury);
        if treasury_balance < total_out {
            return Err(FundError::InsufficientBalance {
                account: self.params.treasury,
                available: treasury_balance,
                required: total_out,
            });
        }

        let exit_recipient = self.fees.recipients().exit;
        for planned in &plan {
            self.redemptions.take(planned.id)?;
            if planned.fee_units > 0 {
                self.shares.auth_transfer(
                    self.params.queue_account,
                    self.params.queue_account,
                    exit_recipient,
                    planned.fee_units,
                )?;
            }
            self.shares.burn_for(self.params.queue_account, self.params.queue_account, planned.net_units)?;
            if planned.assets_out > 0 {
                self.assets.transfer(self.params.treasury, planned.controller, planned.assets_out)?;
            }
            self.events.emit(
                now,
                FundEvent::RedeemExecuted {
                    id: planned.id,
                    controller: planned.controller,
                    gross_units: planned.gross_units,
                    fee_units: planned.fee_units,
                    assets_out: planned.assets_out,
                    price_per_unit: snapshot.price_per_unit,
                },
            );
        }

        log_info!(
            "queue",
            "executed {} redeem requests at price {} ({} assets out)",
            plan.len(),
            snapshot.price_per_unit,
            total_out
        );
        self.checkpoint()?;
        Ok(())
    }

    // ==========================================
    // Fees
    // ==========================================

    /// Settle management and performance fees against the current position
    /// value. Restricted to the designated fee settler.
    pub fn settle_dynamic_fees(&mut self, caller: AccountId) -> Result<(i128, i128), FundError> {
        if caller != self.params.fee_settler {
            return Err(FundError::Unauthorized {
                account: caller,
                required: "designated fee settler",
            });
        }
        let now = self.clock.now();
        let positions = self.valuator.total_positions_value()?;
        let supply = self.shares.total_supply();
        let (management, performance) = self.fees.settle_dynamic_fees(
            positions,
            supply,
            now,
            self.params.default_share_price,
        )?;

        self.events.emit(now, FundEvent::ManagementFeeSettled { value_due: management, settled_at: now });
        self.events.emit(
            now,
            FundEvent::PerformanceFeeSettled {
                value_due: performance,
                high_water_mark: self.fees.performance().high_water_mark(),
            },
        );
        self.checkpoint()?;
        Ok((management, performance))
    }

    /// Claim accrued fee value: cuts the entitlement and pays the matching
    /// asset amount out of the treasury.
    pub fn claim_fees(&mut self, caller: AccountId, value: u128) -> Result<u128, FundError> {
        let available = self.fees.entitlement_of(caller);
        if available < 0 || (value as i128) > available {
            return Err(FundError::InsufficientEntitlement { available, requested: value });
        }
        let now = self.clock.now();
        let assets_out = self.valuator.convert_value_to_asset(value, self.params.fund_asset, now)?;
        self.assets.transfer(self.params.treasury, caller, assets_out)?;
        self.fees.claim(caller, value)?;

        self.events.emit(now, FundEvent::FeesClaimed { recipient: caller, value });
        self.checkpoint()?;
        Ok(assets_out)
    }

    /// Change the management rate. Outstanding accrual is settled first so
    /// elapsed time is charged at the rate in force while it elapsed.
    pub fn set_management_rate(&mut self, caller: AccountId, rate_bps: u16) -> Result<(), FundError> {
        self.shares.registry().require_privileged(caller)?;
        if self.fees.management().is_initialized() {
            let now = self.clock.now();
            let positions = self.valuator.total_positions_value()?;
            self.fees.settle_management(positions, now)?;
        }
        self.fees.set_management_rate(rate_bps)?;
        self.emit_rate_change("management", rate_bps)
    }

    pub fn set_performance_rate(&mut self, caller: AccountId, rate_bps: u16) -> Result<(), FundError> {
        self.shares.registry().require_privileged(caller)?;
        self.fees.set_performance_rate(rate_bps)?;
        self.emit_rate_change("performance", rate_bps)
    }

    pub fn set_entrance_rate(&mut self, caller: AccountId, rate_bps: u16) -> Result<(), FundError> {
        self.shares.registry().require_privileged(caller)?;
        self.fees.set_entrance_rate(rate_bps)?;
        self.emit_rate_change("entrance", rate_bps)
    }

    pub fn set_exit_rate(&mut self, caller: AccountId, rate_bps: u16) -> Result<(), FundError> {
        self.shares.registry().require_privileged(caller)?;
        self.fees.set_exit_rate(rate_bps)?;
        self.emit_rate_change("exit", rate_bps)
    }

    /// Start management fee accrual from the current timestamp.
    pub fn reset_last_settled(&mut self, caller: AccountId) -> Result<(), FundError> {
        self.shares.registry().require_privileged(caller)?;
        let now = self.clock.now();
        self.fees.reset_last_settled(now)?;
        self.checkpoint()?;
        Ok(())
    }

    /// Anchor the high-water mark at the current per-unit price (or the
    /// default price while no units are outstanding).
    pub fn reset_high_water_mark(&mut self, caller: AccountId) -> Result<(), FundError> {
        self.shares.registry().require_privileged(caller)?;
        let snapshot = self.execution_price()?;
        self.fees.reset_high_water_mark(snapshot.price_per_unit)?;
        self.checkpoint()?;
        Ok(())
    }

    // ==========================================
    // Shares
    // ==========================================

    pub fn transfer_shares(
        &mut self,
        caller: AccountId,
        to: AccountId,
        amount: u128,
    ) -> Result<(), FundError> {
        self.shares.transfer(caller, to, amount)?;
        let now = self.clock.now();
        self.events.emit(now, FundEvent::SharesTransferred { from: caller, to, amount });
        self.checkpoint()?;
        Ok(())
    }

    pub fn approve_shares(&mut self, caller: AccountId, spender: AccountId, amount: u128) {
        self.shares.approve(caller, spender, amount);
    }

    pub fn transfer_shares_from(
        &mut self,
        caller: AccountId,
        from: AccountId,
        to: AccountId,
        amount: u128,
    ) -> Result<(), FundError> {
        self.shares.transfer_from(caller, from, to, amount)?;
        let now = self.clock.now();
        self.events.emit(now, FundEvent::SharesTransferred { from, to, amount });
        self.checkpoint()?;
        Ok(())
    }

    // ==========================================
    // Roles
    // ==========================================

    pub fn grant_role(
        &mut self,
        caller: AccountId,
        account: AccountId,
        role: Role,
    ) -> Result<(), FundError> {
        self.shares.registry_mut().grant(caller, account, role)?;
        let now = self.clock.now();
        self.events.emit(
            now,
            FundEvent::RoleChanged { account, role: role.as_str().to_string(), granted: true },
        );
        self.checkpoint()?;
        Ok(())
    }

    pub fn revoke_role(
        &mut self,
        caller: AccountId,
        account: AccountId,
        role: Role,
    ) -> Result<(), FundError> {
        self.shares.registry_mut().revoke(caller, account, role)?;
        let now = self.clock.now();
        self.events.emit(
            now,
            FundEvent::RoleChanged { account, role: role.as_str().to_string(), granted: false },
        );
        self.checkpoint()?;
        Ok(())
    }

    /// Toggle enforcement of the holder allow-list.
    pub fn set_restrict_holders(
        &mut self,
        caller: AccountId,
        restrict: bool,
    ) -> Result<(), FundError> {
        self.shares.registry_mut().set_restrict_holders(caller, restrict)?;
        self.checkpoint()?;
        Ok(())
    }

    pub fn begin_owner_transfer(
        &mut self,
        caller: AccountId,
        pending: AccountId,
    ) -> Result<(), FundError> {
        self.shares.registry_mut().begin_owner_transfer(caller, pending)?;
        let now = self.clock.now();
        self.events.emit(now, FundEvent::OwnerHandoffStarted { from: caller, to: pending });
        self.checkpoint()?;
        Ok(())
    }

    pub fn accept_owner(&mut self, caller: AccountId) -> Result<(), FundError> {
        self.shares.registry_mut().accept_owner(caller)?;
        let now = self.clock.now();
        self.events.emit(now, FundEvent::OwnerHandoffAccepted { owner: caller });
        self.checkpoint()?;
        Ok(())
    }

    // ==========================================
    // Reads
    // ==========================================

    /// Per-unit price right now. Surfaces `ZeroSupply` while no units are
    /// outstanding; batch execution falls back to the default price instead.
    pub fn price_per_unit(&self) -> Result<PriceSnapshot, FundError> {
        self.price_snapshot()
    }

    /// NAV in the accounting currency, with its observation time.
    pub fn unit_value(&self) -> Result<(i128, u64), FundError> {
        let nav = self.valuator.net_value(self.fees.total_value_owed())?;
        Ok((nav, self.clock.now()))
    }

    pub fn total_value_owed(&self) -> i128 {
        self.fees.total_value_owed()
    }

    pub fn entitlement_of(&self, recipient: AccountId) -> i128 {
        self.fees.entitlement_of(recipient)
    }

    pub fn balance_of(&self, account: AccountId) -> u128 {
        self.shares.balance_of(account)
    }

    pub fn total_supply(&self) -> u128 {
        self.shares.total_supply()
    }

    pub fn asset_balance_of(&self, account: AccountId) -> u128 {
        self.assets.balance_of(account)
    }

    pub fn pending_deposit(&self, id: u64) -> Option<PendingRequest> {
        self.deposits.get(id).cloned()
    }

    pub fn pending_redeem(&self, id: u64) -> Option<PendingRequest> {
        self.redemptions.get(id).cloned()
    }

    pub fn pending_deposit_ids(&self) -> Vec<u64> {
        self.deposits.pending_ids()
    }

    pub fn pending_redeem_ids(&self) -> Vec<u64> {
        self.redemptions.pending_ids()
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventLog {
        &mut self.events
    }

    pub fn management_fee_state(&self) -> (u16, u64) {
        (self.fees.management().rate_bps(), self.fees.management().last_settled())
    }

    pub fn performance_fee_state(&self) -> (u16, u128) {
        (self.fees.performance().rate_bps(), self.fees.performance().high_water_mark())
    }

    /// Seed or drain depositor asset balances; this is the custody boundary
    /// the engine does not model.
    pub fn assets_mut(&mut self) -> &mut AssetBook {
        &mut self.assets
    }

    // ==========================================
    // Internal
    // ==========================================

    fn price_snapshot(&self) -> Result<PriceSnapshot, FundError> {
        let now = self.clock.now();
        let nav = self.valuator.net_value(self.fees.total_value_owed())?;
        self.valuator.price_per_unit(nav, self.shares.total_supply(), now)
    }

    /// The batch-execution price: current per-unit price, or the configured
    /// default while no units are outstanding.
    fn execution_price(&self) -> Result<PriceSnapshot, FundError> {
        match self.price_snapshot() {
            Ok(snapshot) => Ok(snapshot),
            Err(FundError::ZeroSupply) => Ok(PriceSnapshot {
                price_per_unit: self.params.default_share_price,
                as_of: self.clock.now(),
            }),
            Err(other) => Err(other),
        }
    }

    fn emit_rate_change(&mut self, kind: &str, rate_bps: u16) -> Result<(), FundError> {
        let now = self.clock.now();
        self.events.emit(now, FundEvent::RateChanged { kind: kind.to_string(), rate_bps });
        self.checkpoint()?;
        Ok(())
    }

    fn checkpoint(&self) -> Result<(), FundError> {
        if let Some(store) = &self.store {
            store.save(&AccrualCheckpoint {
                last_settled: self.fees.management().last_settled(),
                high_water_mark: self.fees.performance().high_water_mark(),
                next_event_seq: self.events.next_seq(),
            })?;
        }
        Ok(())
    }
}
