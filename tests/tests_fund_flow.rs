use std::sync::Arc;

use fundcore::asset_book::AssetBook;
use fundcore::clock::{Clock, ManualClock};
use fundcore::errors::FundError;
use fundcore::fee_ledger::{FeeConfig, FeeRecipients};
use fundcore::fixed::{PRECISION, SECONDS_PER_YEAR};
use fundcore::fund::{Fund, FundParams};
use fundcore::oracle::{OracleRateReader, StaticRateSource};
use fundcore::positions::StaticPosition;
use fundcore::share_ledger::AllowAll;
use fundcore::state_store::StateStore;
use fundcore::valuation::Valuator;
use fundcore::{AccountId, AssetId};

const OWNER: AccountId = 1;
const TREASURY: AccountId = 2;
const SETTLER: AccountId = 3;
const QUEUE: AccountId = 10;
const FEE_RECIPIENT: AccountId = 20;
const ALICE: AccountId = 100;
const BOB: AccountId = 101;

const USD: AssetId = 0;
const T0: u64 = 1_700_000_000;

struct Harness {
    fund: Fund,
    clock: Arc<ManualClock>,
    position: Arc<StaticPosition>,
}

fn usd(amount: u64) -> u128 {
    amount as u128 * 1_000_000
}

fn build_fund(clock: Arc<ManualClock>) -> Harness {
    let oracle = OracleRateReader::new(Box::new(StaticRateSource::new()), 3_600);
    let mut valuator = Valuator::new(oracle);
    valuator.register_asset(USD, 6, true);

    let position = Arc::new(StaticPosition::new("treasury", 0));
    valuator.add_position(position.clone());

    let params = FundParams {
        fund_asset: USD,
        default_share_price: PRECISION,
        treasury: TREASURY,
        fee_settler: SETTLER,
        queue_account: QUEUE,
        min_request_duration: 3_600,
    };
    let fee_config = FeeConfig {
        management_bps: 200,
        performance_bps: 2_000,
        entrance_bps: 0,
        exit_bps: 0,
        recipients: FeeRecipients {
            management: FEE_RECIPIENT,
            performance: FEE_RECIPIENT,
            entrance: FEE_RECIPIENT,
            exit: FEE_RECIPIENT,
        },
    };

    let mut fund = Fund::new(
        OWNER,
        params,
        fee_config,
        valuator,
        AssetBook::new(USD, 6),
        Box::new(AllowAll),
        clock.clone() as Arc<dyn Clock>,
    )
    .unwrap();

    fund.assets_mut().credit(ALICE, usd(1_000)).unwrap();
    fund.assets_mut().credit(BOB, usd(1_000)).unwrap();
    Harness { fund, clock, position }
}

fn sync_treasury(h: &mut Harness) {
    let balance = h.fund.asset_balance_of(TREASURY);
    h.position.set_value((balance * 1_000_000_000_000) as i128);
}

#[test]
fn test_full_lifecycle_conserves_value() {
    let mut h = build_fund(Arc::new(ManualClock::new(T0)));
    h.fund.reset_last_settled(OWNER).unwrap();
    h.fund.reset_high_water_mark(OWNER).unwrap();

    // subscribe
    let d1 = h.fund.request_deposit(ALICE, usd(500), ALICE, ALICE).unwrap();
    let d2 = h.fund.request_deposit(BOB, usd(250), BOB, BOB).unwrap();
    h.fund.execute_deposit_requests(OWNER, &[d1, d2]).unwrap();
    sync_treasury(&mut h);

    let snapshot = h.fund.price_per_unit().unwrap();
    assert_eq!(snapshot.price_per_unit, PRECISION);

    // a year of 10% growth
    h.clock.advance(SECONDS_PER_YEAR);
    h.fund.assets_mut().credit(TREASURY, usd(75)).unwrap();
    sync_treasury(&mut h);

    h.fund.settle_dynamic_fees(SETTLER).unwrap();
    let owed = h.fund.total_value_owed();
    assert_eq!(owed, 28_200_000_000_000_000_000); // 16.5 management + 11.7 performance

    let price_after_fees = h.fund.price_per_unit().unwrap().price_per_unit;
    assert_eq!(price_after_fees, 1_062_400_000_000_000_000);

    // claiming moves real assets but not the per-unit price
    h.fund.claim_fees(FEE_RECIPIENT, 28_200_000_000_000_000_000).unwrap();
    sync_treasury(&mut h);
    assert_eq!(h.fund.price_per_unit().unwrap().price_per_unit, price_after_fees);
    assert_eq!(h.fund.asset_balance_of(FEE_RECIPIENT), usd(28) + 200_000);

    // redeem half of Alice's units at the post-fee price
    let r1 = h.fund.request_redeem(ALICE, 250 * PRECISION, ALICE, ALICE).unwrap();
    h.fund.execute_redeem_requests(OWNER, &[r1]).unwrap();
    assert_eq!(h.fund.asset_balance_of(ALICE), usd(500) + 265_600_000);

    sync_treasury(&mut h);
    // the survivors' price is untouched by the redemption
    assert_eq!(h.fund.price_per_unit().unwrap().price_per_unit, price_after_fees);
    assert_eq!(h.fund.total_supply(), 500 * PRECISION);

    // unit-level conservation: supply equals the sum of holder balances
    let held = h.fund.balance_of(ALICE)
        + h.fund.balance_of(BOB)
        + h.fund.balance_of(FEE_RECIPIENT)
        + h.fund.balance_of(QUEUE);
    assert_eq!(held, h.fund.total_supply());
}

#[test]
fn test_event_log_is_gapless_and_ordered() {
    let mut h = build_fund(Arc::new(ManualClock::new(T0)));
    h.fund.reset_last_settled(OWNER).unwrap();
    h.fund.reset_high_water_mark(OWNER).unwrap();

    let d1 = h.fund.request_deposit(ALICE, usd(500), ALICE, ALICE).unwrap();
    h.fund.execute_deposit_requests(OWNER, &[d1]).unwrap();
    sync_treasury(&mut h);
    h.clock.advance(SECONDS_PER_YEAR);
    h.fund.settle_dynamic_fees(SETTLER).unwrap();

    let records = h.fund.events().records();
    assert!(!records.is_empty());
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.seq, i as u64 + 1);
    }
    // failed calls emit nothing
    let before = h.fund.events().len();
    assert!(h.fund.execute_deposit_requests(OWNER, &[d1]).is_err());
    assert_eq!(h.fund.events().len(), before);
}

#[test]
fn test_unit_value_and_owed_reads() {
    let mut h = build_fund(Arc::new(ManualClock::new(T0)));
    h.fund.reset_last_settled(OWNER).unwrap();
    h.fund.reset_high_water_mark(OWNER).unwrap();

    let d1 = h.fund.request_deposit(ALICE, usd(400), ALICE, ALICE).unwrap();
    h.fund.execute_deposit_requests(OWNER, &[d1]).unwrap();
    sync_treasury(&mut h);

    let (nav, as_of) = h.fund.unit_value().unwrap();
    assert_eq!(nav, 400 * PRECISION as i128);
    assert_eq!(as_of, T0);
    assert_eq!(h.fund.total_value_owed(), 0);
}

#[test]
fn test_restart_resumes_accrual_from_checkpoint() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("state").to_string_lossy().into_owned();
    let clock = Arc::new(ManualClock::new(T0));

    let settle_time = T0 + SECONDS_PER_YEAR;
    let events_after_run;
    {
        let mut h = build_fund(clock.clone());
        h.fund.attach_store(StateStore::open(&path).unwrap()).unwrap();
        h.fund.reset_last_settled(OWNER).unwrap();
        h.fund.reset_high_water_mark(OWNER).unwrap();

        let d1 = h.fund.request_deposit(ALICE, usd(500), ALICE, ALICE).unwrap();
        h.fund.execute_deposit_requests(OWNER, &[d1]).unwrap();
        sync_treasury(&mut h);

        h.clock.advance(SECONDS_PER_YEAR);
        h.fund.settle_dynamic_fees(SETTLER).unwrap();
        events_after_run = h.fund.events().next_seq();
    }

    // a fresh process resumes the anchors instead of re-charging the year
    let mut h = build_fund(clock.clone());
    h.fund.attach_store(StateStore::open(&path).unwrap()).unwrap();

    let (_, last_settled) = h.fund.management_fee_state();
    assert_eq!(last_settled, settle_time);
    let (_, high_water_mark) = h.fund.performance_fee_state();
    assert!(high_water_mark > 0);
    assert_eq!(h.fund.events().next_seq(), events_after_run);

    // settling again at the same instant yields nothing further
    let d1 = h.fund.request_deposit(ALICE, usd(500), ALICE, ALICE).unwrap();
    h.fund.execute_deposit_requests(OWNER, &[d1]).unwrap();
    sync_treasury(&mut h);
    let (management, _) = h.fund.settle_dynamic_fees(SETTLER).unwrap();
    assert_eq!(management, 0);
}

#[test]
fn test_share_transfers_and_owner_handoff() {
    let mut h = build_fund(Arc::new(ManualClock::new(T0)));

    let d1 = h.fund.request_deposit(ALICE, usd(100), ALICE, ALICE).unwrap();
    h.fund.execute_deposit_requests(OWNER, &[d1]).unwrap();

    h.fund.transfer_shares(ALICE, BOB, 40 * PRECISION).unwrap();
    assert_eq!(h.fund.balance_of(BOB), 40 * PRECISION);

    h.fund.approve_shares(BOB, ALICE, 10 * PRECISION);
    h.fund.transfer_shares_from(ALICE, BOB, ALICE, 10 * PRECISION).unwrap();
    assert_eq!(h.fund.balance_of(BOB), 30 * PRECISION);

    h.fund.begin_owner_transfer(OWNER, BOB).unwrap();
    assert!(matches!(h.fund.accept_owner(ALICE), Err(FundError::Unauthorized { .. })));
    h.fund.accept_owner(BOB).unwrap();
    // the new owner wields the privileges
    assert!(h.fund.set_entrance_rate(BOB, 10).is_ok());
    assert!(matches!(
        h.fund.set_entrance_rate(OWNER, 10),
        Err(FundError::Unauthorized { .. })
    ));
}
