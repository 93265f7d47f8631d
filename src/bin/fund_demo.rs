//! Scripted end-to-end scenario: seed a fund, run deposits through batch
//! execution, accrue a year of fees, then redeem — printing the NAV trail.
//! Optionally polls a live rate endpoint through the HTTP rate source.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use log::info;

use fundcore::clock::{Clock, ManualClock};
use fundcore::configure::load_config;
use fundcore::fee_ledger::{FeeConfig, FeeRecipients};
use fundcore::fixed::{self, PRECISION};
use fundcore::fund::{Fund, FundParams};
use fundcore::logger::setup_logger;
use fundcore::oracle::OracleRateReader;
use fundcore::positions::StaticPosition;
use fundcore::rate_feed::HttpRateSource;
use fundcore::share_ledger::AllowListValidator;
use fundcore::valuation::Valuator;
use fundcore::{AccountId, AssetId};

const OWNER: AccountId = 1;
const TREASURY: AccountId = 2;
const FEE_SETTLER: AccountId = 3;
const FEE_RECIPIENT: AccountId = 4;
const QUEUE: AccountId = 10;
const ALICE: AccountId = 100;
const BOB: AccountId = 101;

const USD: AssetId = 0;
const USD_DECIMALS: u32 = 6;

#[derive(Parser, Debug)]
#[command(name = "fund_demo", about = "Scripted fund accounting scenario")]
struct Args {
    /// Optional live price endpoint to poll through the HTTP rate source
    #[arg(long)]
    rate_url: Option<String>,

    /// Asset id the fetched rate is cached under
    #[arg(long, default_value_t = 1)]
    rate_asset: AssetId,

    /// Decimals the fetched rate is scaled to
    #[arg(long, default_value_t = 8)]
    rate_decimals: u32,
}

fn usd(amount: u64) -> u128 {
    amount as u128 * 10u128.pow(USD_DECIMALS)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();
    let config = load_config()?;
    setup_logger(&config).map_err(|e| anyhow::anyhow!("logger setup failed: {}", e))?;

    if let Some(url) = &args.rate_url {
        let source = HttpRateSource::new();
        let client = reqwest::Client::new();
        let reading = source
            .refresh(&client, url, args.rate_asset, args.rate_decimals)
            .await
            .map_err(|e| anyhow::anyhow!("rate feed: {}", e))?;
        info!(target: "fund", "live rate for asset {}: {} (updated {})",
            args.rate_asset, reading.rate, reading.updated_at);
    }

    let clock = Arc::new(ManualClock::new(1_700_000_000));

    let oracle = OracleRateReader::new(
        Box::new(fundcore::oracle::StaticRateSource::new()),
        config.oracle_staleness_tolerance_secs,
    );
    let mut valuator = Valuator::new(oracle);
    valuator.register_asset(USD, USD_DECIMALS, true);

    // the treasury position stands in for the external custody tracker
    let treasury_position = Arc::new(StaticPosition::new("treasury", 0));
    valuator.add_position(treasury_position.clone());

    let params = FundParams {
        fund_asset: USD,
        default_share_price: config.default_share_price as u128,
        treasury: TREASURY,
        fee_settler: FEE_SETTLER,
        queue_account: QUEUE,
        min_request_duration: 60,
    };
    let fee_config = FeeConfig {
        management_bps: config.management_fee_bps,
        performance_bps: config.performance_fee_bps,
        entrance_bps: 100,
        exit_bps: 50,
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
        fundcore::asset_book::AssetBook::new(USD, USD_DECIMALS),
        Box::new(AllowListValidator),
        clock.clone() as Arc<dyn Clock>,
    )?;

    fund.reset_last_settled(OWNER)?;
    fund.reset_high_water_mark(OWNER)?;

    // Seed depositor balances at the custody boundary
    fund.assets_mut().credit(ALICE, usd(1_000))?;
    fund.assets_mut().credit(BOB, usd(1_000))?;

    let d1 = fund.request_deposit(ALICE, usd(500), ALICE, ALICE)?;
    let d2 = fund.request_deposit(BOB, usd(250), BOB, BOB)?;
    info!(target: "fund", "queued deposit requests {:?}", [d1, d2]);

    fund.execute_deposit_requests(OWNER, &[d1, d2])?;
    treasury_position.set_value(750 * PRECISION as i128);

    let snapshot = fund.price_per_unit()?;
    info!(target: "fund", "post-subscription price {} supply {}",
        fixed::to_display(snapshot.price_per_unit, 18).unwrap_or_default(),
        fixed::to_display(fund.total_supply(), 18).unwrap_or_default());

    // A year passes and the portfolio gains 10%
    clock.advance(fixed::SECONDS_PER_YEAR);
    fund.assets_mut().credit(TREASURY, usd(75))?;
    treasury_position.set_value(825 * PRECISION as i128);

    let (management, performance) = fund.settle_dynamic_fees(FEE_SETTLER)?;
    info!(target: "fund", "fees due after one year: management {} performance {}",
        management, performance);
    info!(target: "fund", "fee recipient entitlement {}", fund.entitlement_of(FEE_RECIPIENT));

    // Alice exits half her position
    let alice_units = fund.balance_of(ALICE);
    let r1 = fund.request_redeem(ALICE, alice_units / 2, ALICE, ALICE)?;
    fund.execute_redeem_requests(OWNER, &[r1])?;

    // re-mark the custody tracker after the payout left the treasury
    let treasury_assets = fund.asset_balance_of(TREASURY);
    treasury_position.set_value(fixed::scale_amount(treasury_assets, USD_DECIMALS, 18)? as i128);

    let final_price = fund.price_per_unit()?;
    info!(target: "fund", "final price {} supply {} alice assets {}",
        fixed::to_display(final_price.price_per_unit, 18).unwrap_or_default(),
        fixed::to_display(fund.total_supply(), 18).unwrap_or_default(),
        fixed::to_display(fund.asset_balance_of(ALICE), USD_DECIMALS).unwrap_or_default());
    info!(target: "fund", "{} events recorded", fund.events().len());

    Ok(())
}
