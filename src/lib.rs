pub mod asset_book;
pub mod clock;
pub mod configure;
pub mod errors;
pub mod events;
pub mod fee_ledger;
pub mod fee_trackers;
pub mod fixed;
pub mod fund;
pub mod log_macros;
pub mod logger;
pub mod oracle;
pub mod positions;
pub mod rate_feed;
pub mod registry;
pub mod request_queue;
pub mod share_ledger;
pub mod state_store;
pub mod valuation;

pub type AccountId = u64;
pub type AssetId = u32;
