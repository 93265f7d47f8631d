// Error types for the fund accounting engine
use std::fmt;

use crate::{AccountId, AssetId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FundError {
    // Authorization errors
    Unauthorized { account: AccountId, required: &'static str },

    // Initialization / lifecycle errors
    AlreadyInitialized,
    NotInitialized,
    RequestNotFound(u64),

    // Validation errors
    InvalidAmount(String),
    ExceedsBound { rate_bps: u16 },
    TimingNotElapsed { can_cancel_after: u64, now: u64 },

    // Oracle errors
    StaleOracleData { updated_at: u64, tolerance: u64, now: u64 },
    InvalidOracleAnswer { answer: i128 },
    RateUnavailable(AssetId),
    UnknownAsset(AssetId),

    // Valuation errors
    ZeroSupply,

    // Balance errors
    InsufficientBalance { account: AccountId, available: u128, required: u128 },
    InsufficientAllowance { owner: AccountId, spender: AccountId },
    InsufficientEntitlement { available: i128, requested: u128 },
    TransferRejected { from: AccountId, to: AccountId },

    // Batch execution errors
    ZeroShareIssuance(u64),

    // Arithmetic errors
    MathOverflow(&'static str),

    // Persistence errors
    Storage(String),

    // Rate feed errors
    RateFeed(String),
}

impl fmt::Display for FundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthorized { account, required } => {
                write!(f, "Account {} is not authorized ({} required)", account, required)
            }
            Self::AlreadyInitialized => write!(f, "Component already initialized"),
            Self::NotInitialized => write!(f, "Component not initialized"),
            Self::RequestNotFound(id) => write!(f, "Request {} not found", id),
            Self::InvalidAmount(msg) => write!(f, "Invalid amount: {}", msg),
            Self::ExceedsBound { rate_bps } => {
                write!(f, "Fee rate {} bps exceeds the 10000 bps bound", rate_bps)
            }
            Self::TimingNotElapsed { can_cancel_after, now } => {
                write!(f, "Cancellable at {}, now is {}", can_cancel_after, now)
            }
            Self::StaleOracleData { updated_at, tolerance, now } => {
                write!(
                    f,
                    "Oracle reading at {} is stale (tolerance {}s, now {})",
                    updated_at, tolerance, now
                )
            }
            Self::InvalidOracleAnswer { answer } => {
                write!(f, "Oracle answer {} is not positive", answer)
            }
            Self::RateUnavailable(asset) => write!(f, "No rate available for asset {}", asset),
            Self::UnknownAsset(asset) => write!(f, "Asset {} is not registered", asset),
            Self::ZeroSupply => write!(f, "Price per unit undefined: no units outstanding"),
            Self::InsufficientBalance { account, available, required } => {
                write!(
                    f,
                    "Insufficient balance for account {}: have {}, need {}",
                    account, available, required
                )
            }
            Self::InsufficientAllowance { owner, spender } => {
                write!(f, "Spender {} lacks allowance from {}", spender, owner)
            }
            Self::InsufficientEntitlement { available, requested } => {
                write!(f, "Claim of {} exceeds entitlement of {}", requested, available)
            }
            Self::TransferRejected { from, to } => {
                write!(f, "Transfer from {} to {} rejected by policy", from, to)
            }
            Self::ZeroShareIssuance(id) => {
                write!(f, "Request {} resolves to zero units, batch aborted", id)
            }
            Self::MathOverflow(ctx) => write!(f, "Arithmetic overflow in {}", ctx),
            Self::Storage(msg) => write!(f, "State store error: {}", msg),
            Self::RateFeed(msg) => write!(f, "Rate feed error: {}", msg),
        }
    }
}

impl std::error::Error for FundError {}

impl From<sled::Error> for FundError {
    fn from(err: sled::Error) -> Self {
        FundError::Storage(err.to_string())
    }
}

// Error code mapping for logs and API surfaces
impl FundError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::AlreadyInitialized => "ALREADY_INITIALIZED",
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::RequestNotFound(_) => "REQUEST_NOT_FOUND",
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::ExceedsBound { .. } => "EXCEEDS_BOUND",
            Self::TimingNotElapsed { .. } => "TIMING_NOT_ELAPSED",
            Self::StaleOracleData { .. } => "STALE_ORACLE_DATA",
            Self::InvalidOracleAnswer { .. } => "INVALID_ORACLE_ANSWER",
            Self::RateUnavailable(_) => "RATE_UNAVAILABLE",
            Self::UnknownAsset(_) => "UNKNOWN_ASSET",
            Self::ZeroSupply => "ZERO_SUPPLY",
            Self::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Self::InsufficientAllowance { .. } => "INSUFFICIENT_ALLOWANCE",
            Self::InsufficientEntitlement { .. } => "INSUFFICIENT_ENTITLEMENT",
            Self::TransferRejected { .. } => "TRANSFER_REJECTED",
            Self::ZeroShareIssuance(_) => "ZERO_SHARE_ISSUANCE",
            Self::MathOverflow(_) => "MATH_OVERFLOW",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::RateFeed(_) => "RATE_FEED_ERROR",
        }
    }

    /// Caller mistakes, as opposed to engine/infrastructure faults.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized { .. }
                | Self::InvalidAmount(_)
                | Self::ExceedsBound { .. }
                | Self::TimingNotElapsed { .. }
                | Self::RequestNotFound(_)
                | Self::InsufficientBalance { .. }
                | Self::InsufficientAllowance { .. }
                | Self::InsufficientEntitlement { .. }
                | Self::TransferRejected { .. }
        )
    }
}
