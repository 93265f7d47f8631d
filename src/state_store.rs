//! Sled-backed checkpoint store for replay-safe accrual state.
//!
//! The engine is in-memory; what must survive a restart is the fee
//! settlement anchor, the high-water mark and the event sequence, so a
//! restarted process never re-charges time that was already settled.

use sled::Db;

use crate::errors::FundError;

const KEY_LAST_SETTLED: &str = "fees/last_settled";
const KEY_HIGH_WATER_MARK: &str = "fees/high_water_mark";
const KEY_NEXT_EVENT_SEQ: &str = "events/next_seq";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccrualCheckpoint {
    pub last_settled: u64,
    pub high_water_mark: u128,
    pub next_event_seq: u64,
}

pub struct StateStore {
    db: Db,
}

impl StateStore {
    pub fn open(path: &str) -> Result<Self, FundError> {
        Ok(Self { db: sled::open(path)? })
    }

    pub fn load(&self) -> Result<AccrualCheckpoint, FundError> {
        Ok(AccrualCheckpoint {
            last_settled: self.get_u64(KEY_LAST_SETTLED, 0)?,
            high_water_mark: self.get_u128(KEY_HIGH_WATER_MARK, 0)?,
            next_event_seq: self.get_u64(KEY_NEXT_EVENT_SEQ, 1)?,
        })
    }

    pub fn save(&self, checkpoint: &AccrualCheckpoint) -> Result<(), FundError> {
        self.db.insert(KEY_LAST_SETTLED, &checkpoint.last_settled.to_be_bytes()[..])?;
        self.db.insert(KEY_HIGH_WATER_MARK, &checkpoint.high_water_mark.to_be_bytes()[..])?;
        self.db.insert(KEY_NEXT_EVENT_SEQ, &checkpoint.next_event_seq.to_be_bytes()[..])?;
        self.db.flush()?;
        Ok(())
    }

    fn get_u64(&self, key: &str, default: u64) -> Result<u64, FundError> {
        match self.db.get(key)? {
            Some(value) => {
                let bytes: [u8; 8] = value
                    .as_ref()
                    .try_into()
                    .map_err(|_| FundError::Storage(format!("corrupt value for {}", key)))?;
                Ok(u64::from_be_bytes(bytes))
            }
            None => Ok(default),
        }
    }

    fn get_u128(&self, key: &str, default: u128) -> Result<u128, FundError> {
        match self.db.get(key)? {
            Some(value) => {
                let bytes: [u8; 16] = value
                    .as_ref()
                    .try_into()
                    .map_err(|_| FundError::Storage(format!("corrupt value for {}", key)))?;
                Ok(u128::from_be_bytes(bytes))
            }
            None => Ok(default),
        }
    }
}
