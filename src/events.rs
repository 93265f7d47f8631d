//! Structured domain events. Every state-changing operation appends one
//! record after it commits; failures emit nothing. The log is append-only
//! with a gapless sequence, and an optional listener mirrors records to
//! external observers/indexers.

use serde::{Deserialize, Serialize};

use crate::AccountId;

/// 128-bit amounts serialize as strings; JSON numbers cannot carry them.
pub mod u128_string {
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse::<u128>().map_err(serde::de::Error::custom)
    }
}

pub mod i128_string {
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &i128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i128, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse::<i128>().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum FundEvent {
    DepositRequested {
        id: u64,
        controller: AccountId,
        #[serde(with = "u128_string")]
        assets: u128,
        can_cancel_after: u64,
    },
    DepositCancelled {
        id: u64,
        controller: AccountId,
        #[serde(with = "u128_string")]
        assets: u128,
    },
    DepositExecuted {
        id: u64,
        controller: AccountId,
        #[serde(with = "u128_string")]
        assets: u128,
        #[serde(with = "u128_string")]
        gross_units: u128,
        #[serde(with = "u128_string")]
        fee_units: u128,
        #[serde(with = "u128_string")]
        net_units: u128,
        #[serde(with = "u128_string")]
        price_per_unit: u128,
    },
    RedeemRequested {
        id: u64,
        controller: AccountId,
        #[serde(with = "u128_string")]
        units: u128,
        can_cancel_after: u64,
    },
    RedeemCancelled {
        id: u64,
        controller: AccountId,
        #[serde(with = "u128_string")]
        units: u128,
    },
    RedeemExecuted {
        id: u64,
        controller: AccountId,
        #[serde(with = "u128_string")]
        gross_units: u128,
        #[serde(with = "u128_string")]
        fee_units: u128,
        #[serde(with = "u128_string")]
        assets_out: u128,
        #[serde(with = "u128_string")]
        price_per_unit: u128,
    },
    SharesTransferred {
        from: AccountId,
        to: AccountId,
        #[serde(with = "u128_string")]
        amount: u128,
    },
    ManagementFeeSettled {
        #[serde(with = "i128_string")]
        value_due: i128,
        settled_at: u64,
    },
    PerformanceFeeSettled {
        #[serde(with = "i128_string")]
        value_due: i128,
        #[serde(with = "u128_string")]
        high_water_mark: u128,
    },
    FeesClaimed {
        recipient: AccountId,
        #[serde(with = "u128_string")]
        value: u128,
    },
    RateChanged {
        kind: String,
        rate_bps: u16,
    },
    RoleChanged {
        account: AccountId,
        role: String,
        granted: bool,
    },
    OwnerHandoffStarted {
        from: AccountId,
        to: AccountId,
    },
    OwnerHandoffAccepted {
        owner: AccountId,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub seq: u64,
    pub at: u64,
    #[serde(flatten)]
    pub event: FundEvent,
}

pub trait EventListener: Send {
    fn on_event(&mut self, record: &EventRecord);
}

pub struct EventLog {
    records: Vec<EventRecord>,
    next_seq: u64,
    listener: Option<Box<dyn EventListener>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::with_start_seq(1)
    }

    /// Resume the sequence from a persisted checkpoint.
    pub fn with_start_seq(next_seq: u64) -> Self {
        Self { records: Vec::new(), next_seq, listener: None }
    }

    pub fn set_listener(&mut self, listener: Box<dyn EventListener>) {
        self.listener = Some(listener);
    }

    pub fn emit(&mut self, at: u64, event: FundEvent) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        let record = EventRecord { seq, at, event };
        if let Some(listener) = &mut self.listener {
            listener.on_event(&record);
        }
        self.records.push(record);
        seq
    }

    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_is_gapless() {
        let mut log = EventLog::new();
        for i in 0..5u64 {
            let seq = log.emit(i, FundEvent::OwnerHandoffAccepted { owner: i });
            assert_eq!(seq, i + 1);
        }
        let seqs: Vec<u64> = log.records().iter().map(|r| r.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_amounts_serialize_as_strings() {
        let mut log = EventLog::new();
        log.emit(
            7,
            FundEvent::DepositExecuted {
                id: 1,
                controller: 42,
                assets: u128::MAX,
                gross_units: 10,
                fee_units: 1,
                net_units: 9,
                price_per_unit: 1_000_000_000_000_000_000,
            },
        );
        let json = serde_json::to_value(&log.records()[0]).unwrap();
        assert_eq!(json["type"], "DepositExecuted");
        assert_eq!(json["data"]["assets"], u128::MAX.to_string());
        assert_eq!(json["seq"], 1);

        let back: EventRecord = serde_json::from_value(json).unwrap();
        match back.event {
            FundEvent::DepositExecuted { assets, .. } => assert_eq!(assets, u128::MAX),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn test_listener_sees_records() {
        struct Counter(std::sync::Arc<std::sync::atomic::AtomicU64>);
        impl EventListener for Counter {
            fn on_event(&mut self, _record: &EventRecord) {
                self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }
        }

        let count = std::sync::Arc::new(std::sync::atomic::AtomicU64::new(0));
        let mut log = EventLog::new();
        log.set_listener(Box::new(Counter(count.clone())));
        log.emit(1, FundEvent::OwnerHandoffAccepted { owner: 1 });
        log.emit(2, FundEvent::OwnerHandoffAccepted { owner: 2 });
        assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}
