//! Keyed state with change notification.
//!
//! `StateStore` is the generic container: values are held as JSON so every
//! read and write is a deep copy, and writes that do not change the value are
//! dropped without notifying anyone. `LedgerStore` wires the ledger inputs to
//! their derived keys:
//!
//! ```text
//! rawLedger ─┐
//!            ├─> workingLedger, splitDiagnostics ─┐
//! splitLog ──┘                                    ├─> financials
//! openingBalance ─────────────────────────────────┘
//! ```
//!
//! The graph is fixed and acyclic, so propagation always terminates.
//! Subscribers only observe values and cannot write back; nested propagation
//! from an input to its derived keys is done internally by `LedgerStore`.

use crate::balance::{compute_financials, finite_or_zero, Financials};
use crate::config::LedgerConfig;
use crate::error::{LedgerError, Result};
use crate::schema::{RawValue, Transaction};
use crate::splits::{merge_splits_with_tolerance, SplitDiagnostic};
use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// Names that would collide with object internals in the collaborators that
/// mirror this state.
const RESERVED_KEYS: &[&str] = &["__proto__", "prototype", "constructor"];

pub const RAW_LEDGER: &str = "rawLedger";
pub const SPLIT_LOG: &str = "splitLog";
pub const OPENING_BALANCE: &str = "openingBalance";
pub const WORKING_LEDGER: &str = "workingLedger";
pub const SPLIT_DIAGNOSTICS: &str = "splitDiagnostics";
pub const FINANCIALS: &str = "financials";

const DERIVED_KEYS: &[&str] = &[WORKING_LEDGER, SPLIT_DIAGNOSTICS, FINANCIALS];

type Callback = Box<dyn FnMut(&Value)>;

/// Returned by `subscribe`; pass it to `unsubscribe` to stop notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionHandle {
    key: String,
    id: u64,
}

#[derive(Default)]
pub struct StateStore {
    values: HashMap<String, Value>,
    subscribers: HashMap<String, Vec<(u64, Callback)>>,
    next_id: u64,
}

fn validate_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(LedgerError::EmptyKey);
    }
    if RESERVED_KEYS.contains(&key) {
        return Err(LedgerError::ReservedKey(key.to_string()));
    }
    Ok(())
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` for changes to `key`. Callbacks run in
    /// subscription order.
    pub fn subscribe<F>(&mut self, key: &str, callback: F) -> Result<SubscriptionHandle>
    where
        F: FnMut(&Value) + 'static,
    {
        validate_key(key)?;

        let id = self.next_id;
        self.next_id += 1;
        self.subscribers
            .entry(key.to_string())
            .or_default()
            .push((id, Box::new(callback)));

        Ok(SubscriptionHandle {
            key: key.to_string(),
            id,
        })
    }

    /// Returns false if the handle was already removed.
    pub fn unsubscribe(&mut self, handle: &SubscriptionHandle) -> bool {
        let Some(list) = self.subscribers.get_mut(&handle.key) else {
            return false;
        };
        let before = list.len();
        list.retain(|(id, _)| *id != handle.id);
        before != list.len()
    }

    /// Stores a copy of `value` under `key` and notifies subscribers.
    /// Returns whether the stored value changed.
    pub fn set_state(&mut self, key: &str, value: &Value) -> Result<bool> {
        validate_key(key)?;

        if self.values.get(key) == Some(value) {
            return Ok(false);
        }

        self.values.insert(key.to_string(), value.clone());
        self.notify(key, value);
        Ok(true)
    }

    /// A copy of the value under `key`.
    pub fn get_state(&self, key: &str) -> Result<Option<Value>> {
        validate_key(key)?;
        Ok(self.values.get(key).cloned())
    }

    pub fn set_typed<T: Serialize>(&mut self, key: &str, value: &T) -> Result<bool> {
        let value = serde_json::to_value(value)?;
        self.set_state(key, &value)
    }

    pub fn get_typed<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_state(key)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    fn notify(&mut self, key: &str, value: &Value) {
        let Some(list) = self.subscribers.get_mut(key) else {
            return;
        };
        debug!("State '{}' changed, notifying {} subscribers", key, list.len());
        for (_, callback) in list.iter_mut() {
            // Each subscriber gets its own copy.
            let snapshot = value.clone();
            callback(&snapshot);
        }
    }
}

// Anything that is not a readable number counts as zero.
fn lenient_amount(value: &Value) -> f64 {
    serde_json::from_value::<RawValue>(value.clone()).map_or(0.0, |raw| raw.as_amount())
}

/// The ledger's state, with the working ledger and balances kept in sync with
/// their inputs.
pub struct LedgerStore {
    store: StateStore,
    split_tolerance: f64,
}

impl LedgerStore {
    pub fn new(config: &LedgerConfig) -> Result<Self> {
        config.validate()?;

        let mut ledger = Self {
            store: StateStore::new(),
            split_tolerance: config.split_tolerance,
        };
        let empty: Vec<Transaction> = Vec::new();
        ledger.store.set_typed(RAW_LEDGER, &empty)?;
        ledger.store.set_typed(SPLIT_LOG, &empty)?;
        ledger.store.set_typed(OPENING_BALANCE, &config.opening_balance)?;
        ledger.recompute_working_ledger()?;

        Ok(ledger)
    }

    pub fn subscribe<F>(&mut self, key: &str, callback: F) -> Result<SubscriptionHandle>
    where
        F: FnMut(&Value) + 'static,
    {
        self.store.subscribe(key, callback)
    }

    pub fn unsubscribe(&mut self, handle: &SubscriptionHandle) -> bool {
        self.store.unsubscribe(handle)
    }

    pub fn set_raw_ledger(&mut self, ledger: &[Transaction]) -> Result<()> {
        if self.store.set_typed(RAW_LEDGER, &ledger)? {
            self.recompute_working_ledger()?;
        }
        Ok(())
    }

    pub fn set_split_log(&mut self, split_log: &[Transaction]) -> Result<()> {
        if self.store.set_typed(SPLIT_LOG, &split_log)? {
            self.recompute_working_ledger()?;
        }
        Ok(())
    }

    /// Non-finite balances are stored as zero.
    pub fn set_opening_balance(&mut self, opening_balance: f64) -> Result<()> {
        let opening_balance = finite_or_zero(opening_balance);
        if self.store.set_typed(OPENING_BALANCE, &opening_balance)? {
            self.recompute_financials()?;
        }
        Ok(())
    }

    /// Writes an auxiliary key (e.g. UI selections). Derived keys are refused.
    pub fn set_state(&mut self, key: &str, value: &Value) -> Result<bool> {
        if DERIVED_KEYS.contains(&key) {
            return Err(LedgerError::DerivedKey(key.to_string()));
        }
        match key {
            RAW_LEDGER => {
                let ledger: Vec<Transaction> = serde_json::from_value(value.clone())?;
                let changed = self.store.set_typed(RAW_LEDGER, &ledger)?;
                if changed {
                    self.recompute_working_ledger()?;
                }
                Ok(changed)
            }
            SPLIT_LOG => {
                let log: Vec<Transaction> = serde_json::from_value(value.clone())?;
                let changed = self.store.set_typed(SPLIT_LOG, &log)?;
                if changed {
                    self.recompute_working_ledger()?;
                }
                Ok(changed)
            }
            OPENING_BALANCE => {
                let opening = lenient_amount(value);
                let changed = self.store.set_typed(OPENING_BALANCE, &opening)?;
                if changed {
                    self.recompute_financials()?;
                }
                Ok(changed)
            }
            _ => self.store.set_state(key, value),
        }
    }

    pub fn get_state(&self, key: &str) -> Result<Option<Value>> {
        self.store.get_state(key)
    }

    pub fn raw_ledger(&self) -> Result<Vec<Transaction>> {
        Ok(self.store.get_typed(RAW_LEDGER)?.unwrap_or_default())
    }

    pub fn split_log(&self) -> Result<Vec<Transaction>> {
        Ok(self.store.get_typed(SPLIT_LOG)?.unwrap_or_default())
    }

    pub fn working_ledger(&self) -> Result<Vec<Transaction>> {
        Ok(self.store.get_typed(WORKING_LEDGER)?.unwrap_or_default())
    }

    pub fn split_diagnostics(&self) -> Result<Vec<SplitDiagnostic>> {
        Ok(self.store.get_typed(SPLIT_DIAGNOSTICS)?.unwrap_or_default())
    }

    pub fn opening_balance(&self) -> Result<f64> {
        Ok(self
            .store
            .get_state(OPENING_BALANCE)?
            .map_or(0.0, |value| lenient_amount(&value)))
    }

    pub fn financials(&self) -> Result<Financials> {
        Ok(self.store.get_typed(FINANCIALS)?.unwrap_or_default())
    }

    fn recompute_working_ledger(&mut self) -> Result<()> {
        let raw = self.raw_ledger()?;
        let split_log = self.split_log()?;
        let outcome = merge_splits_with_tolerance(&raw, &split_log, self.split_tolerance);

        self.store.set_typed(SPLIT_DIAGNOSTICS, &outcome.diagnostics)?;
        if self.store.set_typed(WORKING_LEDGER, &outcome.ledger)? {
            self.recompute_financials()?;
        }
        Ok(())
    }

    fn recompute_financials(&mut self) -> Result<()> {
        let financials = compute_financials(self.opening_balance()?, &self.working_ledger()?);
        self.store.set_typed(FINANCIALS, &financials)?;
        Ok(())
    }
}
