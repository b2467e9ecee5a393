//! Test stores shared by the integration tests

#![allow(dead_code)]

use anyhow::anyhow;
use pmostations::StationStore;
use serde_yaml::Value;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

/// Installs a tracing subscriber printing through the test harness
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Read(String),
    Write(String),
    Remove(String),
    Commit,
}

/// Flat in-memory store recording every call
#[derive(Default)]
pub struct RecordingStore {
    pub values: RefCell<BTreeMap<String, Value>>,
    pub ops: RefCell<Vec<Op>>,
    /// Fail writes after this many successful ones
    pub fail_writes_after: Cell<Option<usize>>,
    pub fail_reads: Cell<bool>,
    pub fail_commit: Cell<bool>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(path: &[&str]) -> String {
        path.join("/")
    }

    pub fn insert(&self, key: &str, value: Value) {
        self.values.borrow_mut().insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.borrow().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.values.borrow().keys().cloned().collect()
    }

    pub fn ops(&self) -> Vec<Op> {
        self.ops.borrow().clone()
    }

    pub fn clear_ops(&self) {
        self.ops.borrow_mut().clear();
    }

    fn writes_done(&self) -> usize {
        self.ops
            .borrow()
            .iter()
            .filter(|op| matches!(op, Op::Write(_) | Op::Remove(_)))
            .count()
    }
}

impl StationStore for RecordingStore {
    fn read_value(&self, path: &[&str]) -> anyhow::Result<Option<Value>> {
        let key = Self::key(path);
        self.ops.borrow_mut().push(Op::Read(key.clone()));
        if self.fail_reads.get() {
            return Err(anyhow!("backend offline"));
        }
        Ok(self.values.borrow().get(&key).cloned())
    }

    fn write_value(&self, path: &[&str], value: Value) -> anyhow::Result<()> {
        if let Some(limit) = self.fail_writes_after.get() {
            if self.writes_done() >= limit {
                return Err(anyhow!("disk full"));
            }
        }
        let key = Self::key(path);
        self.ops.borrow_mut().push(Op::Write(key.clone()));
        self.values.borrow_mut().insert(key, value);
        Ok(())
    }

    fn remove_value(&self, path: &[&str]) -> anyhow::Result<()> {
        if let Some(limit) = self.fail_writes_after.get() {
            if self.writes_done() >= limit {
                return Err(anyhow!("disk full"));
            }
        }
        let key = Self::key(path);
        self.ops.borrow_mut().push(Op::Remove(key.clone()));
        let below = format!("{}/", key);
        self.values
            .borrow_mut()
            .retain(|k, _| k != &key && !k.starts_with(&below));
        Ok(())
    }

    fn commit(&self) -> anyhow::Result<()> {
        if self.fail_commit.get() {
            return Err(anyhow!("read-only filesystem"));
        }
        self.ops.borrow_mut().push(Op::Commit);
        Ok(())
    }
}

pub fn pair(station: &str, channel: &str) -> Value {
    Value::Sequence(vec![Value::from(station), Value::from(channel)])
}
