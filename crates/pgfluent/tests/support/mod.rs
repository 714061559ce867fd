#![allow(dead_code)]

use pgfluent::{Executor, FluentError, FluentResult, Record, Value};
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub kind: &'static str,
    pub sql: String,
    pub params: Vec<Value>,
}

/// Records every statement and answers queries from a script.
///
/// Queries pop scripted row sets in order (empty once the script runs out).
/// Batches containing a registered needle fail.
#[derive(Default)]
pub struct RecordingExecutor {
    calls: Mutex<Vec<Call>>,
    responses: Mutex<VecDeque<Vec<Record>>>,
    fail_batches_containing: Mutex<Option<String>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, rows: Vec<Record>) -> &Self {
        self.responses.lock().unwrap().push_back(rows);
        self
    }

    pub fn fail_batches_containing(&self, needle: &str) {
        *self.fail_batches_containing.lock().unwrap() = Some(needle.to_string());
    }

    pub fn stop_failing(&self) {
        *self.fail_batches_containing.lock().unwrap() = None;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sql(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.sql).collect()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, kind: &'static str, sql: &str, params: &[Value]) {
        self.calls.lock().unwrap().push(Call {
            kind,
            sql: sql.to_string(),
            params: params.to_vec(),
        });
    }
}

impl Executor for RecordingExecutor {
    async fn query(&self, sql: &str, params: &[Value]) -> FluentResult<Vec<Record>> {
        self.record("query", sql, params);
        Ok(self.responses.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> FluentResult<u64> {
        self.record("execute", sql, params);
        Ok(0)
    }

    async fn batch_execute(&self, sql: &str) -> FluentResult<()> {
        self.record("batch", sql, &[]);
        let needle = self.fail_batches_containing.lock().unwrap().clone();
        match needle {
            Some(needle) if sql.contains(&needle) => {
                Err(FluentError::Other(format!("scripted failure on '{needle}'")))
            }
            _ => Ok(()),
        }
    }
}
