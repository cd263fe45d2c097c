//! Host channel doubles
//!
//! [`RecordingHostWriter`] captures what the cache asks the host for.
//! [`HostSimulator`] answers those requests from a [`LedgerFixture`] the way
//! an honest host would, or lets a test substitute its own answers.

use crate::ledger::LedgerFixture;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use strata_historical::{
    route_host_response, HistoricalEntrySink, HostChannelClosed, HostRequest, HostResponse,
    HostWriter, LedgerRequestPurpose, RouteOutcome,
};

/// Host writer that records every request it is given
#[derive(Debug, Clone, Default)]
pub struct RecordingHostWriter {
    sent: Arc<Mutex<Vec<HostRequest>>>,
    closed: Arc<AtomicBool>,
}

impl RecordingHostWriter {
    /// Open writer with nothing recorded
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests recorded so far
    pub fn requests(&self) -> Vec<HostRequest> {
        self.sent.lock().clone()
    }

    /// Indices requested so far, in send order
    pub fn requested_indices(&self) -> Vec<u64> {
        self.sent
            .lock()
            .iter()
            .map(|HostRequest::LedgerGet { index, .. }| *index)
            .collect()
    }

    /// Remove and return the recorded requests
    pub fn take(&self) -> Vec<HostRequest> {
        std::mem::take(&mut *self.sent.lock())
    }

    /// Make every later send fail
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Accept sends again after [`close`](Self::close)
    pub fn reopen(&self) {
        self.closed.store(false, Ordering::SeqCst);
    }
}

impl HostWriter for RecordingHostWriter {
    fn send(&self, request: HostRequest) -> Result<(), HostChannelClosed> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(HostChannelClosed);
        }
        self.sent.lock().push(request);
        Ok(())
    }
}

/// In-memory host serving a fixture ledger
#[derive(Debug, Default)]
pub struct HostSimulator {
    overrides: BTreeMap<u64, Option<Vec<u8>>>,
}

impl HostSimulator {
    /// Honest host
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer requests for `index` with `data` instead of the stored entry
    pub fn substitute(&mut self, index: u64, data: Vec<u8>) -> &mut Self {
        self.overrides.insert(index, Some(data));
        self
    }

    /// Answer requests for `index` with a missing-entry notice
    pub fn withhold(&mut self, index: u64) -> &mut Self {
        self.overrides.insert(index, None);
        self
    }

    /// Serve the given index again from the ledger
    pub fn restore(&mut self, index: u64) -> &mut Self {
        self.overrides.remove(&index);
        self
    }

    /// Response a host would give to `request`
    pub fn respond(&self, ledger: &LedgerFixture, request: &HostRequest) -> HostResponse {
        let HostRequest::LedgerGet { index, purpose } = *request;
        let data = match self.overrides.get(&index) {
            Some(data) => data.clone(),
            None => ledger.stored(index).map(<[u8]>::to_vec),
        };
        match data {
            Some(data) => HostResponse::LedgerEntry {
                index,
                purpose,
                data,
            },
            None => HostResponse::LedgerNoEntry { index, purpose },
        }
    }

    /// Answer every request recorded by `writer`, including the ones the
    /// answers trigger, until the cache stops asking
    ///
    /// Returns the outcome of each routed response in delivery order.
    pub fn serve<S>(
        &self,
        ledger: &LedgerFixture,
        writer: &RecordingHostWriter,
        sink: &mut S,
    ) -> Vec<(u64, RouteOutcome)>
    where
        S: HistoricalEntrySink + ?Sized,
    {
        let mut outcomes = Vec::new();
        loop {
            let requests = writer.take();
            if requests.is_empty() {
                return outcomes;
            }
            for request in requests {
                let response = self.respond(ledger, &request);
                let index = response.index();
                outcomes.push((index, route_host_response(sink, response)));
            }
        }
    }
}

/// Historical-query entry response carrying `data`
pub fn entry_response(index: u64, data: Vec<u8>) -> HostResponse {
    HostResponse::LedgerEntry {
        index,
        purpose: LedgerRequestPurpose::HistoricalQuery,
        data,
    }
}
