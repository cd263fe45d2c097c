//! Messages exchanged with the untrusted host
//!
//! The enclave asks the host for ledger entries by index and the host
//! answers asynchronously, either with the entry bytes or with a refusal.
//! Both directions are fire-and-forget; nothing here waits.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

/// Why a ledger entry is being requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedgerRequestPurpose {
    /// Replaying the ledger during recovery
    Recovery,
    /// Reconstructing historical state for a query
    HistoricalQuery,
}

/// Outbound message to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostRequest {
    /// Ask for the ledger entry at `index`
    LedgerGet {
        /// Requested ledger index
        index: u64,
        /// Purpose tag echoed back in the response
        purpose: LedgerRequestPurpose,
    },
}

/// Inbound message from the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostResponse {
    /// The entry bytes for a previously requested index
    LedgerEntry {
        /// Ledger index
        index: u64,
        /// Purpose of the original request
        purpose: LedgerRequestPurpose,
        /// Raw serialised transaction
        data: Vec<u8>,
    },
    /// The host cannot or will not supply the entry
    LedgerNoEntry {
        /// Ledger index
        index: u64,
        /// Purpose of the original request
        purpose: LedgerRequestPurpose,
    },
}

impl HostResponse {
    /// Ledger index this response refers to
    pub fn index(&self) -> u64 {
        match self {
            Self::LedgerEntry { index, .. } | Self::LedgerNoEntry { index, .. } => *index,
        }
    }

    /// Purpose of the request this answers
    pub fn purpose(&self) -> LedgerRequestPurpose {
        match self {
            Self::LedgerEntry { purpose, .. } | Self::LedgerNoEntry { purpose, .. } => *purpose,
        }
    }
}

/// The host side of the channel is gone
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Host channel closed")]
pub struct HostChannelClosed;

/// Outbound half of the host channel
pub trait HostWriter {
    /// Queue a message for the host without waiting
    fn send(&self, request: HostRequest) -> Result<(), HostChannelClosed>;
}

impl HostWriter for UnboundedSender<HostRequest> {
    fn send(&self, request: HostRequest) -> Result<(), HostChannelClosed> {
        UnboundedSender::send(self, request).map_err(|_| HostChannelClosed)
    }
}

impl<W: HostWriter + ?Sized> HostWriter for std::sync::Arc<W> {
    fn send(&self, request: HostRequest) -> Result<(), HostChannelClosed> {
        (**self).send(request)
    }
}

/// Receiver of historical-query deliveries from the host
pub trait HistoricalEntrySink {
    /// Entry bytes arrived; returns whether they were accepted
    fn deliver_entry(&mut self, index: u64, data: &[u8]) -> bool;

    /// The host reported that it cannot supply `index`
    fn deliver_missing(&mut self, index: u64);
}

/// What happened to a routed host response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Entry processed by the cache
    Accepted,
    /// Entry refused by the cache (unsolicited or unusable)
    Rejected,
    /// Missing-entry notice handed to the cache
    Missing,
    /// Response belongs to another consumer of the ledger channel
    NotHistorical,
}

/// Hand a host response to the historical cache if it answers a historical query
pub fn route_host_response<S>(sink: &mut S, response: HostResponse) -> RouteOutcome
where
    S: HistoricalEntrySink + ?Sized,
{
    if response.purpose() != LedgerRequestPurpose::HistoricalQuery {
        tracing::trace!(
            index = response.index(),
            purpose = ?response.purpose(),
            "Ignoring ledger response for another purpose"
        );
        return RouteOutcome::NotHistorical;
    }

    match response {
        HostResponse::LedgerEntry { index, data, .. } => {
            if sink.deliver_entry(index, &data) {
                RouteOutcome::Accepted
            } else {
                RouteOutcome::Rejected
            }
        }
        HostResponse::LedgerNoEntry { index, .. } => {
            sink.deliver_missing(index);
            RouteOutcome::Missing
        }
    }
}
