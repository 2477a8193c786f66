//! The two queues between the conductor and its musicians
//!
//! The work queue has one producer (the dispatch engine) and is drained by
//! the musicians; each message reaches only the musician whose role matches
//! `recipient_role`. The report queue has many producers (one reader per
//! musician) and a single consumer, the report listener, which drains it
//! without blocking.

use std::collections::VecDeque;
use syncphony_core::{DispatchMessage, Report, Result, Role};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::time::{timeout_at, Instant};

/// Destination for dispatched tasks
pub trait WorkQueue {
    /// Hand a message to its musician. Delivery is at most once.
    fn enqueue(&mut self, message: DispatchMessage) -> Result<()>;
}

impl WorkQueue for Vec<DispatchMessage> {
    fn enqueue(&mut self, message: DispatchMessage) -> Result<()> {
        self.push(message);
        Ok(())
    }
}

/// One undecoded line a musician wrote to its report stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReport {
    /// The musician the line came from
    pub sender: Role,
    pub line: String,
}

impl RawReport {
    pub fn new(sender: Role, line: impl Into<String>) -> Self {
        Self {
            sender,
            line: line.into(),
        }
    }

    /// Encode a report the way a musician would send it
    pub fn encode(report: &Report) -> Result<Self> {
        Ok(Self::new(report.sender_role, report.to_json_line()?))
    }
}

pub type ReportSender = mpsc::UnboundedSender<RawReport>;

/// Create the report queue
pub fn report_channel() -> (ReportSender, ReportInbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, ReportInbox::new(rx))
}

/// Receiving end of the report queue
#[derive(Debug)]
pub struct ReportInbox {
    rx: mpsc::UnboundedReceiver<RawReport>,
    // Reports received while waiting, handed out before anything else.
    held: VecDeque<RawReport>,
    closed: bool,
}

impl ReportInbox {
    fn new(rx: mpsc::UnboundedReceiver<RawReport>) -> Self {
        Self {
            rx,
            held: VecDeque::new(),
            closed: false,
        }
    }

    /// Take the next available report without waiting
    pub fn try_next(&mut self) -> Option<RawReport> {
        if let Some(raw) = self.held.pop_front() {
            return Some(raw);
        }
        match self.rx.try_recv() {
            Ok(raw) => Some(raw),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.closed = true;
                None
            }
        }
    }

    /// Wait until a report is available or `deadline` passes.
    ///
    /// Returns `true` when a report is ready for [`try_next`](Self::try_next).
    /// Once every sender is gone this simply sleeps until the deadline.
    pub async fn wait_until(&mut self, deadline: Instant) -> bool {
        if !self.held.is_empty() {
            return true;
        }
        if self.closed {
            tokio::time::sleep_until(deadline).await;
            return false;
        }

        match timeout_at(deadline, self.rx.recv()).await {
            Ok(Some(raw)) => {
                self.held.push_back(raw);
                true
            }
            Ok(None) => {
                self.closed = true;
                tokio::time::sleep_until(deadline).await;
                false
            }
            Err(_elapsed) => false,
        }
    }

    /// Whether every sender has gone away
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
