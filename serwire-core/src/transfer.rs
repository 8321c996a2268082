//! Host transfer surface
//!
//! A transfer request is owned by its controller from submission until it
//! completes. At most one is in flight; the busy policy decides whether
//! further requests are rejected or queued.

use heapless::{Deque, Vec};

use crate::error::ErrorKind;

/// Largest number of bytes sent or received by one transfer
pub const MAX_TRANSFER_LEN: usize = 64;

/// Number of requests that may wait behind the active one
pub const QUEUE_DEPTH: usize = 4;

/// Number of finished transfers whose outcome can still be polled
pub const HISTORY_DEPTH: usize = 4;

/// Fixed-capacity transfer buffer
pub type Buffer = Vec<u8, MAX_TRANSFER_LEN>;

/// Direction of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Send `length` bytes of the buffer
    Write,
    /// Receive `length` bytes
    Read,
    /// Send the whole buffer, then (or while) receiving `length` bytes
    Exchange,
}

/// Identifies a submitted transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransferHandle(u32);

impl TransferHandle {
    /// Raw handle number
    pub fn id(self) -> u32 {
        self.0
    }
}

/// Status of a transfer as seen by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferStatus {
    /// Queued or in flight
    Pending,
    /// Completed successfully
    Done,
    /// Completed with an error
    Failed(ErrorKind),
    /// Handle never issued, or its outcome has been evicted
    Unknown,
}

/// What to do with a request while another is in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BusyPolicy {
    /// Reject with [`ErrorKind::Busy`]
    #[default]
    Reject,
    /// Queue up to [`QUEUE_DEPTH`] requests
    Queue,
}

/// Host command surface shared by all protocol controllers
pub trait TransferController {
    /// Who the transfer is addressed to (I2C address, or `()`)
    type Target;

    /// Submit a transfer
    ///
    /// `length` is the number of bytes to send for [`Direction::Write`]
    /// and the number of bytes to receive otherwise.
    fn submit_transfer(
        &mut self,
        target: Self::Target,
        direction: Direction,
        buffer: &[u8],
        length: usize,
    ) -> Result<TransferHandle, ErrorKind>;

    /// Current status of a transfer
    fn poll_status(&self, handle: TransferHandle) -> TransferStatus;

    /// Abort a transfer
    ///
    /// Queued transfers are dropped; the active one is brought to a safe
    /// stop. Aborting a finished or unknown handle does nothing.
    fn abort(&mut self, handle: TransferHandle);

    /// Bytes received by a finished transfer
    fn received(&self, handle: TransferHandle) -> Option<&[u8]>;
}

/// A transfer owned by a controller
#[derive(Debug, Clone)]
pub struct Request<T> {
    /// Handle given to the host
    pub handle: TransferHandle,
    /// Addressed party
    pub target: T,
    /// Transfer direction
    pub direction: Direction,
    /// Bytes to send
    pub tx: Buffer,
    /// Number of bytes to receive
    pub rx_len: usize,
}

impl<T> Request<T> {
    fn new(
        handle: TransferHandle,
        target: T,
        direction: Direction,
        buffer: &[u8],
        length: usize,
    ) -> Result<Self, ErrorKind> {
        if length > MAX_TRANSFER_LEN {
            return Err(ErrorKind::TooLong);
        }
        let (tx, rx_len) = match direction {
            Direction::Write => {
                if length > buffer.len() {
                    return Err(ErrorKind::TooLong);
                }
                (&buffer[..length], 0)
            }
            Direction::Read => (&buffer[..0], length),
            Direction::Exchange => (buffer, length),
        };
        let tx = Vec::from_slice(tx).map_err(|_| ErrorKind::TooLong)?;
        Ok(Self {
            handle,
            target,
            direction,
            tx,
            rx_len,
        })
    }
}

/// A finished transfer
#[derive(Debug, Clone)]
struct Record {
    handle: TransferHandle,
    status: TransferStatus,
    rx: Buffer,
}

/// Transfer bookkeeping shared by the controllers
///
/// Tracks the active handle, the wait queue and the outcome of recent
/// transfers.
#[derive(Debug)]
pub struct TransferBook<T> {
    policy: BusyPolicy,
    next_id: u32,
    active: Option<TransferHandle>,
    pending: Deque<Request<T>, QUEUE_DEPTH>,
    history: Deque<Record, HISTORY_DEPTH>,
}

impl<T> TransferBook<T> {
    /// Create an empty book
    pub fn new(policy: BusyPolicy) -> Self {
        Self {
            policy,
            next_id: 1,
            active: None,
            pending: Deque::new(),
            history: Deque::new(),
        }
    }

    /// Current busy policy
    pub fn policy(&self) -> BusyPolicy {
        self.policy
    }

    /// Change the busy policy; already queued requests stay queued
    pub fn set_policy(&mut self, policy: BusyPolicy) {
        self.policy = policy;
    }

    /// Check if nothing is in flight or waiting
    pub fn is_idle(&self) -> bool {
        self.active.is_none() && self.pending.is_empty()
    }

    /// Handle of the transfer in flight
    pub fn active(&self) -> Option<TransferHandle> {
        self.active
    }

    /// Accept a request according to the busy policy
    pub fn submit(
        &mut self,
        target: T,
        direction: Direction,
        buffer: &[u8],
        length: usize,
    ) -> Result<TransferHandle, ErrorKind> {
        let busy = !self.is_idle();
        if busy && self.policy == BusyPolicy::Reject {
            return Err(ErrorKind::Busy);
        }
        if self.pending.is_full() {
            return Err(ErrorKind::Busy);
        }

        let handle = TransferHandle(self.next_id);
        let request = Request::new(handle, target, direction, buffer, length)?;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        // Capacity checked above
        let _ = self.pending.push_back(request);
        Ok(handle)
    }

    /// Take the next waiting request and mark it active
    ///
    /// Returns `None` while a transfer is already active.
    pub fn begin(&mut self) -> Option<Request<T>> {
        if self.active.is_some() {
            return None;
        }
        let request = self.pending.pop_front()?;
        self.active = Some(request.handle);
        Some(request)
    }

    /// Record the outcome of the active transfer
    pub fn finish(&mut self, handle: TransferHandle, status: TransferStatus, rx: Buffer) {
        if self.active == Some(handle) {
            self.active = None;
        }
        if self.history.is_full() {
            self.history.pop_front();
        }
        let _ = self.history.push_back(Record { handle, status, rx });
    }

    /// Drop a waiting request
    ///
    /// Returns false if the handle was not waiting.
    pub fn cancel(&mut self, handle: TransferHandle) -> bool {
        let mut found = false;
        for _ in 0..self.pending.len() {
            if let Some(request) = self.pending.pop_front() {
                if request.handle == handle {
                    found = true;
                } else {
                    let _ = self.pending.push_back(request);
                }
            }
        }
        if found {
            self.finish(handle, TransferStatus::Failed(ErrorKind::Aborted), Buffer::new());
        }
        found
    }

    /// Status of a handle
    pub fn status(&self, handle: TransferHandle) -> TransferStatus {
        if self.active == Some(handle) || self.pending.iter().any(|r| r.handle == handle) {
            return TransferStatus::Pending;
        }
        self.history
            .iter()
            .rev()
            .find(|r| r.handle == handle)
            .map_or(TransferStatus::Unknown, |r| r.status)
    }

    /// Received bytes of a finished handle
    pub fn received(&self, handle: TransferHandle) -> Option<&[u8]> {
        self.history
            .iter()
            .rev()
            .find(|r| r.handle == handle)
            .map(|r| r.rx.as_slice())
    }
}

impl<T> Default for TransferBook<T> {
    fn default() -> Self {
        Self::new(BusyPolicy::default())
    }
}
