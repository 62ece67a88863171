//! Bounded, ordered action queue and its fixed-layout wire record
//!
//! The dispatcher executes strictly in enqueue order, so the queue never
//! reorders. Capacity is fixed at [`MAX_QUEUE_ACTIONS`]; the wire record
//! is a constant size regardless of fill, with unused slots zeroed.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::error::{ComposerError, Result};
use crate::types::{
    ActionType, PoolDirection, ProtocolId, QueueEntry, StepPayload, MAX_QUEUE_ACTIONS,
};

/// Wire-format version of [`QueueRecord`].
pub const QUEUE_WIRE_VERSION: u8 = 1;

/// Encoded size of a [`QueueRecord`] in bytes. Constant for any fill.
pub const QUEUE_RECORD_LEN: usize = 3 + MAX_QUEUE_ACTIONS * 3 + MAX_QUEUE_ACTIONS * 8 + 8 + 1;

/// Ordered queue of typed actions, capped at [`MAX_QUEUE_ACTIONS`].
#[derive(Debug, Clone, Default)]
pub struct ActionQueue {
    entries: Vec<QueueEntry>,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= MAX_QUEUE_ACTIONS
    }

    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&QueueEntry> {
        self.entries.get(index)
    }

    /// Append an entry, rejecting the call before mutation when the
    /// queue is already at capacity.
    pub fn push(&mut self, entry: QueueEntry) -> Result<()> {
        if self.is_full() {
            return Err(ComposerError::QueueFull {
                capacity: MAX_QUEUE_ACTIONS,
            });
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Rewrite the headline amount of the entry at `index`. No-op when
    /// the index is out of range.
    pub fn set_amount(&mut self, index: usize, amount: u64) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.amount = amount;
        }
    }

    /// Position of the first entry matching `action`, if any.
    pub fn position_of(&self, action: ActionType) -> Option<usize> {
        self.entries.iter().position(|e| e.action == action)
    }

    /// Encode the queue into its fixed-layout dispatcher record.
    ///
    /// Opaque payloads travel in the per-step payload table, not here.
    pub fn to_record(&self, direction: PoolDirection, swap_min_out: u64) -> QueueRecord {
        let mut record = QueueRecord {
            version: QUEUE_WIRE_VERSION,
            current_index: self.entries.len() as u8,
            queue_size: self.entries.len() as u8,
            actions: [0u8; MAX_QUEUE_ACTIONS],
            protocols: [0u8; MAX_QUEUE_ACTIONS],
            versions: [0u8; MAX_QUEUE_ACTIONS],
            amounts: [0u64; MAX_QUEUE_ACTIONS],
            swap_min_out,
            direction: direction.tag(),
        };
        for (i, entry) in self.entries.iter().enumerate() {
            record.actions[i] = entry.action.tag();
            record.protocols[i] = entry.protocol.tag();
            record.versions[i] = entry.version;
            record.amounts[i] = entry.amount;
        }
        record
    }
}

/// Fixed-layout record transmitted in the dispatcher's open instruction.
///
/// Layout, in order: version byte, current-index byte, queue-size byte,
/// 8 action tags, 8 protocol tags, 8 version bytes, 8 u64 amounts, u64
/// swap minimum output, direction byte.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct QueueRecord {
    pub version: u8,
    pub current_index: u8,
    pub queue_size: u8,
    pub actions: [u8; MAX_QUEUE_ACTIONS],
    pub protocols: [u8; MAX_QUEUE_ACTIONS],
    pub versions: [u8; MAX_QUEUE_ACTIONS],
    pub amounts: [u64; MAX_QUEUE_ACTIONS],
    pub swap_min_out: u64,
    pub direction: u8,
}

impl QueueRecord {
    pub fn encode(&self) -> Result<Vec<u8>> {
        let bytes = borsh::to_vec(self).map_err(anyhow::Error::from)?;
        debug_assert_eq!(bytes.len(), QUEUE_RECORD_LEN);
        Ok(bytes)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let record = QueueRecord::try_from_slice(bytes).map_err(anyhow::Error::from)?;
        Ok(record)
    }

    /// Reconstruct the meaningful queue entries from the record.
    ///
    /// Payloads are not part of the record, so the restored entries carry
    /// zeroed payload buffers.
    pub fn to_entries(&self) -> Result<Vec<QueueEntry>> {
        let size = self.queue_size as usize;
        let mut entries = Vec::with_capacity(size);
        for i in 0..size.min(MAX_QUEUE_ACTIONS) {
            let action = ActionType::from_tag(self.actions[i]).ok_or_else(|| {
                anyhow::anyhow!("unknown action tag {} at slot {}", self.actions[i], i)
            })?;
            let protocol = ProtocolId::from_tag(self.protocols[i]).ok_or_else(|| {
                anyhow::anyhow!("unknown protocol tag {} at slot {}", self.protocols[i], i)
            })?;
            entries.push(QueueEntry {
                action,
                protocol,
                version: self.versions[i],
                amount: self.amounts[i],
                payload: StepPayload::zeroed(),
                payload_route: 0,
            });
        }
        Ok(entries)
    }
}
