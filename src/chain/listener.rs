use std::sync::mpsc::Sender;

use crate::blockchain::StoredHeader;

/// Receives best-chain changes synchronously, in order: during a reorg one
/// call per disconnected header (newest first), then one per connected
/// header (oldest first).
///
/// Callbacks run while the selector holds its writer lock, so they may read
/// from the selector but must not submit headers to it.
pub trait ChainListener: Send + Sync {
    fn on_block_connected(&self, header: &StoredHeader);
    fn on_block_disconnected(&self, header: &StoredHeader);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    Connected(StoredHeader),
    Disconnected(StoredHeader),
}

/// Forward notifications into a channel. A hung-up receiver only means
/// nobody is listening any more.
impl ChainListener for Sender<ChainEvent> {
    fn on_block_connected(&self, header: &StoredHeader) {
        let _ = self.send(ChainEvent::Connected(header.clone()));
    }

    fn on_block_disconnected(&self, header: &StoredHeader) {
        let _ = self.send(ChainEvent::Disconnected(header.clone()));
    }
}
