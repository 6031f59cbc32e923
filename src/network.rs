use crate::error::PregelError;
use crate::partition::WorkerAddress;

use crossbeam_channel::{Receiver, Sender};
use rustc_hash::FxHashMap;

/// Ships one encoded batch to a worker. Delivery guarantees are the
/// transport's business; an `Err` only means this attempt failed.
pub trait NetworkSender: Send + Sync {
    fn send_batch(&self, to: &WorkerAddress, payload: Vec<u8>) -> Result<(), PregelError>;
}

/// In-process transport: one unbounded channel per worker.
pub struct ChannelNetwork {
    senders: FxHashMap<WorkerAddress, Sender<Vec<u8>>>,
}

impl ChannelNetwork {
    /// Creates the network and the receiving end of every worker's channel.
    pub fn create(addresses: &[WorkerAddress]) -> (ChannelNetwork, FxHashMap<WorkerAddress, Receiver<Vec<u8>>>) {
        let mut senders = FxHashMap::default();
        let mut receivers = FxHashMap::default();

        for address in addresses {
            let (sender, receiver) = crossbeam_channel::unbounded();
            senders.insert(address.clone(), sender);
            receivers.insert(address.clone(), receiver);
        }

        (ChannelNetwork { senders }, receivers)
    }
}

impl NetworkSender for ChannelNetwork {
    fn send_batch(&self, to: &WorkerAddress, payload: Vec<u8>) -> Result<(), PregelError> {
        let sender = self.senders.get(to).ok_or_else(|| PregelError::Network {
            address: to.clone(),
            reason: "no such worker".to_string(),
        })?;

        sender.send(payload).map_err(|e| PregelError::Network {
            address: to.clone(),
            reason: e.to_string(),
        })
    }
}
