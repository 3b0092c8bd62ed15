//! Named one-shot result channels
//!
//! Every task gets exactly one channel, named `component_<group>_<index>`,
//! allocated right before its worker starts. The read side stays in the wait
//! set until a value (or an error) arrives or the task is cancelled; the name
//! stays allocated until the channel is released.

use std::collections::BTreeMap;

use cohort_core::{GroupId, TaskIndex};
use cohort_ipc::IpcError;
use tokio::sync::oneshot::{self, error::TryRecvError};
use tracing::debug;

use crate::error::ExecutionError;

/// What a worker delivers: one value, or the reason none will come
pub type ResultPayload = Result<i64, IpcError>;

/// Write side handed to a worker
pub type ResultSender = oneshot::Sender<ResultPayload>;

/// Read side kept by the coordinator
pub type ResultReceiver = oneshot::Receiver<ResultPayload>;

/// Name of the result channel for one task
pub fn channel_name(group: GroupId, index: TaskIndex) -> String {
    format!("component_{}_{}", group, index)
}

/// One allocated result channel
#[derive(Debug)]
pub struct ResultChannel {
    name: String,
    receiver: Option<ResultReceiver>,
}

impl ResultChannel {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the read side is still in the wait set
    pub fn is_open(&self) -> bool {
        self.receiver.is_some()
    }
}

/// The channels of one run, keyed by task index
#[derive(Debug)]
pub struct ChannelRegistry {
    group: GroupId,
    channels: BTreeMap<TaskIndex, ResultChannel>,
}

impl ChannelRegistry {
    pub fn new(group: GroupId) -> Self {
        Self {
            group,
            channels: BTreeMap::new(),
        }
    }

    /// Allocate the channel for `index` and return its write side.
    ///
    /// Fails if a channel with the same name is still allocated.
    pub fn create(&mut self, index: TaskIndex) -> Result<ResultSender, ExecutionError> {
        let name = channel_name(self.group, index);
        if self.channels.contains_key(&index) {
            return Err(ExecutionError::ChannelError(format!(
                "{} is already allocated",
                name
            )));
        }

        let (tx, rx) = oneshot::channel();
        debug!("Allocated result channel {}", name);
        self.channels.insert(
            index,
            ResultChannel {
                name,
                receiver: Some(rx),
            },
        );
        Ok(tx)
    }

    /// Non-blocking read of every open channel.
    ///
    /// Channels that produced a value or failed are closed and removed from
    /// the wait set; their names stay allocated until released.
    pub fn poll_ready(&mut self) -> Vec<(TaskIndex, ResultPayload)> {
        let mut ready = Vec::new();

        for (index, channel) in self.channels.iter_mut() {
            let Some(receiver) = channel.receiver.as_mut() else {
                continue;
            };

            let payload = match receiver.try_recv() {
                Ok(payload) => payload,
                Err(TryRecvError::Empty) => continue,
                Err(TryRecvError::Closed) => Err(IpcError::ConnectionClosed),
            };

            channel.receiver = None;
            ready.push((*index, payload));
        }

        ready
    }

    /// Drop the read side of a channel. Returns `false` if it was not open.
    pub fn close(&mut self, index: TaskIndex) -> bool {
        self.channels
            .get_mut(&index)
            .and_then(|channel| channel.receiver.take())
            .is_some()
    }

    /// Free a channel name. Returns `false` if it was not allocated.
    pub fn release(&mut self, index: TaskIndex) -> bool {
        match self.channels.remove(&index) {
            Some(channel) => {
                debug!("Released result channel {}", channel.name);
                true
            }
            None => false,
        }
    }

    /// Free every remaining channel, returning how many were released
    pub fn release_all(&mut self) -> usize {
        let released = self.channels.len();
        for channel in std::mem::take(&mut self.channels).into_values() {
            debug!("Released result channel {}", channel.name);
        }
        released
    }

    /// Channels still waiting for a value
    pub fn waiting(&self) -> usize {
        self.channels.values().filter(|c| c.is_open()).count()
    }

    pub fn is_waiting(&self, index: TaskIndex) -> bool {
        self.channels.get(&index).is_some_and(ResultChannel::is_open)
    }

    /// Allocated channel names, open or not
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn get(&self, index: TaskIndex) -> Option<&ResultChannel> {
        self.channels.get(&index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_names() {
        assert_eq!(channel_name(GroupId(3), TaskIndex(2)), "component_3_2");

        let mut registry = ChannelRegistry::new(GroupId(7));
        let _tx = registry.create(TaskIndex(1)).unwrap();
        assert_eq!(registry.get(TaskIndex(1)).unwrap().name(), "component_7_1");
    }

    #[test]
    fn test_duplicate_name_is_rejected() {
        let mut registry = ChannelRegistry::new(GroupId(0));
        let _tx = registry.create(TaskIndex(1)).unwrap();

        let err = registry.create(TaskIndex(1)).unwrap_err();
        assert!(matches!(err, ExecutionError::ChannelError(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_poll_ready_reads_each_value_once() {
        let mut registry = ChannelRegistry::new(GroupId(0));
        let first = registry.create(TaskIndex(1)).unwrap();
        let _second = registry.create(TaskIndex(2)).unwrap();

        assert!(registry.poll_ready().is_empty());

        first.send(Ok(16)).unwrap();
        let ready = registry.poll_ready();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].0, TaskIndex(1));
        assert_eq!(ready[0].1.as_ref().ok(), Some(&16));

        // Closed but still allocated until released
        assert!(!registry.is_waiting(TaskIndex(1)));
        assert!(registry.is_waiting(TaskIndex(2)));
        assert_eq!(registry.waiting(), 1);
        assert_eq!(registry.len(), 2);
        assert!(registry.poll_ready().is_empty());
    }

    #[test]
    fn test_dropped_sender_reports_closed() {
        let mut registry = ChannelRegistry::new(GroupId(0));
        drop(registry.create(TaskIndex(1)).unwrap());

        let ready = registry.poll_ready();
        assert!(matches!(ready[0].1, Err(IpcError::ConnectionClosed)));
        assert_eq!(registry.waiting(), 0);
    }

    #[test]
    fn test_close_and_release() {
        let mut registry = ChannelRegistry::new(GroupId(0));
        let tx = registry.create(TaskIndex(1)).unwrap();
        let _tx2 = registry.create(TaskIndex(2)).unwrap();

        assert!(registry.close(TaskIndex(1)));
        assert!(!registry.close(TaskIndex(1)));
        assert!(tx.send(Ok(1)).is_err());

        assert!(registry.release(TaskIndex(1)));
        assert!(!registry.release(TaskIndex(1)));
        assert_eq!(registry.release_all(), 1);
        assert!(registry.is_empty());
    }
}
