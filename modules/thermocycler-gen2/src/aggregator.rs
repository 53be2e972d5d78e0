//! The thermocycler's hand-assembled mailbox registry.
//!
//! One named field per task mailbox, same shape as the heater/shaker's.
//! Runtime address-based routing is used for exactly one handshake (the
//! bootloader prep ack returning to the system task).

use queue_aggregator::QueueHandle;

use crate::messages::{HostCommsMessage, LidMessage, PlateMessage, SystemMessage};

pub const MAILBOX_DEPTH: usize = 8;

pub const HOST_COMMS_ADDRESS: usize = 0;
pub const PLATE_ADDRESS: usize = 1;
pub const LID_ADDRESS: usize = 2;
pub const SYSTEM_ADDRESS: usize = 3;

pub struct Tasks {
    pub host_comms: QueueHandle<HostCommsMessage, MAILBOX_DEPTH>,
    pub plate: QueueHandle<PlateMessage, MAILBOX_DEPTH>,
    pub lid: QueueHandle<LidMessage, MAILBOX_DEPTH>,
    pub system: QueueHandle<SystemMessage, MAILBOX_DEPTH>,
}

impl Tasks {
    pub const fn new() -> Self {
        Self {
            host_comms: QueueHandle::new(),
            plate: QueueHandle::new(),
            lid: QueueHandle::new(),
            system: QueueHandle::new(),
        }
    }

    pub fn send_to_address(&self, msg: RoutedMessage, address: usize) -> bool {
        match address {
            SYSTEM_ADDRESS => match msg {
                RoutedMessage::ToSystem(m) => self.system.try_send(m),
            },
            _ => false,
        }
    }
}

impl Default for Tasks {
    fn default() -> Self {
        Self::new()
    }
}

pub enum RoutedMessage {
    ToSystem(SystemMessage),
}

impl From<SystemMessage> for RoutedMessage {
    fn from(m: SystemMessage) -> Self {
        RoutedMessage::ToSystem(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leak_tasks() -> &'static Tasks {
        let tasks = Box::leak(Box::new(Tasks::new()));
        let host_comms = Box::leak(Box::new(queue_aggregator::Mailbox::new()));
        let plate = Box::leak(Box::new(queue_aggregator::Mailbox::new()));
        let lid = Box::leak(Box::new(queue_aggregator::Mailbox::new()));
        let system = Box::leak(Box::new(queue_aggregator::Mailbox::new()));
        assert!(tasks.host_comms.register(host_comms));
        assert!(tasks.plate.register(plate));
        assert!(tasks.lid.register(lid));
        assert!(tasks.system.register(system));
        tasks
    }

    #[test]
    fn tag_based_send_reaches_the_named_mailbox() {
        let tasks = leak_tasks();
        assert!(tasks.plate.try_send(PlateMessage::GetTemperature { id: 1 }));
        assert!(tasks.plate.has_message());
        assert!(!tasks.lid.has_message());
    }

    #[test]
    fn address_based_send_reaches_system_and_nowhere_else() {
        let tasks = leak_tasks();
        let msg: RoutedMessage = SystemMessage::PrepAckReceived { with_error: None }.into();
        assert!(tasks.send_to_address(msg, SYSTEM_ADDRESS));
        assert!(tasks.system.has_message());
    }

    #[test]
    fn reregistration_is_rejected() {
        let tasks = Tasks::new();
        let mailbox: &'static _ = Box::leak(Box::new(queue_aggregator::Mailbox::new()));
        assert!(tasks.host_comms.register(mailbox));
        assert!(!tasks.host_comms.register(mailbox));
    }
}
