//! The temperature deck's hand-assembled mailbox registry. Three tasks:
//! host-comms, the single thermal channel, and system.

use queue_aggregator::QueueHandle;

use crate::messages::{HostCommsMessage, SystemMessage, ThermalMessage};

pub const MAILBOX_DEPTH: usize = 8;

pub const HOST_COMMS_ADDRESS: usize = 0;
pub const THERMAL_ADDRESS: usize = 1;
pub const SYSTEM_ADDRESS: usize = 2;

pub struct Tasks {
    pub host_comms: QueueHandle<HostCommsMessage, MAILBOX_DEPTH>,
    pub thermal: QueueHandle<ThermalMessage, MAILBOX_DEPTH>,
    pub system: QueueHandle<SystemMessage, MAILBOX_DEPTH>,
}

impl Tasks {
    pub const fn new() -> Self {
        Self {
            host_comms: QueueHandle::new(),
            thermal: QueueHandle::new(),
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
