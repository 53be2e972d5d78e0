//! The heater/shaker's hand-assembled mailbox registry.
//!
//! One named field per task mailbox, exactly as the original's
//! `tasks::Tasks<QueueImpl>` lays out `HostCommsQueue`/`MotorQueue`/etc:
//! field access *is* tag-based routing here, resolved by the compiler at
//! the call site. Runtime address-based routing (used for the bootloader
//! prep handshake) is the one place this module needs [`Tasks::send_to_address`];
//! everywhere else callers just write `tasks.heater.try_send(...)`.

use queue_aggregator::QueueHandle;

use crate::messages::{HeaterMessage, HostCommsMessage, MotorMessage, SystemMessage};

pub const MAILBOX_DEPTH: usize = 8;

pub const HOST_COMMS_ADDRESS: usize = 0;
pub const HEATER_ADDRESS: usize = 1;
pub const MOTOR_ADDRESS: usize = 2;
pub const SYSTEM_ADDRESS: usize = 3;

pub struct Tasks {
    pub host_comms: QueueHandle<HostCommsMessage, MAILBOX_DEPTH>,
    pub heater: QueueHandle<HeaterMessage, MAILBOX_DEPTH>,
    pub motor: QueueHandle<MotorMessage, MAILBOX_DEPTH>,
    pub system: QueueHandle<SystemMessage, MAILBOX_DEPTH>,
}

impl Tasks {
    pub const fn new() -> Self {
        Self {
            host_comms: QueueHandle::new(),
            heater: QueueHandle::new(),
            motor: QueueHandle::new(),
            system: QueueHandle::new(),
        }
    }

    /// Runtime address-based routing. Only `SYSTEM_ADDRESS` currently
    /// accepts anything (the prep-shutdown acks flow back to the system
    /// task); every other index, in or out of range, returns `false`
    /// exactly like a mailbox that was never registered.
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

/// The message sent by any task replying to a runtime-supplied address.
/// Exactly one variant today (prep-shutdown acks are always addressed to
/// the system task), but modeled as an enum so a future address target
/// slots in without touching `send_to_address`'s call sites.
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
    use crate::messages::AcknowledgePrevious;

    fn leak_tasks() -> &'static Tasks {
        let tasks = Box::leak(Box::new(Tasks::new()));
        let host_comms = Box::leak(Box::new(queue_aggregator::Mailbox::new()));
        let heater = Box::leak(Box::new(queue_aggregator::Mailbox::new()));
        let motor = Box::leak(Box::new(queue_aggregator::Mailbox::new()));
        let system = Box::leak(Box::new(queue_aggregator::Mailbox::new()));
        assert!(tasks.host_comms.register(host_comms));
        assert!(tasks.heater.register(heater));
        assert!(tasks.motor.register(motor));
        assert!(tasks.system.register(system));
        tasks
    }

    #[test]
    fn tag_based_send_reaches_the_named_mailbox() {
        let tasks = leak_tasks();
        assert!(tasks.heater.try_send(HeaterMessage::GetTemperature { id: 1 }));
        assert!(tasks.heater.has_message());
        assert!(!tasks.motor.has_message());
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

    #[test]
    fn sending_before_registration_fails() {
        let tasks = Tasks::new();
        assert!(!tasks
            .host_comms
            .try_send(HostCommsMessage::AcknowledgePrevious(AcknowledgePrevious::ok(1))));
    }
}
