//! Control kernel instantiation for the thermocycler-gen2 module: one
//! G-code vocabulary, one hand-assembled mailbox registry, and the four
//! tasks (host-comms, plate, lid, system) that give it meaning.
//!
//! Plate and lid are separate thermal zones with separate tasks; `M18`
//! deactivates both and waits for both acks before host-comms replies
//! once (`tasks::host_comms`'s dual-ack tracker). Nothing in this crate
//! talks to real hardware -- every task is generic over a narrow policy
//! trait (`policy.rs`) and this crate only ships the `Sim*` in-memory
//! implementations used by its own tests.

pub mod aggregator;
pub mod board_revision;
pub mod gcode;
pub mod messages;
pub mod policy;
pub mod tasks;

pub use aggregator::Tasks;
pub use tasks::{HostCommsTask, LidTask, PlateTask, SystemTask};
