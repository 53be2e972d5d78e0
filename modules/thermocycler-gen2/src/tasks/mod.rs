//! The module's four tasks. Each is generic over the policy trait it
//! needs and holds no reference to the others directly -- everything
//! cross-task goes through [`crate::aggregator::Tasks`].

pub mod host_comms;
pub mod lid;
pub mod plate;
pub mod system;

pub use host_comms::HostCommsTask;
pub use lid::LidTask;
pub use plate::PlateTask;
pub use system::SystemTask;
