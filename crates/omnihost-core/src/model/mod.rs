//! Typed record shapes for every resource family. Parser outputs become
//! these structs directly; the persistence layer serialises them.

pub mod devices;
pub mod host;
pub mod network;
pub mod session;
pub mod storage;
pub mod system;
pub mod task;

pub use devices::{DeviceCategory, PciDevice};
pub use host::{HostHealth, HostInfo};
pub use network::{IpAddress, LinkClass, NameConfidence, NetworkInterface, NetworkUsage, Route};
pub use session::{Session, SessionKind, SessionStatus};
pub use storage::{ArcStats, Disk, DiskIoStats, PoolIoStats, ScanType, ZfsDataset, ZfsPool};
pub use system::{CpuStats, MemoryStats};
pub use task::{NewTask, Task, TaskStatus};
