/*!
Discovery of slave process-data layouts, sync-manager configuration, domain registration and named-field resolution for an external EtherCAT master.

The master/bus driver itself stays outside: everything it must provide is the [MasterLink] trait. On top of it, a session is set up in a fixed order:

1. wait for the device mailbox with [monitor::StateMonitor]
2. discover the cyclic layout from the dictionnary with [mapping::discover] (or expand a static [config::SlaveConfig])
3. apply [mapping::sync_layout] through the link
4. flatten the layout into a [domain::DomainPlan] and activate it, obtaining the runtime offsets
5. resolve the configured named fields with [fields::resolve] and decode them every cycle

Every setup-phase failure aborts the session; only field resolution degrades per field.
*/

pub mod error;
pub mod sdo;
pub mod link;
pub mod reader;
pub mod mapping;
pub mod domain;
pub mod fields;
pub mod monitor;
pub mod config;
pub mod sim;

pub use crate::error::{MappingError, MappingResult};
pub use crate::sdo::{Object, PdoEntry};
pub use crate::link::{Activation, DeviceId, DeviceState, MasterLink, UploadPoll};
pub use crate::reader::SdoReader;
pub use crate::mapping::{Pdo, PdoLayout, SyncDirection, SyncSlot};
pub use crate::domain::{DomainLayout, DomainPlan, EntryOffset, EntryRequest};
pub use crate::fields::{FieldWidth, LogicalField, ResolvedField};
pub use crate::monitor::{StateMonitor, Stop, WaitState};
