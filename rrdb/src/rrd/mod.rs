//! Round-robin archive primitives consumed by the data path.
//!
//! The reader, the persistence contract and the paced worker depend on the
//! traits here. The concrete types are small reference implementations so
//! that the data path can run and be tested on its own.

mod archive;
mod datasource;
mod pdp;

pub use archive::{
    ArchiveAccess, RoundRobinArchive, RoundRobinArchiver, RraSpec, RraState, SharedArchive,
    slot_index,
};
pub use datasource::{DataSource, DataSourcer, DsSpec, DsState};
pub use pdp::{ClockPdp, Pdp};
