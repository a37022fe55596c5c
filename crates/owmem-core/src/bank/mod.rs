//! Memory bank descriptors, device profiles and device state

mod context;
mod descriptor;
mod flags;
mod profile;

pub use context::{CursorKind, DeviceContext, DeviceState, ReadCursor};
pub use descriptor::{
    BankId, ControlTarget, EpromWrite, ExtraInfo, FrameLayout, MemoryBank, PageCrcRead,
    ReadStrategy, WriteStrategy,
};
pub use flags::BankFlags;
pub use profile::{DeviceProfile, ScratchpadSpec, ShaSpec};
