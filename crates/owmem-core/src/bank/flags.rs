//! Memory bank capability flags

use bitflags::bitflags;

bitflags! {
    /// Capability flags for memory banks
    ///
    /// These flags describe what kind of memory a bank is and what the bus
    /// master must provide to write it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BankFlags: u32 {
        // Memory type
        /// General purpose user memory
        const GENERAL_PURPOSE      = 1 << 0;
        /// Can be read and rewritten
        const READ_WRITE           = 1 << 1;
        /// Bits can be programmed once (EPROM)
        const WRITE_ONCE           = 1 << 2;
        /// Cannot be written at all
        const READ_ONLY            = 1 << 3;
        /// Keeps its content without power
        const NON_VOLATILE         = 1 << 4;

        // Bus requirements
        /// Writes need a 12V program pulse
        const NEEDS_PROGRAM_PULSE  = 1 << 5;
        /// Writes or secret operations need strong pull-up power
        const NEEDS_POWER_DELIVERY = 1 << 6;
    }
}

impl Default for BankFlags {
    fn default() -> Self {
        BankFlags::empty()
    }
}
