//! Bridge internal register map and bit layouts

wire_enum! {
    /// Named bridge registers. Raw access also accepts offsets outside this set.
    pub enum Register: u32 {
        Status = 0x00,
        VmeControl = 0x01,
        FwRelease = 0x02,
        FwDownload = 0x03,
        FlashEnable = 0x04,
        VmeIrqStatus = 0x05,
        VmeIrqEnable = 0x06,
        Input = 0x08,
        OutRegSet = 0x0A,
        InMuxRegSet = 0x0B,
        OutMuxRegSet = 0x0C,
        LedPolRegSet = 0x0D,
        OutRegClear = 0x10,
        InMuxRegClear = 0x11,
        OutMuxRegClear = 0x12,
        LedPolRegClear = 0x13,
        PulserA0 = 0x16,
        PulserA1 = 0x17,
        PulserB0 = 0x19,
        PulserB1 = 0x1A,
        Scaler0 = 0x1C,
        Scaler1 = 0x1D,
        DispAdl = 0x20,
        DispAdh = 0x21,
        DispDtl = 0x22,
        DispDth = 0x23,
        DispC1 = 0x24,
        DispC2 = 0x25,
        LmAdl = 0x28,
        LmAdh = 0x29,
        Lmc = 0x2C,
    }
}

/// Status register bits
pub mod status {
    pub const SYSRES: u32 = 0x0001;
    pub const SYSCTRL: u32 = 0x0002;
    pub const DTACK: u32 = 0x0010;
    pub const BERR: u32 = 0x0020;
    pub const DIP0: u32 = 0x0100;
    pub const DIP1: u32 = 0x0200;
    pub const DIP2: u32 = 0x0400;
    pub const DIP3: u32 = 0x0800;
    pub const DIP4: u32 = 0x1000;
    pub const USBTYPE: u32 = 0x8000;
}

/// Input register bits
pub mod input {
    pub const IN0: u32 = 0x0001;
    pub const IN1: u32 = 0x0002;
    pub const COINC: u32 = 0x0004;
    pub const PULSER_A_OUT: u32 = 0x0008;
    pub const PULSER_B_OUT: u32 = 0x0010;
    pub const SCALER_END_COUNT: u32 = 0x0020;
    pub const LOCATION_MONITOR: u32 = 0x0040;
}

/// Output register bits
pub mod output {
    pub const PULSER_A_START: u32 = 0x0001;
    pub const PULSER_A_RESET: u32 = 0x0002;
    pub const PULSER_B_START: u32 = 0x0004;
    pub const PULSER_B_RESET: u32 = 0x0008;
    pub const SCALER_GATE: u32 = 0x0010;
    pub const SCALER_RESET: u32 = 0x0020;
    pub const OUT0: u32 = 0x0040;
    pub const OUT1: u32 = 0x0080;
    pub const OUT2: u32 = 0x0100;
    pub const OUT3: u32 = 0x0200;
    pub const OUT4: u32 = 0x0400;

    /// Every defined output bit
    pub const VALID_MASK: u32 = 0x07FF;
}

/// Width of the legacy scaler counter
pub const SCALER_COUNT_MASK: u32 = 0x03FF;
