//! Front-panel peripherals: pulsers, scaler and I/O lines

use crate::board::BridgeModel;

wire_enum! {
    pub enum PulserSelect: i32 {
        A = 0,
        B = 1,
    }
}

wire_enum! {
    pub enum OutputSelect: i32 {
        Output0 = 0,
        Output1 = 1,
        Output2 = 2,
        Output3 = 3,
        Output4 = 4,
    }
}

wire_enum! {
    pub enum InputSelect: i32 {
        Input0 = 0,
        Input1 = 1,
    }
}

wire_enum! {
    /// Signal sources for pulsers, legacy scaler and outputs
    pub enum IoSource: i32 {
        /// Front-panel button or software
        ManualSw = 0,
        InputSrc0 = 1,
        InputSrc1 = 2,
        Coincidence = 3,
        VmeSignals = 4,
        MiscSignals = 6,
        PulserV3718A = 7,
        PulserV3718B = 8,
        ScalerEnd = 9,
    }
}

impl IoSource {
    /// Sources only wired on the V3718
    pub fn is_v3718_only(self) -> bool {
        matches!(
            self,
            IoSource::PulserV3718A | IoSource::PulserV3718B | IoSource::ScalerEnd
        )
    }
}

wire_enum! {
    /// Time base for pulser period and width
    pub enum TimeUnit: i32 {
        Unit25ns = 0,
        Unit1600ns = 1,
        Unit410us = 2,
        Unit104ms = 3,
        Unit25us = 4,
    }
}

impl TimeUnit {
    pub fn nanos(self) -> u64 {
        match self {
            TimeUnit::Unit25ns => 25,
            TimeUnit::Unit1600ns => 1_600,
            TimeUnit::Unit410us => 410_000,
            TimeUnit::Unit104ms => 104_000_000,
            TimeUnit::Unit25us => 25_000,
        }
    }

    pub fn available_on(self, bridge: BridgeModel) -> bool {
        match self {
            TimeUnit::Unit104ms | TimeUnit::Unit25us => bridge == BridgeModel::V3718,
            _ => true,
        }
    }
}

wire_enum! {
    pub enum LedPolarity: i32 {
        ActiveHigh = 0,
        ActiveLow = 1,
    }
}

wire_enum! {
    pub enum IoPolarity: i32 {
        Direct = 0,
        Inverted = 1,
    }
}

wire_enum! {
    /// Extended scaler source selection (V3718)
    pub enum ScalerSource: i32 {
        In0 = 0x2,
        In1 = 0x3,
        Ds = 0x4,
        As = 0x5,
        Dtack = 0x6,
        Berr = 0x7,
        Sw = 0x8,
        FpButton = 0x9,
        Coinc = 0xA,
        InOr = 0xB,
    }
}

wire_enum! {
    pub enum ScalerMode: i32 {
        Gate = 0x0,
        DwellTime = 0x1,
        MaxHits = 0x2,
    }
}

wire_enum! {
    /// Continuous-run flag; the wire encoding is inverted (On = 0)
    pub enum ContinuousRun: i32 {
        Off = 1,
        On = 0,
    }
}

impl From<bool> for ContinuousRun {
    fn from(on: bool) -> Self {
        if on {
            ContinuousRun::On
        } else {
            ContinuousRun::Off
        }
    }
}

impl ContinuousRun {
    pub fn is_on(self) -> bool {
        self == ContinuousRun::On
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_io_source_gaps() {
        assert_eq!(IoSource::from_raw(5), None);
        assert_eq!(IoSource::MiscSignals.as_raw(), 6);
        assert!(IoSource::ScalerEnd.is_v3718_only());
        assert!(!IoSource::Coincidence.is_v3718_only());
    }

    #[test]
    fn test_time_units() {
        assert_eq!(TimeUnit::Unit1600ns.nanos(), 1_600);
        assert!(TimeUnit::Unit104ms.available_on(BridgeModel::V3718));
        assert!(!TimeUnit::Unit25us.available_on(BridgeModel::V2718));
        assert!(TimeUnit::Unit25ns.available_on(BridgeModel::V1718));
    }

    #[test]
    fn test_continuous_run_is_inverted() {
        assert_eq!(ContinuousRun::On.as_raw(), 0);
        assert_eq!(ContinuousRun::Off.as_raw(), 1);
        assert_eq!(ContinuousRun::from(true), ContinuousRun::On);
        assert!(!ContinuousRun::from_raw(1).unwrap().is_on());
    }

    #[test]
    fn test_scaler_source_values() {
        assert_eq!(ScalerSource::InOr.as_raw(), 0xB);
        assert_eq!(ScalerSource::from_raw(0x1), None);
        assert_eq!(ScalerMode::MaxHits.as_raw(), 2);
    }
}
