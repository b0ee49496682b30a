//! Front-panel peripherals of the V1718/V2718/V3718 bridges

pub mod display;
pub mod io_lines;
pub mod pulser;
pub mod scaler;

pub use display::DisplaySnapshot;
pub use io_lines::{InputConfig, OutputConfig};
pub use pulser::PulserConfig;
pub use scaler::{ExtendedScalerConfig, ExtendedScalerSetting, ScalerConfig};
