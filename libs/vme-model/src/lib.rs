//! Domain model for VME bridge access
//!
//! All enums carrying a wire value keep the exact numeric discriminant used by
//! the bridge firmware and drivers. Convert with `as_raw()` / `from_raw()`;
//! never rely on declaration order.

#[macro_use]
mod macros;

pub mod board;
pub mod bus;
pub mod capabilities;
pub mod io;
pub mod registers;

pub use board::{BoardType, BridgeModel, Controller, LinkArgKind, LinkKind};
pub use bus::{
    AddressModifier, AddressSpace, ArbiterType, BusRequestLevel, CycleClass, DataWidth, IrqLevel,
    IrqMask, ReleaseType, RequesterType, VmeTimeout,
};
pub use capabilities::Feature;
pub use io::{
    ContinuousRun, InputSelect, IoPolarity, IoSource, LedPolarity, OutputSelect, PulserSelect,
    ScalerMode, ScalerSource, TimeUnit,
};
pub use registers::Register;

/// Library release reported by the register layer
pub const LIBRARY_RELEASE: &str = "4.0.2";
