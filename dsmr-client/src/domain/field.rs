/// Datalogger fields a meter sensor can map onto.
///
/// The DSMR-reader datalogger schema is fixed, so the fields are an explicit
/// enum rather than free-form names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    ElectricityDelivered1,
    ElectricityDelivered2,
    ElectricityReturned1,
    ElectricityReturned2,
    ElectricityCurrentlyDelivered,
    ElectricityCurrentlyReturned,
    PhaseCurrentlyDeliveredL1,
    PhaseCurrentlyDeliveredL2,
    PhaseCurrentlyDeliveredL3,
    PhaseCurrentlyReturnedL1,
    PhaseCurrentlyReturnedL2,
    PhaseCurrentlyReturnedL3,
    PhaseVoltageL1,
    PhaseVoltageL2,
    PhaseVoltageL3,
    PhasePowerCurrentL1,
    PhasePowerCurrentL2,
    PhasePowerCurrentL3,
    ExtraDeviceDelivered,
}

impl Field {
    /// A reading missing any of these is incomplete and never forwarded.
    pub const MANDATORY: [Self; 6] = [
        Self::ElectricityDelivered1,
        Self::ElectricityDelivered2,
        Self::ElectricityReturned1,
        Self::ElectricityReturned2,
        Self::ElectricityCurrentlyDelivered,
        Self::ElectricityCurrentlyReturned,
    ];
}
