use dsmr_client::domain::Field;

/// Translates a SlimmeLezer entity name into its datalogger field.
///
/// Entities the datalogger has no column for map to `None`, and so does any
/// name this table has never heard of; both are dropped without a sound.
pub fn resolve(entity_name: &str) -> Option<Field> {
    match entity_name {
        "Energy Consumed Tariff 1" => Some(Field::ElectricityDelivered1),
        "Energy Consumed Tariff 2" => Some(Field::ElectricityDelivered2),
        "Energy Produced Tariff 1" => Some(Field::ElectricityReturned1),
        "Energy Produced Tariff 2" => Some(Field::ElectricityReturned2),
        "Power Consumed" => Some(Field::ElectricityCurrentlyDelivered),
        "Power Produced" => Some(Field::ElectricityCurrentlyReturned),
        "Power Consumed Phase 1" => Some(Field::PhaseCurrentlyDeliveredL1),
        "Power Consumed Phase 2" => Some(Field::PhaseCurrentlyDeliveredL2),
        "Power Consumed Phase 3" => Some(Field::PhaseCurrentlyDeliveredL3),
        "Power Produced Phase 1" => Some(Field::PhaseCurrentlyReturnedL1),
        "Power Produced Phase 2" => Some(Field::PhaseCurrentlyReturnedL2),
        "Power Produced Phase 3" => Some(Field::PhaseCurrentlyReturnedL3),
        "Voltage Phase 1" => Some(Field::PhaseVoltageL1),
        "Voltage Phase 2" => Some(Field::PhaseVoltageL2),
        "Voltage Phase 3" => Some(Field::PhaseVoltageL3),
        "Current Phase 1" => Some(Field::PhasePowerCurrentL1),
        "Current Phase 2" => Some(Field::PhasePowerCurrentL2),
        "Current Phase 3" => Some(Field::PhasePowerCurrentL3),
        "Gas Consumed Belgium" => Some(Field::ExtraDeviceDelivered),
        // Entities the adapter exposes but the datalogger does not take.
        "Energy Consumed Luxembourg"
        | "Energy Produced Luxembourg"
        | "Electricity Failures"
        | "Long Electricity Failures"
        | "Gas Consumed"
        | "SlimmeLezer Uptime"
        | "SlimmeLezer Wi-Fi Signal"
        | "SlimmeLezer IP Address"
        | "SlimmeLezer Wi-Fi SSID"
        | "SlimmeLezer Wi-Fi BSSID"
        | "DSMR Identification"
        | "DSMR Version"
        | "DSMR Version Belgium"
        | "ESPHome Version" => None,
        _ => None,
    }
}
