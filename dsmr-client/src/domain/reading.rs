use std::collections::BTreeMap;

use serde::Serialize;
use time::{
    OffsetDateTime, UtcOffset, format_description::BorrowedFormatItem,
    macros::format_description,
};

use crate::domain::Field;

/// Datalogger timestamps carry whole-second precision, always in UTC.
static READ_AT_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");

/// A composite reading under assembly for one timestamp bucket.
///
/// Field values accumulate as the adapter pushes them; the reading is only
/// rendered for the datalogger once its bucket closes.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    read_at: OffsetDateTime,
    values: BTreeMap<Field, f64>,
}

impl Reading {
    pub fn new(read_at: OffsetDateTime) -> Self {
        Self { read_at, values: BTreeMap::new() }
    }

    pub fn read_at(&self) -> OffsetDateTime {
        self.read_at
    }

    /// Whether an instant falls into this reading's bucket.
    ///
    /// Buckets are keyed by whole seconds: the adapter sends no end-of-batch
    /// marker, so a change of second is what closes a reading.
    pub fn covers(&self, instant: OffsetDateTime) -> bool {
        self.read_at.unix_timestamp() == instant.unix_timestamp()
    }

    /// Last write wins within a bucket.
    pub fn set(&mut self, field: Field, value: f64) {
        self.values.insert(field, value);
    }

    pub fn get(&self, field: Field) -> Option<f64> {
        self.values.get(&field).copied()
    }

    pub fn is_complete(&self) -> bool {
        Field::MANDATORY.iter().all(|field| self.values.contains_key(field))
    }

    /// Renders the reading for the datalogger, or `None` when a mandatory
    /// field never arrived.
    pub fn finalize(&self) -> Option<DsmrReading> {
        Some(DsmrReading {
            timestamp: self
                .read_at
                .to_offset(UtcOffset::UTC)
                .format(READ_AT_FORMAT)
                .expect("reading timestamp must be formattable"),
            electricity_delivered_1: self.energy(Field::ElectricityDelivered1)?,
            electricity_delivered_2: self.energy(Field::ElectricityDelivered2)?,
            electricity_returned_1: self.energy(Field::ElectricityReturned1)?,
            electricity_returned_2: self.energy(Field::ElectricityReturned2)?,
            electricity_currently_delivered: self
                .energy(Field::ElectricityCurrentlyDelivered)?,
            electricity_currently_returned: self
                .energy(Field::ElectricityCurrentlyReturned)?,
            phase_currently_delivered_l1: self.energy(Field::PhaseCurrentlyDeliveredL1),
            phase_currently_delivered_l2: self.energy(Field::PhaseCurrentlyDeliveredL2),
            phase_currently_delivered_l3: self.energy(Field::PhaseCurrentlyDeliveredL3),
            phase_currently_returned_l1: self.energy(Field::PhaseCurrentlyReturnedL1),
            phase_currently_returned_l2: self.energy(Field::PhaseCurrentlyReturnedL2),
            phase_currently_returned_l3: self.energy(Field::PhaseCurrentlyReturnedL3),
            phase_voltage_l1: self.voltage(Field::PhaseVoltageL1),
            phase_voltage_l2: self.voltage(Field::PhaseVoltageL2),
            phase_voltage_l3: self.voltage(Field::PhaseVoltageL3),
            phase_power_current_l1: self.amperage(Field::PhasePowerCurrentL1),
            phase_power_current_l2: self.amperage(Field::PhasePowerCurrentL2),
            phase_power_current_l3: self.amperage(Field::PhasePowerCurrentL3),
            extra_device_delivered: self.energy(Field::ExtraDeviceDelivered),
        })
    }

    /// Energy and power values: 3 decimals, rendered as a string.
    fn energy(&self, field: Field) -> Option<String> {
        self.get(field).map(|value| format!("{value:.3}"))
    }

    /// Phase voltages: 1 decimal, rendered as a string.
    fn voltage(&self, field: Field) -> Option<String> {
        self.get(field).map(|value| format!("{value:.1}"))
    }

    /// Phase currents: whole amperes.
    fn amperage(&self, field: Field) -> Option<i64> {
        self.get(field).map(|value| value.round() as i64)
    }
}

/// Payload for `POST <base>/datalogger/dsmrreading`.
///
/// The six mandatory fields are plain `String`s: a value of this type proves
/// the reading was complete. Optional fields are omitted from the JSON when
/// absent, never sent as null.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DsmrReading {
    pub timestamp: String,
    pub electricity_delivered_1: String,
    pub electricity_delivered_2: String,
    pub electricity_returned_1: String,
    pub electricity_returned_2: String,
    pub electricity_currently_delivered: String,
    pub electricity_currently_returned: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_currently_delivered_l1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_currently_delivered_l2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_currently_delivered_l3: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_currently_returned_l1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_currently_returned_l2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_currently_returned_l3: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_voltage_l1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_voltage_l2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_voltage_l3: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_power_current_l1: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_power_current_l2: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_power_current_l3: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_device_delivered: Option<String>,
}
