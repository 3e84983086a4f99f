use dsmr_client::domain::{DsmrReading, Reading};

use crate::{
    pipeline::{Aggregate, Envelope},
    sources::SensorSample,
    transform::mapper,
};

/// Folds the adapter's per-sensor samples into composite readings.
///
/// At most one bucket is open at a time. A mapped sample whose arrival second
/// differs from the open bucket closes it: complete buckets are emitted,
/// incomplete ones are discarded and a fresh bucket opens at the new second.
#[derive(Debug, Default)]
pub struct ReadingAccumulator {
    current: Option<Reading>,
}

impl Aggregate<SensorSample, DsmrReading> for ReadingAccumulator {
    fn fold(&mut self, input: Envelope<SensorSample>) -> Option<Envelope<DsmrReading>> {
        let field = mapper::resolve(&input.payload.entity)?;

        // The adapter reports an unavailable sensor as NaN; it must neither
        // touch the field nor move the bucket.
        if input.payload.value.is_nan() {
            metrics::counter!("samples_nan_total").increment(1);
            return None;
        }

        let rolls_over =
            self.current.as_ref().is_some_and(|reading| !reading.covers(input.received_at));
        let closed = if rolls_over { self.current.take() } else { None };

        let reading = self.current.get_or_insert_with(|| Reading::new(input.received_at));
        reading.set(field, input.payload.value);

        let closed = closed?;
        match closed.finalize() {
            Some(record) => {
                metrics::counter!("readings_completed_total").increment(1);
                Some(Envelope { payload: record, received_at: input.received_at })
            }
            None => {
                metrics::counter!("readings_incomplete_total").increment(1);
                tracing::debug!(read_at = %closed.read_at(), "discarding incomplete reading");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use time::{OffsetDateTime, macros::datetime};

    use super::*;

    const T1: OffsetDateTime = datetime!(2024-01-01 12:00:00 UTC);
    const T2: OffsetDateTime = datetime!(2024-01-01 12:00:01 UTC);
    const T3: OffsetDateTime = datetime!(2024-01-01 12:00:02 UTC);

    fn sample(entity: &str, value: f64, at: OffsetDateTime) -> Envelope<SensorSample> {
        Envelope { payload: SensorSample { entity: entity.to_string(), value }, received_at: at }
    }

    fn mandatory_samples(at: OffsetDateTime) -> Vec<Envelope<SensorSample>> {
        vec![
            sample("Power Consumed", 500.2, at),
            sample("Energy Consumed Tariff 1", 1000.0, at),
            sample("Energy Consumed Tariff 2", 2000.0, at),
            sample("Energy Produced Tariff 1", 10.0, at),
            sample("Energy Produced Tariff 2", 20.0, at),
            sample("Power Produced", 0.0, at),
        ]
    }

    #[test]
    fn complete_bucket_is_emitted_once_on_rollover() {
        let mut accumulator = ReadingAccumulator::default();
        for envelope in mandatory_samples(T1) {
            assert!(accumulator.fold(envelope).is_none());
        }

        // The next second closes the t1 bucket; the t2 bucket stays open.
        let emitted = accumulator.fold(sample("Power Consumed", 501.0, T2)).unwrap();
        let record = emitted.payload;
        assert_eq!(record.timestamp, "2024-01-01T12:00:00Z");
        assert_eq!(record.electricity_currently_delivered, "500.200");
        assert_eq!(record.electricity_delivered_1, "1000.000");
        assert_eq!(record.electricity_delivered_2, "2000.000");
        assert_eq!(record.electricity_returned_1, "10.000");
        assert_eq!(record.electricity_returned_2, "20.000");
        assert_eq!(record.electricity_currently_returned, "0.000");
        assert_eq!(record.phase_voltage_l1, None);

        assert!(accumulator.fold(sample("Energy Consumed Tariff 1", 1000.1, T2)).is_none());
    }

    #[test]
    fn incomplete_bucket_is_discarded_silently() {
        let mut accumulator = ReadingAccumulator::default();
        accumulator.fold(sample("Power Consumed", 500.2, T1));
        accumulator.fold(sample("Energy Consumed Tariff 1", 1000.0, T1));

        assert!(accumulator.fold(sample("Power Consumed", 501.0, T2)).is_none());

        // The discarded bucket is gone for good; completing t2 emits t2 only.
        for envelope in mandatory_samples(T2) {
            accumulator.fold(envelope);
        }
        let emitted = accumulator.fold(sample("Power Consumed", 502.0, T3)).unwrap();
        assert_eq!(emitted.payload.timestamp, "2024-01-01T12:00:01Z");
    }

    #[test]
    fn unmapped_sensors_never_touch_the_bucket() {
        let mut accumulator = ReadingAccumulator::default();
        for envelope in mandatory_samples(T1) {
            accumulator.fold(envelope);
        }

        // Neither an ignored nor an unknown entity may roll the bucket.
        assert!(accumulator.fold(sample("SlimmeLezer Uptime", 12345.0, T2)).is_none());
        assert!(accumulator.fold(sample("Mystery Sensor", 1.0, T2)).is_none());

        let emitted = accumulator.fold(sample("Power Consumed", 501.0, T2)).unwrap();
        assert_eq!(emitted.payload.timestamp, "2024-01-01T12:00:00Z");
    }

    #[test]
    fn nan_does_not_overwrite_mark_or_roll() {
        let mut accumulator = ReadingAccumulator::default();
        for envelope in mandatory_samples(T1) {
            accumulator.fold(envelope);
        }

        // NaN in the next second: still no rollover, nothing emitted.
        assert!(accumulator.fold(sample("Power Consumed", f64::NAN, T2)).is_none());

        let emitted = accumulator.fold(sample("Power Consumed", 501.0, T2)).unwrap();
        // The previously set value survived the NaN.
        assert_eq!(emitted.payload.electricity_currently_delivered, "500.200");
    }

    #[test]
    fn nan_never_marks_a_field_as_set() {
        let mut accumulator = ReadingAccumulator::default();
        for envelope in mandatory_samples(T1).into_iter().skip(1) {
            accumulator.fold(envelope);
        }
        // The missing mandatory field arrives as NaN only.
        accumulator.fold(sample("Power Consumed", f64::NAN, T1));

        // Bucket closes incomplete: no record.
        assert!(accumulator.fold(sample("Power Consumed", 501.0, T2)).is_none());
    }

    #[test]
    fn first_sample_opens_without_emitting() {
        let mut accumulator = ReadingAccumulator::default();
        assert!(accumulator.fold(sample("Power Consumed", 500.2, T1)).is_none());
    }

    #[test]
    fn last_write_wins_within_a_bucket() {
        let mut accumulator = ReadingAccumulator::default();
        for envelope in mandatory_samples(T1) {
            accumulator.fold(envelope);
        }
        accumulator.fold(sample("Power Consumed", 499.9, T1));

        let emitted = accumulator.fold(sample("Power Consumed", 501.0, T2)).unwrap();
        assert_eq!(emitted.payload.electricity_currently_delivered, "499.900");
    }
}
