use battlink_core::{PowerStatus, TelemetryRecord};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Produces one telemetry snapshot per reporting cycle.
pub trait TelemetrySource {
    fn sample(&mut self, timestamp: u32) -> TelemetryRecord;
}

impl<F> TelemetrySource for F
where
    F: FnMut(u32) -> TelemetryRecord,
{
    fn sample(&mut self, timestamp: u32) -> TelemetryRecord {
        self(timestamp)
    }
}

/// Stand-in for a real battery monitor: a single Li-ion cell between
/// 3.70 V and 4.20 V.
pub struct SimulatedBattery {
    rng: StdRng,
}

impl SimulatedBattery {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for SimulatedBattery {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetrySource for SimulatedBattery {
    fn sample(&mut self, timestamp: u32) -> TelemetryRecord {
        TelemetryRecord {
            voltage_mv: self.rng.random_range(3700..4200),
            current_ma: self.rng.random_range(-500..=1500),
            status: PowerStatus::On,
            temperature_c: self.rng.random_range(20..=35),
            timestamp,
        }
    }
}
