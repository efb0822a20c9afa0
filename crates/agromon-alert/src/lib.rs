//! Rule-based alert detection over hourly forecast readings.
//!
//! Rules are a declarative table of [`ThresholdRule`]s consumed by a single
//! generic evaluator, [`engine::AlertEngine`]. The engine is pure: it holds
//! no state between invocations, and identical input sequences always yield
//! identical alert sequences.

pub mod engine;


use agromon_common::types::{AlertKind, HourlyReading, Severity};

/// The reading field a rule evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingField {
    Temperature,
    Precipitation,
    WindSpeed,
    Humidity,
}

impl ReadingField {
    pub fn extract(&self, reading: &HourlyReading) -> Option<f64> {
        match self {
            ReadingField::Temperature => reading.temperature_c,
            ReadingField::Precipitation => reading.precipitation_mm,
            ReadingField::WindSpeed => reading.wind_speed_kmh,
            ReadingField::Humidity => reading.relative_humidity_pct,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ReadingField::Temperature => "temperature",
            ReadingField::Precipitation => "precipitation",
            ReadingField::WindSpeed => "wind speed",
            ReadingField::Humidity => "relative humidity",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            ReadingField::Temperature => "°C",
            ReadingField::Precipitation => "mm",
            ReadingField::WindSpeed => "km/h",
            ReadingField::Humidity => "%",
        }
    }
}

/// Direction of a threshold comparison. Both comparisons are strict: a value
/// exactly at the bound does not trip the rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Above,
    Below,
}

impl CompareOp {
    fn check(&self, value: f64, bound: f64) -> bool {
        match self {
            CompareOp::Above => value > bound,
            CompareOp::Below => value < bound,
        }
    }

    /// Magnitude of the excursion past the bound; positive when tripped.
    fn excess(&self, value: f64, bound: f64) -> f64 {
        match self {
            CompareOp::Above => value - bound,
            CompareOp::Below => bound - value,
        }
    }

    fn word(&self) -> &'static str {
        match self {
            CompareOp::Above => "above",
            CompareOp::Below => "below",
        }
    }
}

/// One row of the alert rule table: a field, a strict bound, and the
/// escalation steps that map excursion magnitude and run length to a
/// severity.
#[derive(Debug, Clone)]
pub struct ThresholdRule {
    pub kind: AlertKind,
    pub field: ReadingField,
    pub op: CompareOp,
    pub bound: f64,
    /// Excursion magnitude at which severity escalates to Warning.
    pub warn_excess: f64,
    /// Excursion magnitude at which severity escalates to Severe.
    pub severe_excess: f64,
    /// Run length (hours) at which severity escalates to Warning.
    pub warn_hours: u32,
    /// Run length (hours) at which severity escalates to Severe.
    pub severe_hours: u32,
}

impl ThresholdRule {
    /// Returns the reading's value for this rule's field if it trips the
    /// rule. A reading with no data in the field never trips and never
    /// extends a run.
    fn trips(&self, reading: &HourlyReading) -> Option<f64> {
        self.field
            .extract(reading)
            .filter(|v| self.op.check(*v, self.bound))
    }

    fn excess(&self, value: f64) -> f64 {
        self.op.excess(value, self.bound)
    }

    /// Severity for a run: the larger of the excursion step and the
    /// run-length step. Monotone in both arguments, so larger excursions and
    /// longer runs never map to a strictly lower severity.
    fn severity(&self, peak_excess: f64, hours: u32) -> Severity {
        let by_excess = if peak_excess >= self.severe_excess {
            Severity::Severe
        } else if peak_excess >= self.warn_excess {
            Severity::Warning
        } else {
            Severity::Info
        };
        let by_run = if hours >= self.severe_hours {
            Severity::Severe
        } else if hours >= self.warn_hours {
            Severity::Warning
        } else {
            Severity::Info
        };
        by_excess.max(by_run)
    }
}

/// The built-in rule table.
pub fn default_rules() -> Vec<ThresholdRule> {
    vec![
        ThresholdRule {
            kind: AlertKind::Heat,
            field: ReadingField::Temperature,
            op: CompareOp::Above,
            bound: 35.0,
            warn_excess: 3.0,
            severe_excess: 6.0,
            warn_hours: 3,
            severe_hours: 6,
        },
        ThresholdRule {
            kind: AlertKind::Frost,
            field: ReadingField::Temperature,
            op: CompareOp::Below,
            bound: 0.0,
            warn_excess: 3.0,
            severe_excess: 6.0,
            warn_hours: 3,
            severe_hours: 6,
        },
        ThresholdRule {
            kind: AlertKind::HeavyPrecipitation,
            field: ReadingField::Precipitation,
            op: CompareOp::Above,
            bound: 10.0,
            warn_excess: 5.0,
            severe_excess: 15.0,
            warn_hours: 3,
            severe_hours: 6,
        },
        ThresholdRule {
            kind: AlertKind::HighWind,
            field: ReadingField::WindSpeed,
            op: CompareOp::Above,
            bound: 60.0,
            warn_excess: 15.0,
            severe_excess: 30.0,
            warn_hours: 3,
            severe_hours: 6,
        },
        ThresholdRule {
            kind: AlertKind::HighHumidity,
            field: ReadingField::Humidity,
            op: CompareOp::Above,
            bound: 95.0,
            warn_excess: 3.0,
            severe_excess: 5.0,
            warn_hours: 6,
            severe_hours: 12,
        },
        ThresholdRule {
            kind: AlertKind::LowHumidity,
            field: ReadingField::Humidity,
            op: CompareOp::Below,
            bound: 20.0,
            warn_excess: 5.0,
            severe_excess: 10.0,
            warn_hours: 6,
            severe_hours: 12,
        },
    ]
}
