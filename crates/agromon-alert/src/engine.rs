use chrono::{DateTime, Utc};

use agromon_common::types::{HourlyReading, WeatherAlert};

use crate::ThresholdRule;

/// Evaluates the rule table over an ordered reading sequence for one
/// location.
///
/// Consecutive readings tripping the same rule are coalesced into a single
/// alert spanning the run's time range, so a multi-hour heat event yields
/// one alert, not one per hour.
pub struct AlertEngine {
    rules: Vec<ThresholdRule>,
}

/// State of the run currently being extended for one rule.
struct OpenRun {
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    hours: u32,
    peak_value: f64,
    peak_excess: f64,
}

impl AlertEngine {
    pub fn new(rules: Vec<ThresholdRule>) -> Self {
        Self { rules }
    }

    pub fn with_default_rules() -> Self {
        Self::new(crate::default_rules())
    }

    pub fn rules(&self) -> &[ThresholdRule] {
        &self.rules
    }

    /// Derives alerts from a chronologically sorted reading sequence.
    ///
    /// Output is ordered by ascending run start, then descending severity
    /// for ties. Never fails on well-formed input; readings with no data in
    /// a rule's field neither open nor extend that rule's runs.
    pub fn evaluate(
        &self,
        readings: &[HourlyReading],
        generated_at: DateTime<Utc>,
    ) -> Vec<WeatherAlert> {
        let mut alerts = Vec::new();
        for rule in &self.rules {
            collect_runs(rule, readings, generated_at, &mut alerts);
        }
        alerts.sort_by(|a, b| {
            a.starts_at
                .cmp(&b.starts_at)
                .then_with(|| b.severity.cmp(&a.severity))
        });
        alerts
    }

}

/// Scan one rule over the sequence, emitting an alert per maximal run.
fn collect_runs(
    rule: &ThresholdRule,
    readings: &[HourlyReading],
    generated_at: DateTime<Utc>,
    out: &mut Vec<WeatherAlert>,
) {
    let mut open: Option<OpenRun> = None;

    for reading in readings {
        match rule.trips(reading) {
            Some(value) => {
                let excess = rule.excess(value);
                match open.as_mut() {
                    Some(run) => {
                        run.ends_at = reading.timestamp;
                        run.hours += 1;
                        if excess > run.peak_excess {
                            run.peak_excess = excess;
                            run.peak_value = value;
                        }
                    }
                    None => {
                        open = Some(OpenRun {
                            starts_at: reading.timestamp,
                            ends_at: reading.timestamp,
                            hours: 1,
                            peak_value: value,
                            peak_excess: excess,
                        });
                    }
                }
            }
            None => {
                if let Some(run) = open.take() {
                    out.push(close_run(rule, run, generated_at));
                }
            }
        }
    }

    if let Some(run) = open.take() {
        out.push(close_run(rule, run, generated_at));
    }
}

fn close_run(rule: &ThresholdRule, run: OpenRun, generated_at: DateTime<Utc>) -> WeatherAlert {
    let severity = rule.severity(run.peak_excess, run.hours);
    let unit = rule.field.unit();
    let message = format!(
        "{}: {} {} {:.1} {} for {} h (peak {:.1} {})",
        rule.kind.label(),
        rule.field.name(),
        rule.op.word(),
        rule.bound,
        unit,
        run.hours,
        run.peak_value,
        unit,
    );
    WeatherAlert {
        kind: rule.kind,
        severity,
        message,
        starts_at: run.starts_at,
        ends_at: run.ends_at,
        hours: run.hours,
        peak_value: run.peak_value,
        threshold: rule.bound,
        generated_at,
    }
}
