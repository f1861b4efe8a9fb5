// Collar status domain models and metric derivation
use serde::{Deserialize, Serialize};

/// Battery voltage window the firmware reports in, in millivolts.
const BATTERY_MIN_MV: f64 = 3600.0;
const BATTERY_MAX_MV: f64 = 4200.0;

/// Fallback respiration rate (breaths/min) when the collar omits the field.
const RESP_RATE_FALLBACK_BPM: f64 = 23.0;

/// Raw status payload as produced by the collar backend. Untrusted:
/// numeric fields may be missing or null, so everything optional stays
/// an `Option` until derivation applies the documented defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCollarStatus {
    #[serde(default)]
    pub collar_id: String,
    #[serde(default)]
    pub last_seen_ts: Option<i64>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub battery_mv: Option<f64>,
    #[serde(default)]
    pub dog_temp_c: Option<f64>,
    #[serde(default)]
    pub activity_state: Option<String>,
    #[serde(default)]
    pub last_leq_db: Option<f64>,
    #[serde(default)]
    pub bark_count: Option<u32>,
    #[serde(default)]
    pub panting_index: Option<f64>,
    #[serde(default)]
    pub resp_rate_bpm: Option<f64>,
}

/// UI-ready snapshot derived from a raw status. Replaced wholesale on
/// every inbound record; every numeric field is clamped to its range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedStatus {
    /// Respiration rate x3 proxy. The collar has no heart-rate sensor;
    /// this is a deliberate simulation, not a measurement.
    pub heart_rate: f64,
    /// Heuristic stress indicator, 0-100.
    pub anxiety_level: u8,
    pub decibels: f64,
    /// Battery percent, 0-100 with one decimal.
    pub battery: f64,
    pub temperature: f64,
    pub is_barking: bool,
    pub is_connected: bool,
}

impl Default for NormalizedStatus {
    fn default() -> Self {
        Self {
            heart_rate: 0.0,
            anxiety_level: 0,
            decibels: 0.0,
            battery: 0.0,
            temperature: 0.0,
            is_barking: false,
            is_connected: false,
        }
    }
}

impl NormalizedStatus {
    /// Derive a fresh snapshot from a raw record. Marks the collar
    /// connected; a record only arrives over a live transport.
    pub fn from_raw(raw: &RawCollarStatus) -> Self {
        let resp_rate = raw.resp_rate_bpm.unwrap_or(RESP_RATE_FALLBACK_BPM);
        Self {
            heart_rate: round_to(Some(resp_rate * 3.0), 2),
            anxiety_level: anxiety_level(raw),
            decibels: round_to(raw.last_leq_db, 2),
            battery: battery_percent(raw.battery_mv.unwrap_or(0.0)),
            temperature: round_to(raw.dog_temp_c, 2),
            is_barking: raw.bark_count.unwrap_or(0) > 0,
            is_connected: true,
        }
    }

    /// Dead visual state on transport loss: heart rate, sound level and
    /// barking reset; battery and temperature keep their last reading.
    pub fn mark_disconnected(&mut self) {
        self.is_connected = false;
        self.heart_rate = 0.0;
        self.decibels = 0.0;
        self.is_barking = false;
    }
}

/// Round to `places` decimals, treating a missing reading as 0.
pub fn round_to(value: Option<f64>, places: u32) -> f64 {
    let v = value.unwrap_or(0.0);
    let factor = 10f64.powi(places as i32);
    ((v + f64::EPSILON) * factor).round() / factor
}

/// Map battery millivolts onto a 0-100 percentage with one decimal.
/// Inputs at or below 3600 mV clamp to 0, at or above 4200 mV to 100.
pub fn battery_percent(mv: f64) -> f64 {
    let pct = (mv - BATTERY_MIN_MV) / (BATTERY_MAX_MV - BATTERY_MIN_MV) * 100.0;
    round_to(Some(pct), 1).clamp(0.0, 100.0)
}

/// Heuristic anxiety score: base 10, plus weighted contributions from
/// sustained noise, frequent barking and elevated respiration.
pub fn anxiety_level(raw: &RawCollarStatus) -> u8 {
    let mut score: u32 = 10;
    if raw.last_leq_db.unwrap_or(0.0) > 80.0 {
        score += 40;
    }
    if raw.bark_count.unwrap_or(0) > 5 {
        score += 30;
    }
    if raw.resp_rate_bpm.is_some_and(|r| r > 50.0) {
        score += 20;
    }
    score.min(100) as u8
}
