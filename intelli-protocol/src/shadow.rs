//! Structured shadow documents produced by the frame codec.
//!
//! These mirror the nested `iDoseShadow`/`iClimateShadow` JSON shape the
//! controller firmware's own gateway produces, so that downstream message
//! bus subscribers see the same document shape regardless of which gateway
//! implementation published it.

use serde::{Deserialize, Serialize};

/// One function's installed/enabled/force-on triple.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FunctionStatus {
    pub name: &'static str,
    pub installed: bool,
    pub enabled: bool,
    pub force_on: bool,
}

/// Irrigation dosing/scheduling mode, decoded from the independent/sequential
/// bit pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IrrigationMode {
    Single,
    Independent,
    Sequential,
}

impl IrrigationMode {
    pub fn from_bits(independent: bool, sequential: bool) -> Self {
        match (independent, sequential) {
            (false, _) => IrrigationMode::Single,
            (true, false) => IrrigationMode::Independent,
            (true, true) => IrrigationMode::Sequential,
        }
    }

    pub fn to_bits(self) -> (bool, bool) {
        match self {
            IrrigationMode::Single => (false, false),
            IrrigationMode::Independent => (true, false),
            IrrigationMode::Sequential => (true, true),
        }
    }
}

// ---------------------------------------------------------------------
// IntelliDose
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NutrientReading {
    pub value: f64,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigUnitsIDose {
    pub date_format_usa: bool,
    pub temperature_f: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigFunctionsIDose {
    pub irrigation_mode: IrrigationMode,
    pub stations_installed: u8,
    pub ph_dosing_mode: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigAdvancedIDose {
    pub nutrient_config: bool,
    pub ph_mode: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigGeneralIDose {
    pub name: String,
    pub firmware_version: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigIDose {
    pub units: ConfigUnitsIDose,
    pub functions: ConfigFunctionsIDose,
    pub advanced: ConfigAdvancedIDose,
    pub general: ConfigGeneralIDose,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StationGeneral {
    pub mix: u16,
    pub duration: u16,
    pub interval: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusIDose {
    pub nutrient: NutrientStatus,
    pub status: Vec<FunctionStatus>,
    pub set_points: Vec<StationGeneral>,
    pub general: Vec<StationGeneral>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NutrientStatus {
    pub ec: NutrientReading,
    pub ph: NutrientReading,
    pub nut_temp: NutrientReading,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsIDose {
    pub ec: f64,
    pub ph: f64,
    pub nut_temp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IDoseShadow {
    pub config: ConfigIDose,
    pub status: StatusIDose,
    pub metrics: MetricsIDose,
    pub device: String,
    pub timestamp: i64,
    pub source: String,
    pub connected: bool,
}

// ---------------------------------------------------------------------
// IntelliClimate
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfigUnitsIClimate {
    pub date_format_usa: bool,
    pub temperature_f: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ConfigFunctionsIClimate {
    pub fan1: bool,
    pub fan2: bool,
    pub air_conditioner: bool,
    pub heater: bool,
    pub co2_sensor: bool,
    pub co2_sensor_range: bool,
    pub co2_injection: bool,
    pub co2_extraction: bool,
    pub dehumidifier: bool,
    pub humidifier: bool,
    pub pulsed_fogger: bool,
    pub light_bank1: bool,
    pub lights_air_colored: bool,
    pub light_bank2: bool,
    pub lamp_over_temp_shutdown_sensors: bool,
    pub outside_temp_sensor: bool,
    pub second_enviro_sensor: bool,
    pub intruder_alarm: bool,
    pub dehumidify_by_percentage: bool,
    pub mute_buzzer: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct SwitchingOffsets {
    pub heater: f64,
    pub fans: f64,
    pub air_conditioner: f64,
    pub humidifier_on: f64,
    pub humidifier_off: f64,
    pub dehumidifier_on: f64,
    pub dehumidifier_off: f64,
    pub co2_on: f64,
    pub co2_off: f64,
    /// Hardcoded by the controller firmware regardless of frame content.
    pub pulsed_fogger_on: f64,
    /// Hardcoded by the controller firmware regardless of frame content.
    pub pulsed_fogger_off: f64,
    pub heating_offset: f64,
}

impl SwitchingOffsets {
    pub const PULSED_FOGGER_ON: f64 = 10.0;
    pub const PULSED_FOGGER_OFF: f64 = 12.0;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct MinimumAirChangeRule {
    pub day_secs: u16,
    pub every_day_mins: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Rules {
    pub minimum_air_change: MinimumAirChangeRule,
    pub fail_safe_high_temp: f64,
    pub fail_safe_low_temp: f64,
    pub fogging_day_secs: u16,
    pub fogging_night_secs: u16,
    pub fog_times: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ConfigAdvancedIClimate {
    pub switching_offsets: SwitchingOffsets,
    pub rules: Rules,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigGeneralIClimate {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigIClimate {
    pub units: ConfigUnitsIClimate,
    pub functions: ConfigFunctionsIClimate,
    pub advanced: ConfigAdvancedIClimate,
    pub general: ConfigGeneralIClimate,
}

/// The 16-byte set-point record shared by D1/S1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct SetPointIClimate {
    pub light_bank: String,
    pub light_on: u16,
    pub light_duration: u16,
    pub day_temp: f64,
    pub night_drop_deg: f64,
    pub rh_day: u16,
    pub rh_max: u16,
    pub rh_night: u16,
    pub co2: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusIClimate {
    pub set_points: Vec<SetPointIClimate>,
    pub status: Vec<FunctionStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsIClimate {
    pub temperature: f64,
    pub humidity: f64,
    pub co2: f64,
    pub outside_temperature: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IClimateShadow {
    pub config: ConfigIClimate,
    pub status: StatusIClimate,
    pub metrics: MetricsIClimate,
    pub device: String,
    pub timestamp: i64,
    pub source: String,
    pub connected: bool,
}

/// Either shadow shape. Serializes untagged so a subscriber sees the same
/// flat document a gateway publishing only one device kind would produce —
/// there is no `Shadow` wrapper on the wire, matching the Go gateway's
/// `interface{}` shadow field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Shadow {
    IDose(IDoseShadow),
    IClimate(IClimateShadow),
}

impl Shadow {
    pub fn device(&self) -> &str {
        match self {
            Shadow::IDose(s) => &s.device,
            Shadow::IClimate(s) => &s.device,
        }
    }

    pub fn timestamp(&self) -> i64 {
        match self {
            Shadow::IDose(s) => s.timestamp,
            Shadow::IClimate(s) => s.timestamp,
        }
    }
}
