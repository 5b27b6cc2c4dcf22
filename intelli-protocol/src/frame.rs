//! 64-byte frame codec: builds D0-D3 read requests and S0-S2 write
//! requests, and converts between raw frame bytes and shadow documents.
//!
//! Byte offsets and scale factors below are the fixed wire layout the
//! controller firmware expects; every offset used on the decode side is
//! reused verbatim on the encode side so that encode is the exact inverse
//! of decode (see the round-trip tests in `tests/`).

use thiserror::Error;

use crate::bits::{bit_get, bit_set, crc16_ccitt, i16_be_decode, u16_le_decode, u16_le_encode};
use crate::shadow::{
    ConfigAdvancedIClimate, ConfigAdvancedIDose, ConfigFunctionsIClimate, ConfigFunctionsIDose,
    ConfigGeneralIClimate, ConfigGeneralIDose, ConfigIClimate, ConfigIDose, ConfigUnitsIClimate,
    ConfigUnitsIDose, FunctionStatus, IClimateShadow, IDoseShadow, IrrigationMode, MetricsIClimate,
    MetricsIDose, MinimumAirChangeRule, NutrientReading, NutrientStatus, Rules, SetPointIClimate,
    StationGeneral, StatusIClimate, StatusIDose, SwitchingOffsets,
};

pub const FRAME_LEN: usize = 64;
const SENTINEL_RAW: u16 = 32768;
const SENTINEL: f64 = 32768.0;

/// A device kind as reported by the HID collaborator's product name string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    IntelliDose,
    IntelliClimate,
}

impl DeviceKind {
    /// Number of read frames (D-frames) a full interrogation sweep issues.
    pub fn read_frame_count(self) -> usize {
        match self {
            DeviceKind::IntelliDose => 3,
            DeviceKind::IntelliClimate => 4,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame has length {actual}, expected {FRAME_LEN}")]
    ShortFrame { actual: usize },
}

fn finalize_crc(frame: &mut [u8; FRAME_LEN]) {
    let crc = crc16_ccitt(&frame[0..62]);
    let (low, high) = u16_le_encode(crc);
    frame[62] = low;
    frame[63] = high;
}

fn check_len(buf: &[u8]) -> Result<(), FrameError> {
    if buf.len() != FRAME_LEN {
        Err(FrameError::ShortFrame { actual: buf.len() })
    } else {
        Ok(())
    }
}

/// Builds a literal read-request frame, e.g. `build_read_request(b'0')` for
/// D0. The payload is `0x44, b'0'..=b'3'`, zero padding, and a trailing CRC.
pub fn build_read_request(index: u8) -> [u8; FRAME_LEN] {
    let mut frame = [0u8; FRAME_LEN];
    frame[0] = b'D';
    frame[1] = index;
    finalize_crc(&mut frame);
    frame
}

fn write_frame_header(frame: &mut [u8; FRAME_LEN], letter: u8, index: u8) {
    frame[0] = letter;
    frame[1] = index;
}

fn sentinel_aware_scale(raw: u16, scale: f64, digits: u32) -> f64 {
    if raw == SENTINEL_RAW {
        return SENTINEL;
    }
    let factor = 10f64.powi(digits as i32);
    ((raw as f64 / scale) * factor).round() / factor
}

/// Same as [`sentinel_aware_scale`] but for fields carried as signed 16-bit
/// values (temperatures, offsets, deltas). `raw` is the `i16_be_decode`
/// result reinterpreted bit-for-bit as `u16` solely so the sentinel bit
/// pattern `0x8000` compares equal to [`SENTINEL_RAW`]; the scaling division
/// itself is done on the signed value, unlike the unsigned variant above.
fn signed_sentinel_aware_scale(raw: u16, scale: f64, digits: u32) -> f64 {
    if raw == SENTINEL_RAW {
        return SENTINEL;
    }
    let factor = 10f64.powi(digits as i32);
    ((raw as i16 as f64 / scale) * factor).round() / factor
}

/// Inverts [`sentinel_aware_scale`]. Goes through `i16` before reinterpreting
/// as `u16`: a plain `f64 as u16` cast saturates negative values to 0 instead
/// of producing the two's-complement bit pattern `i16_be_decode` expects back
/// (fail-safe low temperatures and other signed fields can be negative).
fn scale_to_raw(value: f64, scale: f64) -> u16 {
    if value == SENTINEL {
        return SENTINEL_RAW;
    }
    ((value * scale).round() as i16) as u16
}

// ---------------------------------------------------------------------
// IntelliDose
// ---------------------------------------------------------------------

mod idose_offsets {
    // D0
    pub const FW_VERSION: usize = 7; // i16_be over [7,8], scale x100
    pub const EC: usize = 9; // u16 le, scale x100
    pub const PH: usize = 11; // u16 le, scale x100
    pub const NUT_TEMP: usize = 13; // u16 le, scale x10
    pub const NUTRIENT_ENABLE: usize = 15; // bit0 ec, bit1 ph, bit2 nut_temp
    pub const SESSION_TOKEN: usize = 61;

    // D1
    pub const UNITS: usize = 0; // bit0 date_format_usa, bit1 temperature_f
    pub const FUNCTIONS: usize = 1; // bits0-2 stations_installed, bit3 ph_dosing_mode
    pub const ADVANCED: usize = 2; // bit0 nutrient_config, bit1 ph_mode
    pub const STATUS: usize = 6; // 8 contiguous bytes, one per function
    pub const SET_POINTS: usize = 14; // 4 stations * 6 bytes (mix,duration,interval)
    pub const IRRIGATION_INDEPENDENT_BYTE: usize = 58;
    pub const IRRIGATION_INDEPENDENT_BIT: u8 = 7;
    pub const IRRIGATION_SEQUENTIAL_BYTE: usize = 59;
    pub const IRRIGATION_SEQUENTIAL_BIT: u8 = 7;

    // D2
    pub const NAME: usize = 2; // 10 ascii bytes, D2[2..12]
    pub const GENERAL: usize = 20; // 4 stations * 6 bytes (mix,duration,interval)
}

const IDOSE_FUNCTION_NAMES: [&str; 8] = [
    "mix",
    "ph_up",
    "ph_down",
    "station1",
    "station2",
    "station3",
    "station4",
    "drain",
];

fn decode_station_general(buf: &[u8], base: usize) -> Vec<StationGeneral> {
    (0..4)
        .map(|i| {
            let off = base + i * 6;
            StationGeneral {
                mix: u16_le_decode(buf[off], buf[off + 1]),
                duration: u16_le_decode(buf[off + 2], buf[off + 3]),
                interval: u16_le_decode(buf[off + 4], buf[off + 5]),
            }
        })
        .collect()
}

fn encode_station_general(buf: &mut [u8], base: usize, stations: &[StationGeneral]) {
    for (i, s) in stations.iter().enumerate().take(4) {
        let off = base + i * 6;
        let (mix_l, mix_h) = u16_le_encode(s.mix);
        let (dur_l, dur_h) = u16_le_encode(s.duration);
        let (int_l, int_h) = u16_le_encode(s.interval);
        buf[off] = mix_l;
        buf[off + 1] = mix_h;
        buf[off + 2] = dur_l;
        buf[off + 3] = dur_h;
        buf[off + 4] = int_l;
        buf[off + 5] = int_h;
    }
}

/// Decodes a full IntelliDose D-frame triple into a shadow document.
pub fn decode_idose(d0: &[u8], d1: &[u8], d2: &[u8], serial: &str, ts: i64) -> Result<IDoseShadow, FrameError> {
    check_len(d0)?;
    check_len(d1)?;
    check_len(d2)?;
    use idose_offsets::*;

    let fw_raw = i16_be_decode(d0[FW_VERSION], d0[FW_VERSION + 1]);
    let firmware_version = signed_sentinel_aware_scale(fw_raw as u16, 100.0, 2);

    let ec_raw = u16_le_decode(d0[EC], d0[EC + 1]);
    let ph_raw = u16_le_decode(d0[PH], d0[PH + 1]);
    let nut_temp_raw = u16_le_decode(d0[NUT_TEMP], d0[NUT_TEMP + 1]);
    let enable_byte = d0[NUTRIENT_ENABLE];

    let nutrient = NutrientStatus {
        ec: NutrientReading { value: sentinel_aware_scale(ec_raw, 100.0, 2), enabled: bit_get(enable_byte, 7) },
        ph: NutrientReading { value: sentinel_aware_scale(ph_raw, 100.0, 2), enabled: bit_get(enable_byte, 6) },
        nut_temp: NutrientReading {
            value: sentinel_aware_scale(nut_temp_raw, 10.0, 1),
            enabled: bit_get(enable_byte, 5),
        },
    };

    let units_byte = d1[UNITS];
    let functions_byte = d1[FUNCTIONS];
    let advanced_byte = d1[ADVANCED];

    let independent = bit_get(d1[IRRIGATION_INDEPENDENT_BYTE], IRRIGATION_INDEPENDENT_BIT);
    let sequential = bit_get(d1[IRRIGATION_SEQUENTIAL_BYTE], IRRIGATION_SEQUENTIAL_BIT);
    let irrigation_mode = IrrigationMode::from_bits(independent, sequential);

    let stations_installed_raw = functions_byte & 0x07;
    let stations_installed = if stations_installed_raw == 0 { 0 } else { stations_installed_raw.max(1) };

    let status: Vec<FunctionStatus> = (0..8)
        .map(|i| {
            let b = d1[STATUS + i];
            FunctionStatus {
                name: IDOSE_FUNCTION_NAMES[i],
                installed: bit_get(b, 7),
                enabled: bit_get(b, 6),
                force_on: bit_get(b, 5),
            }
        })
        .collect();

    let set_points = decode_station_general(d1, SET_POINTS);
    let general = decode_station_general(d2, GENERAL);

    let name_bytes = &d2[NAME..NAME + 10];
    let name_end = name_bytes.iter().position(|&b| b == 0).unwrap_or(10);
    let name = String::from_utf8_lossy(&name_bytes[..name_end]).into_owned();

    Ok(IDoseShadow {
        config: ConfigIDose {
            units: ConfigUnitsIDose { date_format_usa: bit_get(units_byte, 7), temperature_f: bit_get(units_byte, 6) },
            functions: ConfigFunctionsIDose {
                irrigation_mode,
                stations_installed,
                ph_dosing_mode: bit_get(functions_byte, 4),
            },
            advanced: ConfigAdvancedIDose {
                nutrient_config: bit_get(advanced_byte, 7),
                ph_mode: bit_get(advanced_byte, 6),
            },
            general: ConfigGeneralIDose { name, firmware_version },
        },
        status: StatusIDose { nutrient, status, set_points, general },
        metrics: MetricsIDose {
            ec: sentinel_aware_scale(ec_raw, 100.0, 2),
            ph: sentinel_aware_scale(ph_raw, 100.0, 2),
            nut_temp: sentinel_aware_scale(nut_temp_raw, 10.0, 1),
        },
        device: serial.to_string(),
        timestamp: ts,
        source: "Gateway".to_string(),
        connected: true,
    })
}

/// Encodes a shadow back onto the last-seen D0/D1/D2 buffers, producing the
/// S0 and S1 write frames. `d0`/`d1`/`d2` are the session's last-seen read
/// frames; only the fields the shadow defines are overwritten.
pub fn encode_idose(
    shadow: &IDoseShadow,
    d0: &[u8],
    d1: &[u8],
    d2: &[u8],
) -> Result<([u8; FRAME_LEN], [u8; FRAME_LEN]), FrameError> {
    check_len(d0)?;
    check_len(d1)?;
    check_len(d2)?;
    use idose_offsets::*;

    let token = d0[SESSION_TOKEN];

    // S0 is built from a mutated copy of D1.
    let mut s0 = [0u8; FRAME_LEN];
    s0.copy_from_slice(d1);
    write_frame_header(&mut s0, b'S', b'0');

    s0[UNITS] = bit_set(s0[UNITS], 7, shadow.config.units.date_format_usa);
    s0[UNITS] = bit_set(s0[UNITS], 6, shadow.config.units.temperature_f);

    let mut functions_byte = (s0[FUNCTIONS] & !0x07) | (shadow.config.functions.stations_installed & 0x07);
    functions_byte = bit_set(functions_byte, 4, shadow.config.functions.ph_dosing_mode);
    s0[FUNCTIONS] = functions_byte;

    s0[ADVANCED] = bit_set(s0[ADVANCED], 7, shadow.config.advanced.nutrient_config);
    s0[ADVANCED] = bit_set(s0[ADVANCED], 6, shadow.config.advanced.ph_mode);

    let (independent, sequential) = shadow.config.functions.irrigation_mode.to_bits();
    s0[IRRIGATION_INDEPENDENT_BYTE] =
        bit_set(s0[IRRIGATION_INDEPENDENT_BYTE], IRRIGATION_INDEPENDENT_BIT, independent);
    s0[IRRIGATION_SEQUENTIAL_BYTE] = bit_set(s0[IRRIGATION_SEQUENTIAL_BYTE], IRRIGATION_SEQUENTIAL_BIT, sequential);

    for (i, f) in shadow.status.status.iter().enumerate().take(8) {
        let mut b = s0[STATUS + i];
        b = bit_set(b, 7, f.installed);
        b = bit_set(b, 6, f.enabled);
        b = bit_set(b, 5, f.force_on);
        s0[STATUS + i] = b;
    }

    encode_station_general(&mut s0, SET_POINTS, &shadow.status.set_points);

    s0[SESSION_TOKEN] = token;
    finalize_crc(&mut s0);

    // S1 is built from a mutated copy of D2 (device name + per-station
    // general records).
    let mut s1 = [0u8; FRAME_LEN];
    s1.copy_from_slice(d2);
    write_frame_header(&mut s1, b'S', b'1');

    let mut name_bytes = [0u8; 10];
    let src = shadow.config.general.name.as_bytes();
    let n = src.len().min(10);
    name_bytes[..n].copy_from_slice(&src[..n]);
    s1[NAME..NAME + 10].copy_from_slice(&name_bytes);

    encode_station_general(&mut s1, GENERAL, &shadow.status.general);

    s1[SESSION_TOKEN] = token;
    finalize_crc(&mut s1);

    Ok((s0, s1))
}

// ---------------------------------------------------------------------
// IntelliClimate
// ---------------------------------------------------------------------

mod iclimate_offsets {
    // D0
    pub const TEMPERATURE: usize = 7; // i16 be, scale x100
    pub const HUMIDITY: usize = 9; // u16 le, scale x10
    pub const CO2: usize = 11; // u16 le, scale x1
    pub const OUTSIDE_TEMPERATURE: usize = 13; // i16 be, scale x100
    pub const SESSION_TOKEN: usize = 61;

    // D1
    pub const SET_POINT: usize = 0; // 16-byte record at the top of D1, bytes 0..16
    pub const UNITS: usize = 16; // bit7 date_format_usa, bit6 temperature_f
    pub const FUNCTIONS: usize = 17; // 6 contiguous bytes, bytes 17..23
    pub const NAME: usize = 33; // 10 ascii bytes, D1[33..43]
    pub const FOG_TIMES_LOW: usize = 44; // low byte of the cross-frame fog_times field

    // D2
    pub const SWITCHING_OFFSETS: usize = 2; // 10 u16 fields, bytes 2..22
    pub const MIN_AIR_CHANGE: usize = 26; // day_secs, every_day_mins
    pub const FAIL_SAFE: usize = 30; // high, low (i16 be, x100)
    pub const FOGGING_RULE: usize = 34; // day_secs, night_secs
    pub const FOG_TIMES_HIGH: usize = 38; // high byte of fog_times, split across S1/S2

    // D3
    pub const STATUS: usize = 2; // contiguous function status bytes
}

const ICLIMATE_FUNCTION_NAMES: [&str; 10] = [
    "fan1",
    "fan2_or_air_conditioner",
    "heater",
    "co2_sensor",
    "co2_injection_or_extraction",
    "dehumidifier",
    "humidifier_or_fogger",
    "light_bank1",
    "light_bank2",
    "intruder_alarm",
];

fn light_bank_mode_to_string(mode: u8) -> String {
    match mode {
        0 => "none",
        1 => "1",
        2 => "2",
        3 => "alt",
        4 => "both",
        _ => "none",
    }
    .to_string()
}

fn light_bank_string_to_mode(s: &str) -> u8 {
    match s {
        "1" => 1,
        "2" => 2,
        "alt" => 3,
        "both" => 4,
        _ => 0,
    }
}

fn decode_set_point(buf: &[u8], base: usize) -> SetPointIClimate {
    SetPointIClimate {
        light_bank: light_bank_mode_to_string(buf[base]),
        light_on: u16_le_decode(buf[base + 1], buf[base + 2]),
        light_duration: u16_le_decode(buf[base + 3], buf[base + 4]),
        day_temp: sentinel_aware_scale(u16_le_decode(buf[base + 5], buf[base + 6]), 100.0, 2),
        night_drop_deg: sentinel_aware_scale(u16_le_decode(buf[base + 7], buf[base + 8]), 100.0, 2),
        rh_day: buf[base + 9] as u16,
        rh_max: buf[base + 10] as u16,
        rh_night: buf[base + 11] as u16,
        co2: u16_le_decode(buf[base + 12], buf[base + 13]),
    }
}

fn encode_set_point(buf: &mut [u8], base: usize, sp: &SetPointIClimate) {
    buf[base] = light_bank_string_to_mode(&sp.light_bank);
    let (lo, hi) = u16_le_encode(sp.light_on);
    buf[base + 1] = lo;
    buf[base + 2] = hi;
    let (lo, hi) = u16_le_encode(sp.light_duration);
    buf[base + 3] = lo;
    buf[base + 4] = hi;
    let (lo, hi) = u16_le_encode(scale_to_raw(sp.day_temp, 100.0));
    buf[base + 5] = lo;
    buf[base + 6] = hi;
    let (lo, hi) = u16_le_encode(scale_to_raw(sp.night_drop_deg, 100.0));
    buf[base + 7] = lo;
    buf[base + 8] = hi;
    buf[base + 9] = sp.rh_day as u8;
    buf[base + 10] = sp.rh_max as u8;
    buf[base + 11] = sp.rh_night as u8;
    let (lo, hi) = u16_le_encode(sp.co2);
    buf[base + 12] = lo;
    buf[base + 13] = hi;
}

/// Decodes the installed-function bits, resolving the Fan2/AirConditioner,
/// Humidifier/Fogger and CO2-injection/CO2-extraction dispatch pairs. The
/// installation byte must be read before the status byte is interpreted.
fn decode_functions(bytes: &[u8]) -> ConfigFunctionsIClimate {
    let b2 = bytes[0];
    let b3 = bytes[1];
    let b4 = bytes[2];
    let b5 = bytes[3];

    let fan1 = bit_get(b2, 7);
    let fan2_installed = bit_get(b2, 6);
    let air_conditioner = bit_get(b2, 5);
    let heater = bit_get(b2, 4);

    let co2_sensor = bit_get(b3, 7);
    let co2_sensor_range = bit_get(b3, 6);
    let co2_injection_installed = bit_get(b3, 5);
    let co2_extraction = bit_get(b3, 4);

    let dehumidifier = bit_get(b4, 7);
    let humidifier_installed = bit_get(b4, 6);
    let pulsed_fogger = bit_get(b4, 5);
    let light_bank1 = bit_get(b4, 4);
    let lights_air_colored = bit_get(b4, 3);
    let light_bank2 = bit_get(b4, 2);
    let lamp_over_temp_shutdown_sensors = bit_get(b4, 1);
    let outside_temp_sensor = bit_get(b4, 0);

    let second_enviro_sensor = bit_get(b5, 7);
    let intruder_alarm = bit_get(b5, 6);
    let dehumidify_by_percentage = bit_get(b5, 5);
    let mute_buzzer = bit_get(b5, 4);

    ConfigFunctionsIClimate {
        fan1,
        fan2: fan2_installed,
        air_conditioner,
        heater,
        co2_sensor,
        co2_sensor_range,
        co2_injection: co2_injection_installed,
        co2_extraction,
        dehumidifier,
        humidifier: humidifier_installed,
        pulsed_fogger,
        light_bank1,
        lights_air_colored,
        light_bank2,
        lamp_over_temp_shutdown_sensors,
        outside_temp_sensor,
        second_enviro_sensor,
        intruder_alarm,
        dehumidify_by_percentage,
        mute_buzzer,
    }
}

/// Overwrites only the bits `decode_functions` reads out of `original`
/// (the last-seen D1 functions bytes), leaving every reserved bit — and
/// bytes 4/5 of the region, which `decode_functions` never touches at all —
/// exactly as they were.
fn encode_functions(original: &[u8], f: &ConfigFunctionsIClimate) -> [u8; 6] {
    let mut bytes = [0u8; 6];
    bytes.copy_from_slice(original);

    let mut b2 = bytes[0];
    b2 = bit_set(b2, 7, f.fan1);
    b2 = bit_set(b2, 6, f.fan2);
    b2 = bit_set(b2, 5, f.air_conditioner);
    b2 = bit_set(b2, 4, f.heater);
    bytes[0] = b2;

    let mut b3 = bytes[1];
    b3 = bit_set(b3, 7, f.co2_sensor);
    b3 = bit_set(b3, 6, f.co2_sensor_range);
    b3 = bit_set(b3, 5, f.co2_injection);
    b3 = bit_set(b3, 4, f.co2_extraction);
    bytes[1] = b3;

    let mut b4 = bytes[2];
    b4 = bit_set(b4, 7, f.dehumidifier);
    b4 = bit_set(b4, 6, f.humidifier);
    b4 = bit_set(b4, 5, f.pulsed_fogger);
    b4 = bit_set(b4, 4, f.light_bank1);
    b4 = bit_set(b4, 3, f.lights_air_colored);
    b4 = bit_set(b4, 2, f.light_bank2);
    b4 = bit_set(b4, 1, f.lamp_over_temp_shutdown_sensors);
    b4 = bit_set(b4, 0, f.outside_temp_sensor);
    bytes[2] = b4;

    let mut b5 = bytes[3];
    b5 = bit_set(b5, 7, f.second_enviro_sensor);
    b5 = bit_set(b5, 6, f.intruder_alarm);
    b5 = bit_set(b5, 5, f.dehumidify_by_percentage);
    b5 = bit_set(b5, 4, f.mute_buzzer);
    bytes[3] = b5;

    bytes
}

/// Decodes the per-function active/enabled/force-on status byte array,
/// dispatching Fan2/AirConditioner, Humidifier/Fogger and CO2-injection/
/// CO2-extraction slots according to the installation bits already decoded
/// into `functions`.
fn decode_status(bytes: &[u8], functions: &ConfigFunctionsIClimate) -> Vec<FunctionStatus> {
    let raw = |i: usize, name: &'static str| {
        let b = bytes[i];
        (name, bit_get(b, 7), bit_get(b, 6), bit_get(b, 5))
    };

    let mut out = Vec::with_capacity(ICLIMATE_FUNCTION_NAMES.len());
    let fan2_or_ac = if functions.fan2 {
        raw(1, "fan2")
    } else {
        let (_, e, f, i) = raw(1, "air_conditioner");
        ("air_conditioner", e, f, i)
    };
    let humid_or_fog = if functions.humidifier {
        raw(6, "humidifier")
    } else {
        let (_, e, f, i) = raw(6, "pulsed_fogger");
        ("pulsed_fogger", e, f, i)
    };
    let co2_pair = if functions.co2_injection {
        raw(4, "co2_injection")
    } else {
        let (_, e, f, _installed) = raw(4, "co2_extraction");
        // Enabled bit borrowed from the CO2-extraction function per the
        // installation-bit dispatch rule.
        ("co2_extraction", e, f, functions.co2_extraction)
    };

    for (idx, name) in ICLIMATE_FUNCTION_NAMES.iter().enumerate() {
        let (resolved_name, installed, enabled, force_on) = match *name {
            "fan2_or_air_conditioner" => fan2_or_ac,
            "humidifier_or_fogger" => humid_or_fog,
            "co2_injection_or_extraction" => co2_pair,
            _ => raw(idx, name),
        };
        out.push(FunctionStatus { name: resolved_name, installed, enabled, force_on });
    }
    out
}

/// Overwrites only bits 7/6/5 (installed/enabled/force_on) of each status
/// byte in `original` (the last-seen D3 status bytes), leaving bits 0-4 of
/// every byte untouched.
fn encode_status(original: &[u8], status: &[FunctionStatus], functions: &ConfigFunctionsIClimate) -> [u8; 10] {
    let mut bytes = [0u8; 10];
    bytes.copy_from_slice(original);
    for (idx, name) in ICLIMATE_FUNCTION_NAMES.iter().enumerate() {
        let entry = match *name {
            "fan2_or_air_conditioner" => status.iter().find(|s| s.name == "fan2" || s.name == "air_conditioner"),
            "humidifier_or_fogger" => status.iter().find(|s| s.name == "humidifier" || s.name == "pulsed_fogger"),
            "co2_injection_or_extraction" => {
                status.iter().find(|s| s.name == "co2_injection" || s.name == "co2_extraction")
            }
            other => status.iter().find(|s| s.name == other),
        };
        if let Some(s) = entry {
            let mut b = bytes[idx];
            b = bit_set(b, 7, s.installed);
            b = bit_set(b, 6, s.enabled);
            b = bit_set(b, 5, s.force_on);
            bytes[idx] = b;
        }
    }
    let _ = functions;
    bytes
}

/// Decodes a full IntelliClimate D-frame quadruple into a shadow document.
pub fn decode_iclimate(
    d0: &[u8],
    d1: &[u8],
    d2: &[u8],
    d3: &[u8],
    serial: &str,
    ts: i64,
) -> Result<IClimateShadow, FrameError> {
    check_len(d0)?;
    check_len(d1)?;
    check_len(d2)?;
    check_len(d3)?;
    use iclimate_offsets::*;

    let temperature = signed_sentinel_aware_scale(
        i16_be_decode(d0[TEMPERATURE], d0[TEMPERATURE + 1]) as u16,
        100.0,
        2,
    );
    let humidity = sentinel_aware_scale(u16_le_decode(d0[HUMIDITY], d0[HUMIDITY + 1]), 10.0, 1);
    let co2 = sentinel_aware_scale(u16_le_decode(d0[CO2], d0[CO2 + 1]), 1.0, 0);
    let outside_temperature = signed_sentinel_aware_scale(
        i16_be_decode(d0[OUTSIDE_TEMPERATURE], d0[OUTSIDE_TEMPERATURE + 1]) as u16,
        100.0,
        2,
    );

    let functions = decode_functions(&d1[FUNCTIONS..FUNCTIONS + 6]);
    let status = decode_status(&d3[STATUS..STATUS + 10], &functions);
    let set_points = vec![decode_set_point(d1, SET_POINT)];

    let name_bytes = &d1[NAME..NAME + 10];
    let name_end = name_bytes.iter().position(|&b| b == 0).unwrap_or(10);
    let name = String::from_utf8_lossy(&name_bytes[..name_end]).into_owned();

    let switching_offsets = SwitchingOffsets {
        heater: sentinel_aware_scale(u16_le_decode(d2[SWITCHING_OFFSETS], d2[SWITCHING_OFFSETS + 1]), 100.0, 2),
        fans: sentinel_aware_scale(u16_le_decode(d2[SWITCHING_OFFSETS + 2], d2[SWITCHING_OFFSETS + 3]), 100.0, 2),
        air_conditioner: sentinel_aware_scale(
            u16_le_decode(d2[SWITCHING_OFFSETS + 4], d2[SWITCHING_OFFSETS + 5]),
            100.0,
            2,
        ),
        humidifier_on: u16_le_decode(d2[SWITCHING_OFFSETS + 6], d2[SWITCHING_OFFSETS + 7]) as f64,
        humidifier_off: u16_le_decode(d2[SWITCHING_OFFSETS + 8], d2[SWITCHING_OFFSETS + 9]) as f64,
        dehumidifier_on: u16_le_decode(d2[SWITCHING_OFFSETS + 10], d2[SWITCHING_OFFSETS + 11]) as f64,
        dehumidifier_off: u16_le_decode(d2[SWITCHING_OFFSETS + 12], d2[SWITCHING_OFFSETS + 13]) as f64,
        co2_on: u16_le_decode(d2[SWITCHING_OFFSETS + 14], d2[SWITCHING_OFFSETS + 15]) as f64,
        co2_off: u16_le_decode(d2[SWITCHING_OFFSETS + 16], d2[SWITCHING_OFFSETS + 17]) as f64,
        // Hardcoded regardless of frame content; the controller exposes no
        // such field.
        pulsed_fogger_on: SwitchingOffsets::PULSED_FOGGER_ON,
        pulsed_fogger_off: SwitchingOffsets::PULSED_FOGGER_OFF,
        heating_offset: sentinel_aware_scale(
            u16_le_decode(d2[SWITCHING_OFFSETS + 18], d2[SWITCHING_OFFSETS + 19]),
            100.0,
            2,
        ),
    };

    let minimum_air_change = MinimumAirChangeRule {
        day_secs: u16_le_decode(d2[MIN_AIR_CHANGE], d2[MIN_AIR_CHANGE + 1]),
        every_day_mins: u16_le_decode(d2[MIN_AIR_CHANGE + 2], d2[MIN_AIR_CHANGE + 3]),
    };

    let fail_safe_high_temp =
        signed_sentinel_aware_scale(i16_be_decode(d2[FAIL_SAFE], d2[FAIL_SAFE + 1]) as u16, 100.0, 2);
    let fail_safe_low_temp =
        signed_sentinel_aware_scale(i16_be_decode(d2[FAIL_SAFE + 2], d2[FAIL_SAFE + 3]) as u16, 100.0, 2);

    // fog_times is split across frames: the low byte lives in S1/D1 byte 36,
    // the high byte in S2/D2 byte 35. This asymmetry is preserved exactly.
    let fog_times_low = d1[FOG_TIMES_LOW];
    let fog_times_high = d2[FOG_TIMES_HIGH];
    let fog_times = u16_le_decode(fog_times_low, fog_times_high);

    Ok(IClimateShadow {
        config: ConfigIClimate {
            units: ConfigUnitsIClimate { date_format_usa: bit_get(d1[UNITS], 7), temperature_f: bit_get(d1[UNITS], 6) },
            functions,
            advanced: ConfigAdvancedIClimate {
                switching_offsets,
                rules: Rules {
                    minimum_air_change,
                    fail_safe_high_temp,
                    fail_safe_low_temp,
                    fogging_day_secs: u16_le_decode(d2[FOGGING_RULE], d2[FOGGING_RULE + 1]),
                    fogging_night_secs: u16_le_decode(d2[FOGGING_RULE + 2], d2[FOGGING_RULE + 3]),
                    fog_times,
                },
            },
            general: ConfigGeneralIClimate { name },
        },
        status: StatusIClimate { set_points, status },
        metrics: MetricsIClimate { temperature, humidity, co2, outside_temperature },
        device: serial.to_string(),
        timestamp: ts,
        source: "Gateway".to_string(),
        connected: true,
    })
}

/// Encodes a shadow back onto the last-seen D0/D1/D2/D3 buffers, producing
/// the S0, S1 and S2 write frames.
pub fn encode_iclimate(
    shadow: &IClimateShadow,
    d0: &[u8],
    d1: &[u8],
    d2: &[u8],
    d3: &[u8],
) -> Result<([u8; FRAME_LEN], [u8; FRAME_LEN], [u8; FRAME_LEN]), FrameError> {
    check_len(d0)?;
    check_len(d1)?;
    check_len(d2)?;
    check_len(d3)?;
    use iclimate_offsets::*;

    let token = d0[SESSION_TOKEN];

    let mut s0 = [0u8; FRAME_LEN];
    s0.copy_from_slice(d3);
    write_frame_header(&mut s0, b'S', b'0');
    let status_bytes = encode_status(&s0[STATUS..STATUS + 10], &shadow.status.status, &shadow.config.functions);
    s0[STATUS..STATUS + 10].copy_from_slice(&status_bytes);
    s0[SESSION_TOKEN] = token;
    finalize_crc(&mut s0);

    let mut s1 = [0u8; FRAME_LEN];
    s1.copy_from_slice(d1);
    write_frame_header(&mut s1, b'S', b'1');
    s1[UNITS] = bit_set(bit_set(s1[UNITS], 7, shadow.config.units.date_format_usa), 6, shadow.config.units.temperature_f);
    let function_bytes = encode_functions(&s1[FUNCTIONS..FUNCTIONS + 6], &shadow.config.functions);
    s1[FUNCTIONS..FUNCTIONS + 6].copy_from_slice(&function_bytes);
    if let Some(sp) = shadow.status.set_points.first() {
        encode_set_point(&mut s1, SET_POINT, sp);
    }
    let mut name_bytes = [0u8; 10];
    let src = shadow.config.general.name.as_bytes();
    let n = src.len().min(10);
    name_bytes[..n].copy_from_slice(&src[..n]);
    s1[NAME..NAME + 10].copy_from_slice(&name_bytes);
    let (fog_low, _) = u16_le_encode(shadow.config.advanced.rules.fog_times);
    s1[FOG_TIMES_LOW] = fog_low;
    s1[SESSION_TOKEN] = token;
    finalize_crc(&mut s1);

    let mut s2 = [0u8; FRAME_LEN];
    s2.copy_from_slice(d2);
    write_frame_header(&mut s2, b'S', b'2');
    let so = &shadow.config.advanced.switching_offsets;
    let (lo, hi) = u16_le_encode(scale_to_raw(so.heater, 100.0));
    s2[SWITCHING_OFFSETS] = lo;
    s2[SWITCHING_OFFSETS + 1] = hi;
    let (lo, hi) = u16_le_encode(scale_to_raw(so.fans, 100.0));
    s2[SWITCHING_OFFSETS + 2] = lo;
    s2[SWITCHING_OFFSETS + 3] = hi;
    let (lo, hi) = u16_le_encode(scale_to_raw(so.air_conditioner, 100.0));
    s2[SWITCHING_OFFSETS + 4] = lo;
    s2[SWITCHING_OFFSETS + 5] = hi;
    let (lo, hi) = u16_le_encode(so.humidifier_on as u16);
    s2[SWITCHING_OFFSETS + 6] = lo;
    s2[SWITCHING_OFFSETS + 7] = hi;
    let (lo, hi) = u16_le_encode(so.humidifier_off as u16);
    s2[SWITCHING_OFFSETS + 8] = lo;
    s2[SWITCHING_OFFSETS + 9] = hi;
    let (lo, hi) = u16_le_encode(so.dehumidifier_on as u16);
    s2[SWITCHING_OFFSETS + 10] = lo;
    s2[SWITCHING_OFFSETS + 11] = hi;
    let (lo, hi) = u16_le_encode(so.dehumidifier_off as u16);
    s2[SWITCHING_OFFSETS + 12] = lo;
    s2[SWITCHING_OFFSETS + 13] = hi;
    let (lo, hi) = u16_le_encode(so.co2_on as u16);
    s2[SWITCHING_OFFSETS + 14] = lo;
    s2[SWITCHING_OFFSETS + 15] = hi;
    let (lo, hi) = u16_le_encode(so.co2_off as u16);
    s2[SWITCHING_OFFSETS + 16] = lo;
    s2[SWITCHING_OFFSETS + 17] = hi;
    let (lo, hi) = u16_le_encode(scale_to_raw(so.heating_offset, 100.0));
    s2[SWITCHING_OFFSETS + 18] = lo;
    s2[SWITCHING_OFFSETS + 19] = hi;

    let rules = &shadow.config.advanced.rules;
    let (lo, hi) = u16_le_encode(rules.minimum_air_change.day_secs);
    s2[MIN_AIR_CHANGE] = lo;
    s2[MIN_AIR_CHANGE + 1] = hi;
    let (lo, hi) = u16_le_encode(rules.minimum_air_change.every_day_mins);
    s2[MIN_AIR_CHANGE + 2] = lo;
    s2[MIN_AIR_CHANGE + 3] = hi;

    let (lo, hi) = u16_le_encode(scale_to_raw(rules.fail_safe_high_temp, 100.0));
    s2[FAIL_SAFE] = lo;
    s2[FAIL_SAFE + 1] = hi;
    let (lo, hi) = u16_le_encode(scale_to_raw(rules.fail_safe_low_temp, 100.0));
    s2[FAIL_SAFE + 2] = lo;
    s2[FAIL_SAFE + 3] = hi;

    let (lo, hi) = u16_le_encode(rules.fogging_day_secs);
    s2[FOGGING_RULE] = lo;
    s2[FOGGING_RULE + 1] = hi;
    let (lo, hi) = u16_le_encode(rules.fogging_night_secs);
    s2[FOGGING_RULE + 2] = lo;
    s2[FOGGING_RULE + 3] = hi;

    // High byte of the cross-frame fog_times field.
    let (_, fog_high) = u16_le_encode(rules.fog_times);
    s2[FOG_TIMES_HIGH] = fog_high;

    s2[SESSION_TOKEN] = token;
    finalize_crc(&mut s2);

    Ok((s0, s1, s2))
}
