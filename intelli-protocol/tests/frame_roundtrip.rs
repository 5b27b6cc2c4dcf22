use intelli_protocol::{
    decode_idose, decode_iclimate, encode_idose, encode_iclimate, frame::build_read_request,
};
use intelli_protocol::bits::{crc16_ccitt, u16_le_decode};

fn sample_d0_idose() -> [u8; 64] {
    let mut f = build_read_request(b'0');
    f[7] = 0x90; // fw version low
    f[8] = 0x01; // fw version high -> i16_be = 0x0190 = 400 -> /100 = 4.00
    f[9] = 0x10; // ec low
    f[10] = 0x27; // ec high -> 0x2710 = 10000 -> /100 = 100.00
    f[11] = 0x58; // ph
    f[12] = 0x02; // -> 0x0258 = 600 -> /100 = 6.00
    f[13] = 0xC4; // nut_temp
    f[14] = 0x09; // -> 0x09C4 = 2500 -> /10 = 250.0
    f[15] = 0b0000_0111; // enable bits (ec, ph, nut_temp all enabled)
    f[61] = 0x42; // session token
    recompute_crc(&mut f);
    f
}

fn sample_d1_idose() -> [u8; 64] {
    let mut f = build_read_request(b'1');
    f[0] = 0b0000_0011; // date_format_usa + temperature_f
    f[1] = 0b0000_1010; // stations=2, ph_dosing_mode set
    f[2] = 0b0000_0011; // nutrient_config + ph_mode
    for i in 0..8u8 {
        f[6 + i as usize] = 0b0000_0111; // installed+enabled+force_on
    }
    f[58] = 0b0000_0001; // independent
    f[59] = 0b0000_0001; // sequential -> sequential mode
    recompute_crc(&mut f);
    f
}

fn sample_d2_idose() -> [u8; 64] {
    let mut f = build_read_request(b'2');
    let name = b"MyDoser\0\0\0";
    f[2..12].copy_from_slice(name);
    recompute_crc(&mut f);
    f
}

fn recompute_crc(f: &mut [u8; 64]) {
    let crc = crc16_ccitt(&f[0..62]);
    f[62] = crc as u8;
    f[63] = (crc >> 8) as u8;
}

#[test]
fn idose_round_trip_preserves_decoded_fields() {
    let d0 = sample_d0_idose();
    let d1 = sample_d1_idose();
    let d2 = sample_d2_idose();

    let shadow = decode_idose(&d0, &d1, &d2, "SN123", 1_700_000_000).unwrap();
    assert_eq!(shadow.config.general.name, "MyDoser");
    assert_eq!(shadow.metrics.ec, 100.0);

    let (s0, s1) = encode_idose(&shadow, &d0, &d1, &d2).unwrap();

    // S-frames must carry the session token from D0 and a closing CRC.
    assert_eq!(s0[61], d0[61]);
    assert_eq!(s1[61], d0[61]);
    assert_crc_closes(&s0);
    assert_crc_closes(&s1);

    // Re-decoding the mutated D1/D2 copies (standing in for the controller's
    // next read response) must reproduce every field the encoder writes.
    let reshadow = decode_idose(&d0, &s0, &s1, "SN123", 1_700_000_000).unwrap();
    assert_eq!(reshadow.config.general.name, shadow.config.general.name);
    assert_eq!(reshadow.config.functions.irrigation_mode, shadow.config.functions.irrigation_mode);
    assert_eq!(reshadow.status.status, shadow.status.status);
}

#[test]
fn idose_sentinel_survives_round_trip() {
    let mut d0 = sample_d0_idose();
    d0[9] = 0x00;
    d0[10] = 0x80; // 0x8000 = 32768 sentinel
    recompute_crc(&mut d0);
    let d1 = sample_d1_idose();
    let d2 = sample_d2_idose();

    let shadow = decode_idose(&d0, &d1, &d2, "SN123", 0).unwrap();
    assert_eq!(shadow.metrics.ec, 32768.0);

    let (s0, s1) = encode_idose(&shadow, &d0, &d1, &d2).unwrap();
    let reshadow = decode_idose(&d0, &s0, &s1, "SN123", 0).unwrap();
    assert_eq!(reshadow.metrics.ec, 32768.0);
}

fn assert_crc_closes(frame: &[u8; 64]) {
    let crc = crc16_ccitt(&frame[0..62]);
    assert_eq!(u16_le_decode(frame[62], frame[63]), crc);
}

fn sample_d0_iclimate() -> [u8; 64] {
    let mut f = build_read_request(b'0');
    f[61] = 0x7;
    recompute_crc(&mut f);
    f
}

fn sample_d1_iclimate() -> [u8; 64] {
    let mut f = build_read_request(b'1');
    // set point record (bytes 0..16): mode=both, light_on=1201, duration=184,
    // day_temp=21.50, night_drop=3.10, rh_day=60, rh_max=70, rh_night=50, co2=800.
    f[0] = 4;
    let light_on = 1201u16.to_le_bytes();
    f[1] = light_on[0];
    f[2] = light_on[1];
    let duration = 184u16.to_le_bytes();
    f[3] = duration[0];
    f[4] = duration[1];
    let day_temp_raw = 2150u16.to_le_bytes();
    f[5] = day_temp_raw[0];
    f[6] = day_temp_raw[1];
    let night_raw = 310u16.to_le_bytes();
    f[7] = night_raw[0];
    f[8] = night_raw[1];
    f[9] = 60;
    f[10] = 70;
    f[11] = 50;
    let co2_raw = 800u16.to_le_bytes();
    f[12] = co2_raw[0];
    f[13] = co2_raw[1];

    // Fan2 NOT installed -> AirConditioner dispatch (functions byte at 17).
    f[17] = 0b0000_0000; // fan1=0,fan2=0,air_con=0,heater=0
    f[33..43].copy_from_slice(b"ClimateOne");
    recompute_crc(&mut f);
    f
}

fn sample_d2_iclimate() -> [u8; 64] {
    let mut f = build_read_request(b'2');
    recompute_crc(&mut f);
    f
}

fn sample_d3_iclimate() -> [u8; 64] {
    let mut f = build_read_request(b'3');
    // fan2/aircon status slot (not installed -> air_conditioner): installed,
    // enabled and force_on all set.
    f[3] = 0b0000_0111;
    recompute_crc(&mut f);
    f
}

#[test]
fn iclimate_fan2_dispatches_to_air_conditioner_when_not_installed() {
    let d0 = sample_d0_iclimate();
    let d1 = sample_d1_iclimate();
    let d2 = sample_d2_iclimate();
    let d3 = sample_d3_iclimate();

    let shadow = decode_iclimate(&d0, &d1, &d2, &d3, "SNC1", 0).unwrap();
    assert!(!shadow.config.functions.fan2);
    let ac = shadow.status.status.iter().find(|s| s.name == "air_conditioner").unwrap();
    assert!(ac.installed);
    assert!(ac.enabled);
    assert!(ac.force_on);

    let (s0, s1, s2) = encode_iclimate(&shadow, &d0, &d1, &d2, &d3).unwrap();
    assert_crc_closes(&s0);
    assert_crc_closes(&s1);
    assert_crc_closes(&s2);

    let reshadow = decode_iclimate(&d0, &s1, &s2, &s0, "SNC1", 0).unwrap();
    assert_eq!(reshadow.config.general.name, "ClimateOne");
    let ac2 = reshadow.status.status.iter().find(|s| s.name == "air_conditioner").unwrap();
    assert_eq!(ac2, ac);
}

#[test]
fn iclimate_set_point_round_trips() {
    let d0 = sample_d0_iclimate();
    let d1 = sample_d1_iclimate();
    let d2 = sample_d2_iclimate();
    let d3 = sample_d3_iclimate();

    let shadow = decode_iclimate(&d0, &d1, &d2, &d3, "SNC1", 0).unwrap();
    let sp = &shadow.status.set_points[0];
    assert_eq!(sp.light_bank, "both");
    assert_eq!(sp.light_on, 1201);
    assert_eq!(sp.light_duration, 184);
    assert_eq!(sp.day_temp, 21.50);
    assert_eq!(sp.night_drop_deg, 3.10);
}

#[test]
fn iclimate_negative_fail_safe_temperature_round_trips() {
    let d0 = sample_d0_iclimate();
    let d1 = sample_d1_iclimate();
    let mut d2 = sample_d2_iclimate();
    d3_for_negative_fail_safe(&mut d2);
    let d3 = sample_d3_iclimate();

    let shadow = decode_iclimate(&d0, &d1, &d2, &d3, "SNC1", 0).unwrap();
    assert_eq!(shadow.config.advanced.rules.fail_safe_low_temp, -5.00);

    let (s0, s1, s2) = encode_iclimate(&shadow, &d0, &d1, &d2, &d3).unwrap();
    assert_crc_closes(&s2);

    let reshadow = decode_iclimate(&d0, &s1, &s2, &s0, "SNC1", 0).unwrap();
    assert_eq!(reshadow.config.advanced.rules.fail_safe_low_temp, -5.00);
}

/// Sets D2's fail-safe-low-temp field (offset 32..34, i16 be, scale x100) to
/// -5.00 degrees, encoded as the two's-complement bit pattern for -500.
fn d3_for_negative_fail_safe(d2: &mut [u8; 64]) {
    let raw = (-500i16) as u16;
    let bytes = raw.to_le_bytes();
    d2[32] = bytes[0];
    d2[33] = bytes[1];
    recompute_crc(d2);
}

#[test]
fn shadow_enum_serializes_untagged_as_the_inner_document() {
    use intelli_protocol::Shadow;

    let d0 = sample_d0_idose();
    let d1 = sample_d1_idose();
    let d2 = sample_d2_idose();
    let shadow = Shadow::IDose(decode_idose(&d0, &d1, &d2, "SN123", 1_700_000_000).unwrap());

    let value: serde_json::Value = serde_json::to_value(&shadow).unwrap();
    // Untagged: no "IDose"/"IClimate" wrapper key, just the document's own fields.
    assert_eq!(value["device"], "SN123");
    assert_eq!(value["source"], "Gateway");
    assert!(value.get("IDose").is_none());
}
