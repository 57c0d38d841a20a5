//! SIXAXIS input report parsing.
//!
//! All functions are pure and allocation-free.

#![deny(static_mut_refs)]

/// Byte offsets within the raw input report.
mod offsets {
    pub const REPORT_TYPE: usize = 0;
    pub const BUTTONS_LO: usize = 2;
    pub const BUTTONS_HI: usize = 3;
    pub const PS: usize = 4;
    pub const LEFT_STICK_X: usize = 6;
    pub const LEFT_STICK_Y: usize = 7;
    pub const RIGHT_STICK_X: usize = 8;
    pub const RIGHT_STICK_Y: usize = 9;
    pub const PRESSURE_DPAD: usize = 14;
    pub const PRESSURE_SHOULDER: usize = 18;
    pub const PRESSURE_FACE: usize = 22;
}

/// Minimum report length carrying the button bytes and both sticks.
pub const MIN_REPORT_LEN: usize = 10;

/// Digital button states from bytes 2–3 of the input report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Buttons {
    pub select: bool,
    /// Left stick click (L3).
    pub left_stick: bool,
    /// Right stick click (R3).
    pub right_stick: bool,
    pub start: bool,
    pub up: bool,
    pub right: bool,
    pub down: bool,
    pub left: bool,
    pub l2: bool,
    pub r2: bool,
    pub l1: bool,
    pub r1: bool,
    pub triangle: bool,
    pub circle: bool,
    pub cross: bool,
    pub square: bool,
}

/// One analog stick position (0–255 per axis, 128 ≈ centered).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stick {
    pub x: u8,
    pub y: u8,
}

/// Pressure-sensitive direction pad axes (0–255 each).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DpadPressure {
    pub up: u8,
    pub right: u8,
    pub down: u8,
    pub left: u8,
}

/// Pressure-sensitive shoulder buttons (0–255 each).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShoulderPressure {
    pub r1: u8,
    pub r2: u8,
    pub l1: u8,
    pub l2: u8,
}

/// Pressure-sensitive face buttons (0–255 each).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FacePressure {
    pub triangle: u8,
    pub circle: u8,
    pub cross: u8,
    pub square: u8,
}

/// Decoded SIXAXIS input report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SixaxisReport {
    pub report_type: u8,
    pub buttons: Buttons,
    /// PS/power button.
    pub ps: bool,
    pub left_stick: Stick,
    pub right_stick: Stick,
    pub dpad_pressure: DpadPressure,
    pub shoulder_pressure: ShoulderPressure,
    pub face_pressure: FacePressure,
}

/// Parse a raw SIXAXIS input report.
///
/// Returns `None` if `data` is too short to carry the stick bytes. Pressure
/// bytes past the end of a short buffer decode as 0, so the 17-byte buffer
/// returned by the operational-mode handshake is decodable.
pub fn parse_input_report(data: &[u8]) -> Option<SixaxisReport> {
    if data.len() < MIN_REPORT_LEN {
        return None;
    }

    let at = |idx: usize| data.get(idx).copied().unwrap_or(0);
    let bit = |byte: u8, n: u8| byte & (1 << n) != 0;

    let lo = data[offsets::BUTTONS_LO];
    let hi = data[offsets::BUTTONS_HI];

    Some(SixaxisReport {
        report_type: data[offsets::REPORT_TYPE],
        buttons: Buttons {
            select: bit(lo, 0),
            left_stick: bit(lo, 1),
            right_stick: bit(lo, 2),
            start: bit(lo, 3),
            up: bit(lo, 4),
            right: bit(lo, 5),
            down: bit(lo, 6),
            left: bit(lo, 7),
            l2: bit(hi, 0),
            r2: bit(hi, 1),
            l1: bit(hi, 2),
            r1: bit(hi, 3),
            triangle: bit(hi, 4),
            circle: bit(hi, 5),
            cross: bit(hi, 6),
            square: bit(hi, 7),
        },
        ps: data[offsets::PS] != 0,
        left_stick: Stick {
            x: data[offsets::LEFT_STICK_X],
            y: data[offsets::LEFT_STICK_Y],
        },
        right_stick: Stick {
            x: data[offsets::RIGHT_STICK_X],
            y: data[offsets::RIGHT_STICK_Y],
        },
        dpad_pressure: DpadPressure {
            up: at(offsets::PRESSURE_DPAD),
            right: at(offsets::PRESSURE_DPAD + 1),
            down: at(offsets::PRESSURE_DPAD + 2),
            left: at(offsets::PRESSURE_DPAD + 3),
        },
        shoulder_pressure: ShoulderPressure {
            r1: at(offsets::PRESSURE_SHOULDER),
            r2: at(offsets::PRESSURE_SHOULDER + 1),
            l1: at(offsets::PRESSURE_SHOULDER + 2),
            l2: at(offsets::PRESSURE_SHOULDER + 3),
        },
        face_pressure: FacePressure {
            triangle: at(offsets::PRESSURE_FACE),
            circle: at(offsets::PRESSURE_FACE + 1),
            cross: at(offsets::PRESSURE_FACE + 2),
            square: at(offsets::PRESSURE_FACE + 3),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report_with(f: impl FnOnce(&mut [u8; 48])) -> [u8; 48] {
        let mut data = [0u8; 48];
        data[offsets::LEFT_STICK_X] = 128;
        data[offsets::LEFT_STICK_Y] = 128;
        data[offsets::RIGHT_STICK_X] = 128;
        data[offsets::RIGHT_STICK_Y] = 128;
        f(&mut data);
        data
    }

    #[test]
    fn test_parse_captured_17_byte_buffer() -> Result<(), Box<dyn std::error::Error>> {
        // Captured handshake buffer: select pressed, sticks centered.
        let mut data = [0u8; 17];
        data[2] = 0b0000_0001;
        data[6] = 128;
        data[7] = 128;
        data[8] = 128;
        data[9] = 128;

        let report = parse_input_report(&data).ok_or("parse failed")?;
        assert!(report.buttons.select);
        assert_eq!(
            report.buttons,
            Buttons {
                select: true,
                ..Buttons::default()
            }
        );
        assert!(!report.ps);
        assert_eq!(report.left_stick, Stick { x: 128, y: 128 });
        assert_eq!(report.right_stick, Stick { x: 128, y: 128 });
        assert_eq!(report.dpad_pressure, DpadPressure::default());
        assert_eq!(report.shoulder_pressure, ShoulderPressure::default());
        assert_eq!(report.face_pressure, FacePressure::default());
        Ok(())
    }

    #[test]
    fn test_parse_low_byte_buttons() -> Result<(), Box<dyn std::error::Error>> {
        let data = report_with(|d| d[2] = 0b1111_1111);
        let report = parse_input_report(&data).ok_or("parse failed")?;
        let b = report.buttons;
        assert!(b.select && b.left_stick && b.right_stick && b.start);
        assert!(b.up && b.right && b.down && b.left);
        assert!(!b.l2 && !b.triangle);
        Ok(())
    }

    #[test]
    fn test_parse_high_byte_buttons() -> Result<(), Box<dyn std::error::Error>> {
        let data = report_with(|d| d[3] = 0b1001_0001);
        let report = parse_input_report(&data).ok_or("parse failed")?;
        let b = report.buttons;
        assert!(b.l2, "bit 0 of byte 3");
        assert!(b.triangle, "bit 4 of byte 3");
        assert!(b.square, "bit 7 of byte 3");
        assert!(!b.r2 && !b.l1 && !b.r1 && !b.circle && !b.cross);
        Ok(())
    }

    #[test]
    fn test_parse_ps_button() -> Result<(), Box<dyn std::error::Error>> {
        let data = report_with(|d| d[4] = 0x01);
        let report = parse_input_report(&data).ok_or("parse failed")?;
        assert!(report.ps);
        Ok(())
    }

    #[test]
    fn test_parse_sticks() -> Result<(), Box<dyn std::error::Error>> {
        let data = report_with(|d| {
            d[6] = 0;
            d[7] = 255;
            d[8] = 37;
            d[9] = 200;
        });
        let report = parse_input_report(&data).ok_or("parse failed")?;
        assert_eq!(report.left_stick, Stick { x: 0, y: 255 });
        assert_eq!(report.right_stick, Stick { x: 37, y: 200 });
        Ok(())
    }

    #[test]
    fn test_parse_pressure_groups() -> Result<(), Box<dyn std::error::Error>> {
        let data = report_with(|d| {
            d[14] = 1;
            d[15] = 2;
            d[16] = 3;
            d[17] = 4;
            d[18] = 5;
            d[19] = 6;
            d[20] = 7;
            d[21] = 8;
            d[22] = 9;
            d[23] = 10;
            d[24] = 11;
            d[25] = 12;
        });
        let report = parse_input_report(&data).ok_or("parse failed")?;
        assert_eq!(
            report.dpad_pressure,
            DpadPressure {
                up: 1,
                right: 2,
                down: 3,
                left: 4
            }
        );
        assert_eq!(
            report.shoulder_pressure,
            ShoulderPressure {
                r1: 5,
                r2: 6,
                l1: 7,
                l2: 8
            }
        );
        assert_eq!(
            report.face_pressure,
            FacePressure {
                triangle: 9,
                circle: 10,
                cross: 11,
                square: 12
            }
        );
        Ok(())
    }

    #[test]
    fn test_parse_report_too_short() {
        assert!(parse_input_report(&[0u8; 9]).is_none());
        assert!(parse_input_report(&[]).is_none());
    }

    #[test]
    fn test_report_type_passthrough() -> Result<(), Box<dyn std::error::Error>> {
        let data = report_with(|d| d[0] = 0x01);
        let report = parse_input_report(&data).ok_or("parse failed")?;
        assert_eq!(report.report_type, 0x01);
        Ok(())
    }
}
