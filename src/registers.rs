use num_traits::ToPrimitive as _;
use tracing::{debug, trace};

/// The factor between the RPM demand and the value the pump reports or accepts for it.
pub const DEMAND_SCALE: u16 = 4;

/// Sensor page holding the current demand.
pub const DEMAND_SENSOR_PAGE: u8 = 0;
/// Sensor address holding the current demand.
pub const DEMAND_SENSOR_ADDRESS: u8 = 3;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("value {value} is outside of the allowed range {min}..={max}")]
    OutOfBounds { value: f64, min: f64, max: f64 },
    #[error("value {display} maps to raw value {raw} which does not fit a {width} register")]
    RawOutOfRange {
        display: f64,
        raw: f64,
        width: RegisterWidth,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum RegisterWidth {
    /// Single byte register, the `config` number type.
    Byte,
    /// Two byte little-endian register, the `config16` number type.
    Word,
}

impl RegisterWidth {
    pub const fn bytes(self) -> usize {
        match self {
            Self::Byte => 1,
            Self::Word => 2,
        }
    }

    pub const fn max_raw(self) -> u16 {
        match self {
            Self::Byte => u8::MAX as u16,
            Self::Word => u16::MAX,
        }
    }

    fn raw_from_f64(self, raw: f64) -> Option<RawValue> {
        match self {
            Self::Byte => raw.to_u8().map(RawValue::U8),
            Self::Word => raw.to_u16().map(RawValue::U16),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RawValue {
    U8(u8),
    U16(u16),
}

impl RawValue {
    pub fn from_bytes(width: RegisterWidth, bytes: &[u8]) -> Option<Self> {
        match width {
            RegisterWidth::Byte => bytes.first().copied().map(Self::U8),
            RegisterWidth::Word => {
                let (v, _) = bytes.split_first_chunk::<2>()?;
                Some(Self::U16(u16::from_le_bytes(*v)))
            }
        }
    }

    pub const fn width(&self) -> RegisterWidth {
        match self {
            Self::U8(_) => RegisterWidth::Byte,
            Self::U16(_) => RegisterWidth::Word,
        }
    }

    pub const fn into_inner(self) -> u16 {
        match self {
            Self::U8(v) => v as u16,
            Self::U16(v) => v,
        }
    }

    /// The value as it goes on the wire, low byte first.
    pub fn to_bytes(self) -> Vec<u8> {
        match self {
            Self::U8(v) => vec![v],
            Self::U16(v) => v.to_le_bytes().to_vec(),
        }
    }
}

impl std::fmt::Display for RawValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{}", self.into_inner()))
    }
}

/// A (page, address) location in the pump's configuration memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct Register {
    pub page: u8,
    pub address: u8,
}

impl std::fmt::Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{}/0x{:02X}", self.page, self.address))
    }
}

/// Range and granularity of a user-facing value.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl Bounds {
    pub const DEMAND: Self = Self {
        min: 600.0,
        max: 3450.0,
        step: 50.0,
    };
    pub const CONFIG: Self = Self {
        min: 0.0,
        max: u8::MAX as f64,
        step: 1.0,
    };
    pub const CONFIG16: Self = Self {
        min: 0.0,
        max: u16::MAX as f64,
        step: 1.0,
    };

    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }

    pub fn check(&self, value: f64) -> Result<(), Error> {
        if !self.contains(value) {
            return Err(Error::OutOfBounds {
                value,
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }

    /// Snap `value` to the nearest multiple of the step, without leaving `min..=max`.
    pub fn quantize(&self, value: f64) -> f64 {
        let snapped = (value / self.step).round() * self.step;
        snapped.clamp(self.min, self.max)
    }
}

/// What the firmware writes to the pump after a user changes a register number.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegisterWrite {
    pub register: Register,
    pub value: RawValue,
    /// Whether the write is followed by a request to persist the configuration to flash.
    pub store_to_flash: bool,
}

impl RegisterWrite {
    pub fn payload(&self) -> Vec<u8> {
        self.value.to_bytes()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct RegisterNumber {
    pub register: Register,
    pub width: RegisterWidth,
    pub offset: i32,
    pub store_to_flash: bool,
    pub bounds: Bounds,
}

impl RegisterNumber {
    pub fn to_display(&self, raw: RawValue) -> f64 {
        f64::from(raw.into_inner()) + f64::from(self.offset)
    }

    /// Interpret a register read-out. Returns `None` if there are fewer bytes than the width.
    pub fn decode(&self, bytes: &[u8]) -> Option<f64> {
        let raw = RawValue::from_bytes(self.width, bytes)?;
        let display = self.to_display(raw);
        let display_value = display;
        trace!(register = %self.register, %raw, display_value, "decoded register value");
        Some(display)
    }

    pub fn encode(&self, display: f64) -> Result<RegisterWrite, Error> {
        self.bounds.check(display)?;
        let quantized = self.bounds.quantize(display);
        let raw = quantized - f64::from(self.offset);
        let value = self
            .width
            .raw_from_f64(raw.round())
            .ok_or(Error::RawOutOfRange {
                display,
                raw,
                width: self.width,
            })?;
        let display_value = display;
        debug!(
            register = %self.register,
            display_value,
            quantized,
            %value,
            store_to_flash = self.store_to_flash,
            "encoded register write"
        );
        Ok(RegisterWrite {
            register: self.register,
            value,
            store_to_flash: self.store_to_flash,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct DemandNumber {
    pub bounds: Bounds,
}

impl Default for DemandNumber {
    fn default() -> Self {
        Self {
            bounds: Bounds::DEMAND,
        }
    }
}

impl DemandNumber {
    /// The demand reading is a scaled sensor value, truncated like the pump firmware does.
    pub fn to_display(&self, raw: u16) -> f64 {
        f64::from(raw / DEMAND_SCALE)
    }

    /// Bytes after the first two are ignored.
    pub fn decode(&self, bytes: &[u8]) -> Option<f64> {
        let raw = match bytes {
            [] => return None,
            [lo] => u16::from(*lo),
            [lo, hi, ..] => u16::from_le_bytes([*lo, *hi]),
        };
        Some(self.to_display(raw))
    }

    /// The largest demand whose scaled value still fits the demand word.
    pub const MAX_DISPLAY: u16 = u16::MAX / DEMAND_SCALE;

    /// The scaled demand word to send with a set-demand request.
    pub fn encode(&self, display: f64) -> Result<u16, Error> {
        self.bounds.check(display)?;
        let quantized = self.bounds.quantize(display);
        let raw = quantized.round() * f64::from(DEMAND_SCALE);
        let value = raw.to_u16().ok_or(Error::RawOutOfRange {
            display,
            raw,
            width: RegisterWidth::Word,
        })?;
        let display_value = display;
        debug!(display_value, quantized, value, "encoded demand");
        Ok(value)
    }
}
