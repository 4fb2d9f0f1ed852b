//! Validation of `number` configuration entries.
//!
//! An entry picks its behaviour through the `type` key: one of the builtin types, or the name of
//! a [`Preset`]. Validation turns the loosely typed [`NumberEntry`] into a [`NumberSpec`] whose
//! [`NumberKind`] carries only the fields that make sense for that type.

use crate::presets::Preset;
use crate::registers::{Bounds, DemandNumber, Register, RegisterNumber, RegisterWidth};
use tracing::debug;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("unknown number type `{0}` (expected one of {types}, or one of the presets: {presets})",
        types = <BuiltinType as strum::VariantNames>::VARIANTS.join(", "),
        presets = Preset::names().collect::<Vec<_>>().join(", "))]
    UnknownType(String),
    #[error("`{option}` is required for numbers of type `{kind}`")]
    MissingOption { option: &'static str, kind: String },
    #[error("`{option}` is not supported for numbers of type `{kind}`")]
    UnsupportedOption { option: &'static str, kind: String },
    #[error("`{option}` must be within {min}..={max}, got {value}")]
    OptionOutOfRange {
        option: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
    #[error("`{option}` must be a finite number")]
    NotFinite { option: &'static str },
    #[error("`min_value` ({min}) must not be greater than `max_value` ({max})")]
    InvertedBounds { min: f64, max: f64 },
    #[error("`step` must be positive, got {0}")]
    InvalidStep(f64),
    #[error("`{option}` must be a whole number, got {value}")]
    NotWhole { option: &'static str, value: f64 },
    #[error("demand range {min}..={max} must stay within 0..={limit}")]
    DemandExceedsWord { min: f64, max: f64, limit: u16 },
    #[error("range {min}..={max} with offset {offset} does not fit a {width} register")]
    BoundsExceedRegister {
        min: f64,
        max: f64,
        offset: i32,
        width: RegisterWidth,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("could not parse the number configuration")]
    Parse(#[source] serde_yaml::Error),
    #[error("number entry #{index} is invalid")]
    Entry {
        index: usize,
        #[source]
        source: ConfigError,
    },
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, strum::EnumString, strum::VariantNames, strum::IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum BuiltinType {
    Demand,
    Config,
    Config16,
}

/// A number entry as written in the configuration file.
#[derive(serde::Deserialize, Debug, Clone, Default, PartialEq)]
pub struct NumberEntry {
    pub id: Option<String>,
    pub name: Option<String>,
    pub century_vs_pump_id: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub page: Option<i64>,
    pub address: Option<i64>,
    pub offset: Option<i64>,
    pub store_to_flash: Option<bool>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub step: Option<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NumberSpec {
    pub id: Option<String>,
    pub name: Option<String>,
    pub pump_id: String,
    pub kind: NumberKind,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NumberKind {
    Demand(DemandNumber),
    Config(RegisterNumber),
    Config16(RegisterNumber),
    Preset {
        preset: &'static Preset,
        number: RegisterNumber,
    },
}

impl NumberKind {
    pub fn register_number(&self) -> Option<&RegisterNumber> {
        match self {
            Self::Demand(_) => None,
            Self::Config(number) | Self::Config16(number) | Self::Preset { number, .. } => {
                Some(number)
            }
        }
    }

    pub fn bounds(&self) -> Bounds {
        match self {
            Self::Demand(demand) => demand.bounds,
            Self::Config(number) | Self::Config16(number) | Self::Preset { number, .. } => {
                number.bounds
            }
        }
    }
}

/// The resolved meaning of an entry's `type` key.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NumberType {
    Builtin(BuiltinType),
    Preset(&'static Preset),
}

impl NumberType {
    pub fn resolve(tag: Option<&str>) -> Result<Self, ConfigError> {
        let Some(tag) = tag else {
            return Ok(Self::Builtin(BuiltinType::Demand));
        };
        if let Ok(builtin) = tag.parse::<BuiltinType>() {
            return Ok(Self::Builtin(builtin));
        }
        match Preset::by_name(tag) {
            Some(preset) => Ok(Self::Preset(preset)),
            None => Err(ConfigError::UnknownType(tag.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Builtin(builtin) => (*builtin).into(),
            Self::Preset(preset) => preset.name,
        }
    }
}

fn byte_option(option: &'static str, value: i64) -> Result<u8, ConfigError> {
    u8::try_from(value).map_err(|_| ConfigError::OptionOutOfRange {
        option,
        value,
        min: 0,
        max: u8::MAX.into(),
    })
}

/// Registers hold whole raw units, so every bound has to be a whole number too.
fn whole_option(option: &'static str, value: Option<f64>) -> Result<Option<f64>, ConfigError> {
    match value {
        Some(v) if !v.is_finite() => Err(ConfigError::NotFinite { option }),
        Some(v) if v.fract() != 0.0 => Err(ConfigError::NotWhole { option, value: v }),
        v => Ok(v),
    }
}

impl NumberEntry {
    pub fn validate(&self) -> Result<NumberSpec, ConfigError> {
        let number_type = NumberType::resolve(self.kind.as_deref())?;
        let kind = match number_type {
            NumberType::Builtin(BuiltinType::Demand) => {
                self.reject_register_options(number_type)?;
                let bounds = self.bounds(Bounds::DEMAND)?;
                let limit = DemandNumber::MAX_DISPLAY;
                if bounds.min < 0.0 || bounds.max > f64::from(limit) {
                    return Err(ConfigError::DemandExceedsWord {
                        min: bounds.min,
                        max: bounds.max,
                        limit,
                    });
                }
                NumberKind::Demand(DemandNumber { bounds })
            }
            NumberType::Builtin(BuiltinType::Config) => {
                let number = self.register_number(number_type, RegisterWidth::Byte)?;
                NumberKind::Config(number)
            }
            NumberType::Builtin(BuiltinType::Config16) => {
                if self.offset.is_some() {
                    return Err(self.unsupported("offset", number_type));
                }
                let number = self.register_number(number_type, RegisterWidth::Word)?;
                NumberKind::Config16(number)
            }
            NumberType::Preset(preset) => {
                for (option, present) in [
                    ("page", self.page.is_some()),
                    ("address", self.address.is_some()),
                    ("offset", self.offset.is_some()),
                    ("min_value", self.min_value.is_some()),
                    ("max_value", self.max_value.is_some()),
                    ("step", self.step.is_some()),
                ] {
                    if present {
                        return Err(self.unsupported(option, number_type));
                    }
                }
                debug!(preset = preset.name, register = %preset.register(), "resolved number preset");
                NumberKind::Preset {
                    preset,
                    number: RegisterNumber {
                        register: preset.register(),
                        width: preset.width,
                        offset: preset.offset,
                        store_to_flash: self.store_to_flash.unwrap_or(true),
                        bounds: preset.bounds(),
                    },
                }
            }
        };
        Ok(NumberSpec {
            id: self.id.clone(),
            name: self.name.clone(),
            pump_id: self.century_vs_pump_id.clone(),
            kind,
        })
    }

    fn unsupported(&self, option: &'static str, number_type: NumberType) -> ConfigError {
        ConfigError::UnsupportedOption {
            option,
            kind: number_type.name().to_string(),
        }
    }

    fn reject_register_options(&self, number_type: NumberType) -> Result<(), ConfigError> {
        for (option, present) in [
            ("page", self.page.is_some()),
            ("address", self.address.is_some()),
            ("offset", self.offset.is_some()),
            ("store_to_flash", self.store_to_flash.is_some()),
        ] {
            if present {
                return Err(self.unsupported(option, number_type));
            }
        }
        Ok(())
    }

    fn required_byte(
        &self,
        option: &'static str,
        value: Option<i64>,
        number_type: NumberType,
    ) -> Result<u8, ConfigError> {
        let value = value.ok_or_else(|| ConfigError::MissingOption {
            option,
            kind: number_type.name().to_string(),
        })?;
        byte_option(option, value)
    }

    fn register_number(
        &self,
        number_type: NumberType,
        width: RegisterWidth,
    ) -> Result<RegisterNumber, ConfigError> {
        let page = self.required_byte("page", self.page, number_type)?;
        let address = self.required_byte("address", self.address, number_type)?;
        let offset = match self.offset {
            None => 0,
            Some(value) => i32::try_from(value).map_err(|_| ConfigError::OptionOutOfRange {
                option: "offset",
                value,
                min: i32::MIN.into(),
                max: i32::MAX.into(),
            })?,
        };
        let defaults = match width {
            RegisterWidth::Byte => Bounds::CONFIG,
            RegisterWidth::Word => Bounds::CONFIG16,
        };
        let bounds = self.bounds(defaults)?;
        let raw_min = bounds.min - f64::from(offset);
        let raw_max = bounds.max - f64::from(offset);
        if raw_min < 0.0 || raw_max > f64::from(width.max_raw()) {
            return Err(ConfigError::BoundsExceedRegister {
                min: bounds.min,
                max: bounds.max,
                offset,
                width,
            });
        }
        Ok(RegisterNumber {
            register: Register { page, address },
            width,
            offset,
            store_to_flash: self.store_to_flash.unwrap_or(true),
            bounds,
        })
    }

    fn bounds(&self, defaults: Bounds) -> Result<Bounds, ConfigError> {
        let min = whole_option("min_value", self.min_value)?.unwrap_or(defaults.min);
        let max = whole_option("max_value", self.max_value)?.unwrap_or(defaults.max);
        let step = whole_option("step", self.step)?.unwrap_or(defaults.step);
        if min > max {
            return Err(ConfigError::InvertedBounds { min, max });
        }
        if step <= 0.0 {
            return Err(ConfigError::InvalidStep(step));
        }
        Ok(Bounds { min, max, step })
    }
}

pub fn parse_entries(yaml: &str) -> Result<Vec<NumberEntry>, Error> {
    serde_yaml::from_str(yaml).map_err(Error::Parse)
}

/// Validate every entry, stopping at the first invalid one.
pub fn validate_entries(entries: &[NumberEntry]) -> Result<Vec<NumberSpec>, Error> {
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| entry.validate().map_err(|source| Error::Entry { index, source }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(yaml: &str) -> NumberEntry {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn config_defaults() {
        let spec = entry(
            "century_vs_pump_id: pump\n\
             type: config\n\
             page: 10\n\
             address: 6\n",
        )
        .validate()
        .unwrap();
        let NumberKind::Config(number) = spec.kind else {
            panic!("expected a config number, got {:?}", spec.kind);
        };
        assert_eq!(number.register, Register { page: 10, address: 0x06 });
        assert_eq!(number.offset, 0);
        assert!(number.store_to_flash);
        assert_eq!(number.bounds, Bounds::CONFIG);
        assert_eq!(spec.pump_id, "pump");
    }

    #[test]
    fn demand_is_the_default_type() {
        let spec = entry("century_vs_pump_id: pump\nname: Speed\n").validate().unwrap();
        assert_eq!(spec.kind, NumberKind::Demand(DemandNumber::default()));
        assert_eq!(spec.name.as_deref(), Some("Speed"));
    }

    #[test]
    fn demand_bounds_can_be_narrowed() {
        let spec = entry(
            "century_vs_pump_id: pump\n\
             type: demand\n\
             min_value: 1000\n\
             step: 100\n",
        )
        .validate()
        .unwrap();
        assert_eq!(spec.kind.bounds(), Bounds { min: 1000.0, max: 3450.0, step: 100.0 });
    }

    #[test]
    fn demand_rejects_register_options() {
        let err = entry("century_vs_pump_id: pump\npage: 1\n").validate().unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnsupportedOption { option: "page", kind: "demand".into() }
        );
    }

    #[test]
    fn config_requires_page_and_address() {
        let err = entry("century_vs_pump_id: pump\ntype: config\naddress: 6\n")
            .validate()
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingOption { option: "page", kind: "config".into() });
        let err = entry("century_vs_pump_id: pump\ntype: config16\npage: 6\n")
            .validate()
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingOption { option: "address", kind: "config16".into() }
        );
    }

    #[test]
    fn page_must_fit_a_byte() {
        let err = entry("century_vs_pump_id: pump\ntype: config\npage: 256\naddress: 0\n")
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::OptionOutOfRange { option: "page", value: 256, .. }));
    }

    #[test]
    fn config16_has_no_offset() {
        let err = entry(
            "century_vs_pump_id: pump\ntype: config16\npage: 1\naddress: 2\noffset: 3\n",
        )
        .validate()
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedOption { option: "offset", .. }));
    }

    #[test]
    fn config_bounds_must_fit_the_register() {
        let err = entry(
            "century_vs_pump_id: pump\n\
             type: config\n\
             page: 1\n\
             address: 2\n\
             offset: 32\n",
        )
        .validate()
        .unwrap_err();
        assert!(matches!(err, ConfigError::BoundsExceedRegister { offset: 32, .. }));

        let spec = entry(
            "century_vs_pump_id: pump\n\
             type: config\n\
             page: 1\n\
             address: 2\n\
             offset: 32\n\
             min_value: 32\n\
             max_value: 72\n",
        )
        .validate()
        .unwrap();
        assert_eq!(spec.kind.register_number().map(|n| n.offset), Some(32));
    }

    #[test]
    fn inverted_bounds_and_bad_step() {
        let err = entry(
            "century_vs_pump_id: pump\ntype: config\npage: 1\naddress: 2\nmin_value: 9\nmax_value: 3\n",
        )
        .validate()
        .unwrap_err();
        assert_eq!(err, ConfigError::InvertedBounds { min: 9.0, max: 3.0 });
        let err = entry("century_vs_pump_id: pump\nstep: 0\n").validate().unwrap_err();
        assert_eq!(err, ConfigError::InvalidStep(0.0));
    }

    #[test]
    fn fractional_bounds_are_rejected() {
        let err = entry(
            "century_vs_pump_id: pump\ntype: config\npage: 1\naddress: 2\nstep: 0.5\n",
        )
        .validate()
        .unwrap_err();
        assert_eq!(err, ConfigError::NotWhole { option: "step", value: 0.5 });
        let err = entry("century_vs_pump_id: pump\nmin_value: 600.5\n").validate().unwrap_err();
        assert_eq!(err, ConfigError::NotWhole { option: "min_value", value: 600.5 });
    }

    #[test]
    fn whole_step_grid_survives_a_write() {
        let spec = entry(
            "century_vs_pump_id: pump\ntype: config\npage: 1\naddress: 2\nstep: 5\n",
        )
        .validate()
        .unwrap();
        let number = spec.kind.register_number().unwrap();
        let write = number.encode(10.0).unwrap();
        assert_eq!(number.decode(&write.payload()), Some(10.0));
    }

    #[test]
    fn demand_bounds_must_fit_the_demand_word() {
        let err = entry("century_vs_pump_id: pump\nmin_value: -100\n").validate().unwrap_err();
        assert!(matches!(err, ConfigError::DemandExceedsWord { limit: 16383, .. }));
        let err = entry("century_vs_pump_id: pump\nmax_value: 20000\n").validate().unwrap_err();
        assert!(matches!(err, ConfigError::DemandExceedsWord { .. }));
        let spec = entry("century_vs_pump_id: pump\nmax_value: 16383\n").validate().unwrap();
        let NumberKind::Demand(demand) = spec.kind else {
            panic!("expected a demand number, got {:?}", spec.kind);
        };
        assert_eq!(demand.encode(16383.0), Ok(65532));
    }

    #[test]
    fn preset_fixes_the_register() {
        let spec = entry(
            "century_vs_pump_id: pump\ntype: freeze_temp\nstore_to_flash: false\n",
        )
        .validate()
        .unwrap();
        let NumberKind::Preset { preset, number } = spec.kind else {
            panic!("expected a preset, got {:?}", spec.kind);
        };
        assert_eq!(preset.name, "freeze_temp");
        assert_eq!(number.register, Register { page: 10, address: 0x06 });
        assert_eq!(number.offset, 32);
        assert!(!number.store_to_flash);

        let err = entry("century_vs_pump_id: pump\ntype: freeze_speed\npage: 3\n")
            .validate()
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnsupportedOption { option: "page", kind: "freeze_speed".into() }
        );
    }

    #[test]
    fn unknown_type_lists_alternatives() {
        let err = entry("century_vs_pump_id: pump\ntype: prime_speed\n").validate().unwrap_err();
        assert_eq!(err, ConfigError::UnknownType("prime_speed".into()));
        let message = err.to_string();
        assert!(message.contains("demand, config, config16"), "{message}");
        assert!(message.contains("freeze_temp"), "{message}");
    }

    #[test]
    fn first_invalid_entry_is_reported() {
        let entries = parse_entries(
            "- century_vs_pump_id: pump\n\
             - century_vs_pump_id: pump\n  type: config\n\
             - century_vs_pump_id: pump\n  type: bogus\n",
        )
        .unwrap();
        assert_eq!(entries.len(), 3);
        let err = validate_entries(&entries).unwrap_err();
        assert!(matches!(err, Error::Entry { index: 1, source: ConfigError::MissingOption { .. } }));
    }

    #[test]
    fn host_schema_keys_are_ignored() {
        let entries = parse_entries(
            "- century_vs_pump_id: pump\n  type: freeze_speed\n  icon: mdi:snowflake\n  mode: box\n",
        )
        .unwrap();
        assert!(validate_entries(&entries).is_ok());
    }

    #[test]
    fn missing_pump_id_is_a_parse_error() {
        assert!(matches!(parse_entries("- type: demand\n"), Err(Error::Parse(_))));
    }
}
