use crate::registers::{Bounds, Register, RegisterWidth};

/// A pump setting at a known register with fixed bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct Preset {
    pub name: &'static str,
    pub width: RegisterWidth,
    pub page: u8,
    pub address: u8,
    pub min: i32,
    pub max: i32,
    pub step: i32,
    pub offset: i32,
    pub description: &'static str,
}

impl Preset {
    pub fn by_name(name: &str) -> Option<&'static Preset> {
        PRESETS.iter().find(|p| p.name == name)
    }

    pub fn all() -> &'static [Preset] {
        PRESETS
    }

    pub fn names() -> impl Iterator<Item = &'static str> {
        PRESETS.iter().map(|p| p.name)
    }

    pub const fn register(&self) -> Register {
        Register {
            page: self.page,
            address: self.address,
        }
    }

    pub fn bounds(&self) -> Bounds {
        Bounds {
            min: f64::from(self.min),
            max: f64::from(self.max),
            step: f64::from(self.step),
        }
    }
}

macro_rules! for_each_preset {
    ($m:ident) => {
        $m! {
            "freeze_temp": Byte, page = 10, address = 0x06, min = 32, max = 72, step = 1, offset = 32,
                "Freeze protection trigger temperature in °F (raw 0..40)";
            "freeze_speed": Word, page = 10, address = 0x07, min = 600, max = 3450, step = 25, offset = 0,
                "Pump speed in RPM while freeze protection is active";
        }
    };
}

macro_rules! make_presets {
    ($($name: literal: $width: ident, page = $page: literal, address = $address: literal,
       min = $min: literal, max = $max: literal, step = $step: literal, offset = $offset: literal,
       $description: literal;)+) => {
        static PRESETS: &[Preset] = &const {
            let presets = [$(Preset {
                name: $name,
                width: RegisterWidth::$width,
                page: $page,
                address: $address,
                min: $min,
                max: $max,
                step: $step,
                offset: $offset,
                description: $description,
            }),+];
            let mut index = 0;
            while index < presets.len() {
                let p = &presets[index];
                if p.min > p.max || p.step <= 0 {
                    panic!("preset bounds are malformed");
                }
                if p.min - p.offset < 0 || p.max - p.offset > p.width.max_raw() as i32 {
                    panic!("preset raw range does not fit the register");
                }
                if matches!(p.width, RegisterWidth::Word) && p.offset != 0 {
                    panic!("two byte presets cannot have an offset");
                }
                index += 1;
            }
            presets
        };
    };
}

for_each_preset!(make_presets);
