//! Renaissance Florentine measures and their SI equivalents.

use serde::{Deserialize, Serialize};

/// Florentine braccio (arm's length) in metres.
pub const BRACCIO_M: f64 = 0.5836;
/// Soldo, one twentieth of a braccio, in metres.
pub const SOLDO_M: f64 = BRACCIO_M / 20.0;
/// Florentine libbra (pound) in kilograms.
pub const LIBBRA_KG: f64 = 0.3395;
/// Oncia, one twelfth of a libbra, in kilograms.
pub const ONCIA_KG: f64 = LIBBRA_KG / 12.0;

/// Standard gravity (m/s^2).
pub const GRAVITY: f64 = 9.81;
/// Sea-level air density (kg/m^3).
pub const AIR_DENSITY: f64 = 1.225;
/// Scale height of the exponential atmosphere (m).
pub const SCALE_HEIGHT_M: f64 = 8500.0;

/// A historical measure used in the codices.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RenaissanceUnit {
    Braccio,
    Soldo,
    Libbra,
    Oncia,
}

impl RenaissanceUnit {
    /// Multiplier converting one unit to SI.
    pub fn si_factor(self) -> f64 {
        match self {
            Self::Braccio => BRACCIO_M,
            Self::Soldo => SOLDO_M,
            Self::Libbra => LIBBRA_KG,
            Self::Oncia => ONCIA_KG,
        }
    }

    pub fn si_unit(self) -> &'static str {
        match self {
            Self::Braccio | Self::Soldo => "m",
            Self::Libbra | Self::Oncia => "kg",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Braccio => "braccia",
            Self::Soldo => "soldi",
            Self::Libbra => "libbre",
            Self::Oncia => "once",
        }
    }
}

/// One recorded conversion from a historical measure to SI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnitConversion {
    /// Quantity being converted (e.g. "rotor diameter").
    pub quantity: String,
    pub historical_value: f64,
    pub unit: RenaissanceUnit,
    pub si_value: f64,
    pub si_unit: String,
}

impl UnitConversion {
    pub fn new(quantity: impl Into<String>, historical_value: f64, unit: RenaissanceUnit) -> Self {
        Self {
            quantity: quantity.into(),
            historical_value,
            unit,
            si_value: historical_value * unit.si_factor(),
            si_unit: unit.si_unit().to_string(),
        }
    }
}

/// Air density at altitude using an isothermal exponential atmosphere.
pub fn air_density_at(altitude_m: f64) -> f64 {
    AIR_DENSITY * (-altitude_m.max(0.0) / SCALE_HEIGHT_M).exp()
}
