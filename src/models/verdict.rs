use garde::Validate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Proteins / fats / carbohydrates triple.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct Macronutrients {
    #[garde(range(min = 0.0))]
    pub proteins: f64,

    #[garde(range(min = 0.0))]
    pub fats: f64,

    #[garde(range(min = 0.0))]
    pub carbohydrates: f64,
}

/// A single compliance criterion and whether the product meets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Requirement {
    #[garde(skip)]
    pub verdict: bool,

    #[garde(length(min = 1))]
    pub criterion: String,
}

/// Decoded compliance check for one label image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Verdict {
    #[garde(skip)]
    pub verdict: bool,

    #[garde(length(min = 1, max = 200))]
    pub category: String,

    #[garde(dive)]
    pub g_per_100g: Macronutrients,

    #[garde(dive)]
    pub percent_of_daily_norm: Macronutrients,

    #[garde(dive)]
    pub requirements: Vec<Requirement>,
}

impl Verdict {
    /// Decode the textual verdict encoding. The JSON object is located
    /// inside the text, so a stray prefix or suffix around it is tolerated.
    pub fn decode_str(encoded: &str) -> Result<Self, DecodeError> {
        let start = encoded.find('{').ok_or(DecodeError::NoObject)?;
        let end = encoded.rfind('}').ok_or(DecodeError::NoObject)?;
        if end < start {
            return Err(DecodeError::NoObject);
        }
        let verdict: Verdict = serde_json::from_str(&encoded[start..=end])?;
        verdict.validate()?;
        Ok(verdict)
    }

    /// Decode a result field as sent by the server: either the textual
    /// encoding or an already-embedded JSON object.
    pub fn decode(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::String(encoded) => Self::decode_str(encoded),
            Value::Object(_) => {
                let verdict = Verdict::deserialize(value)?;
                verdict.validate()?;
                Ok(verdict)
            }
            Value::Null => Err(DecodeError::Missing),
            _ => Err(DecodeError::NoObject),
        }
    }

    pub fn failed_requirements(&self) -> impl Iterator<Item = &Requirement> {
        self.requirements.iter().filter(|r| !r.verdict)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} (category {})",
            if self.verdict { "PASS" } else { "FAIL" },
            self.category
        )?;
        writeln!(
            f,
            "  per 100 g:   proteins {:.1} g, fats {:.1} g, carbohydrates {:.1} g",
            self.g_per_100g.proteins, self.g_per_100g.fats, self.g_per_100g.carbohydrates
        )?;
        writeln!(
            f,
            "  daily norm:  proteins {:.0}%, fats {:.0}%, carbohydrates {:.0}%",
            self.percent_of_daily_norm.proteins,
            self.percent_of_daily_norm.fats,
            self.percent_of_daily_norm.carbohydrates
        )?;
        for requirement in &self.requirements {
            writeln!(
                f,
                "  [{}] {}",
                if requirement.verdict { "x" } else { " " },
                requirement.criterion
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("result is missing")]
    Missing,

    #[error("result does not contain a JSON object")]
    NoObject,

    #[error("malformed verdict: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid verdict: {0}")]
    Invalid(#[from] garde::Report),
}
