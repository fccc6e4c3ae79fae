//! Parameter schemas shared by noise models and denoising algorithms
//!
//! A schema is a static slice of [`ParamSpec`]s. Validation checks that the
//! supplied keys match the schema exactly and that every value lies in its
//! documented domain; canonicalization normalizes numeric types (`9.0` for
//! an integer parameter becomes `9`) so semantically equal configs compare
//! equal and produce the same canonical name.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Integer value
    Int(i64),
    /// Floating point value
    Float(f64),
    /// Choice from a fixed vocabulary
    Text(String),
}

impl ParamValue {
    /// Numeric view of the value, if it is numeric.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Text(_) => None,
        }
    }

    /// Text view of the value, if it is a choice.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// Ordered parameter mapping (name → value).
pub type ParamMap = BTreeMap<String, ParamValue>;

/// Build a [`ParamMap`] from `(name, value)` pairs.
#[must_use]
pub fn param_map<I, K, V>(pairs: I) -> ParamMap
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<ParamValue>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Value domain of a parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamKind {
    /// Integer in `min..=max`, optionally restricted to odd values
    Int {
        /// Smallest allowed value
        min: i64,
        /// Largest allowed value
        max: i64,
        /// Only odd values allowed (kernel sizes)
        odd: bool,
    },
    /// Finite float in `[min, max]`, or `(min, max]` when `min_exclusive`
    Float {
        /// Lower bound
        min: f64,
        /// Upper bound (inclusive)
        max: f64,
        /// Whether the lower bound itself is excluded
        min_exclusive: bool,
    },
    /// One of a fixed set of lowercase alphanumeric words
    Choice(&'static [&'static str]),
}

/// How a value is spelled inside a canonical name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueFormat {
    /// Integral values as plain digits (`10`)
    Integer,
    /// Whole hundredths as zero-padded digits of `value * 100` (`0.01` → `001`)
    Hundredths,
    /// Shortest round-trip decimal with `p` for the point (`0.039` → `0p039`)
    Decimal,
    /// The choice word itself
    Word,
}

/// Schema entry for one parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    /// Parameter name as it appears in configs
    pub name: &'static str,
    /// Prefix used in canonical names
    pub abbrev: &'static str,
    /// Value domain
    pub kind: ParamKind,
    /// Canonical-name spelling
    pub format: ValueFormat,
}

/// Why a parameter map does not conform to a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// Offending parameter name
    pub parameter: String,
    /// Human-readable reason
    pub reason: String,
}

impl SchemaViolation {
    fn new(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }
}

impl ParamSpec {
    /// Check a value against this spec and return its canonical form.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaViolation`] if the value has the wrong type or lies
    /// outside the domain.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn canonicalize(&self, value: &ParamValue) -> Result<ParamValue, SchemaViolation> {
        match self.kind {
            ParamKind::Int { min, max, odd } => {
                let v = match value {
                    ParamValue::Int(v) => *v,
                    ParamValue::Float(f) if f.is_finite() && f.fract() == 0.0 => *f as i64,
                    other => {
                        return Err(SchemaViolation::new(
                            self.name,
                            format!("expected an integer, found {other}"),
                        ))
                    }
                };
                if v < min || v > max {
                    return Err(SchemaViolation::new(
                        self.name,
                        format!("{v} outside [{min}, {max}]"),
                    ));
                }
                if odd && v % 2 == 0 {
                    return Err(SchemaViolation::new(self.name, format!("{v} must be odd")));
                }
                Ok(ParamValue::Int(v))
            }
            ParamKind::Float {
                min,
                max,
                min_exclusive,
            } => {
                let v = value.as_f64().ok_or_else(|| {
                    SchemaViolation::new(self.name, format!("expected a number, found {value}"))
                })?;
                if !v.is_finite() {
                    return Err(SchemaViolation::new(self.name, format!("{v} is not finite")));
                }
                let below = if min_exclusive { v <= min } else { v < min };
                if below || v > max {
                    let open = if min_exclusive { '(' } else { '[' };
                    return Err(SchemaViolation::new(
                        self.name,
                        format!("{v} outside {open}{min}, {max}]"),
                    ));
                }
                // -0.0 and 0.0 must spell the same name
                Ok(ParamValue::Float(if v == 0.0 { 0.0 } else { v }))
            }
            ParamKind::Choice(choices) => {
                let s = value.as_str().ok_or_else(|| {
                    SchemaViolation::new(self.name, format!("expected one of {choices:?}"))
                })?;
                let lower = s.to_ascii_lowercase();
                if choices.contains(&lower.as_str()) {
                    Ok(ParamValue::Text(lower))
                } else {
                    Err(SchemaViolation::new(
                        self.name,
                        format!("'{s}' is not one of {choices:?}"),
                    ))
                }
            }
        }
    }

    /// Spell a canonical value for a canonical name.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn format_value(&self, value: &ParamValue) -> String {
        match (self.format, value) {
            (_, ParamValue::Text(s)) => s.clone(),
            (_, ParamValue::Int(v)) => {
                if self.format == ValueFormat::Hundredths {
                    format!("{:03}", v * 100)
                } else {
                    v.to_string()
                }
            }
            (ValueFormat::Integer, ParamValue::Float(v)) if v.fract() == 0.0 => {
                format!("{}", *v as i64)
            }
            (ValueFormat::Hundredths, ParamValue::Float(v)) => match whole_hundredths(*v) {
                Some(h) => format!("{h:03}"),
                None => decimal(*v),
            },
            (_, ParamValue::Float(v)) => decimal(*v),
        }
    }

    /// Inverse of [`ParamSpec::format_value`]; the result still needs
    /// [`ParamSpec::canonicalize`].
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn parse_value(&self, text: &str) -> Option<ParamValue> {
        if text.is_empty() {
            return None;
        }
        if let ParamKind::Choice(_) = self.kind {
            return Some(ParamValue::Text(text.to_string()));
        }
        if text.contains('p') {
            return text.replacen('p', ".", 1).parse::<f64>().ok().map(ParamValue::Float);
        }
        if !text.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let n: i64 = text.parse().ok()?;
        match (self.format, self.kind) {
            (ValueFormat::Hundredths, _) => Some(ParamValue::Float(n as f64 / 100.0)),
            (_, ParamKind::Int { .. }) => Some(ParamValue::Int(n)),
            _ => Some(ParamValue::Float(n as f64)),
        }
    }
}

/// `Some(n)` when `v` is exactly `n / 100` after round-tripping through text.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn whole_hundredths(v: f64) -> Option<i64> {
    if v < 0.0 {
        return None;
    }
    let n = (v * 100.0).round();
    if n > 1e15 {
        return None;
    }
    let n = n as i64;
    ((n as f64) / 100.0 == v).then_some(n)
}

fn decimal(v: f64) -> String {
    let s = format!("{v}");
    if s.contains('.') {
        s.replacen('.', "p", 1)
    } else {
        format!("{s}p0")
    }
}

/// Validate `params` against `schema` and return the canonical map.
///
/// # Errors
///
/// Returns the first [`SchemaViolation`]: missing key, unknown key, or a value
/// outside its domain.
pub fn conform(schema: &[ParamSpec], params: &ParamMap) -> Result<ParamMap, SchemaViolation> {
    if let Some(unknown) = params
        .keys()
        .find(|k| !schema.iter().any(|spec| spec.name == k.as_str()))
    {
        return Err(SchemaViolation::new(unknown.as_str(), "not part of the schema"));
    }
    schema
        .iter()
        .map(|spec| {
            let value = params
                .get(spec.name)
                .ok_or_else(|| SchemaViolation::new(spec.name, "missing required parameter"))?;
            Ok((spec.name.to_string(), spec.canonicalize(value)?))
        })
        .collect()
}

/// Canonical `key=value` string in schema order (used as an RNG discriminator).
#[must_use]
pub fn canonical_param_string(schema: &[ParamSpec], params: &ParamMap) -> String {
    schema
        .iter()
        .filter_map(|spec| params.get(spec.name).map(|v| format!("{}={v}", spec.name)))
        .collect::<Vec<_>>()
        .join(",")
}
