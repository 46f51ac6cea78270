//! Schema-validated device properties.
//!
//! Every device class declares a static [`Schema`]: a list of [`PropSpec`]
//! entries naming each property, its kind and its constraints. A [`Props`]
//! record holds the values for one instance (or one model) and refuses
//! anything the schema does not allow, so devices can read their
//! parameters without re-checking them.
//!
//! ```
//! use nodal_core::props::{Bound, PropSpec, Props};
//!
//! static SCHEMA: &[PropSpec] = &[PropSpec::real("r", "Resistance", None, &[Bound::gt(0.0)])];
//!
//! let mut props = Props::new(SCHEMA);
//! props.set("r", 1e3).unwrap();
//! assert_eq!(props.number("r").unwrap(), 1e3);
//! assert!(props.set("r", -1.0).is_err());
//! ```

use std::fmt;

use crate::error::{NodalError, Result};

/// Numeric flavour of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberKind {
    Real,
    Integer,
}

impl fmt::Display for NumberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumberKind::Real => write!(f, "real"),
            NumberKind::Integer => write!(f, "integer"),
        }
    }
}

/// Comparison operator of a numeric bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Gt,
    Ge,
    Le,
}

/// One numeric range constraint, e.g. `> 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bound {
    pub cmp: Comparison,
    pub value: f64,
}

impl Bound {
    pub const fn gt(value: f64) -> Self {
        Self { cmp: Comparison::Gt, value }
    }

    pub const fn ge(value: f64) -> Self {
        Self { cmp: Comparison::Ge, value }
    }

    pub const fn le(value: f64) -> Self {
        Self { cmp: Comparison::Le, value }
    }

    /// Check a value against this bound.
    pub fn admits(&self, x: f64) -> bool {
        match self.cmp {
            Comparison::Gt => x > self.value,
            Comparison::Ge => x >= self.value,
            Comparison::Le => x <= self.value,
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.cmp {
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
            Comparison::Le => "<=",
        };
        write!(f, "{} {}", op, self.value)
    }
}

/// Kind and constraints of one property.
#[derive(Debug, Clone, Copy)]
pub enum PropKind {
    Number {
        kind: NumberKind,
        default: Option<f64>,
        bounds: &'static [Bound],
    },
    Text {
        default: Option<&'static str>,
        allowed: &'static [&'static str],
    },
}

/// Schema entry for a single property.
#[derive(Debug, Clone, Copy)]
pub struct PropSpec {
    pub name: &'static str,
    pub title: &'static str,
    pub kind: PropKind,
}

impl PropSpec {
    /// A real-valued property.
    pub const fn real(
        name: &'static str,
        title: &'static str,
        default: Option<f64>,
        bounds: &'static [Bound],
    ) -> Self {
        Self {
            name,
            title,
            kind: PropKind::Number {
                kind: NumberKind::Real,
                default,
                bounds,
            },
        }
    }

    /// An integer-valued property.
    pub const fn integer(
        name: &'static str,
        title: &'static str,
        default: Option<f64>,
        bounds: &'static [Bound],
    ) -> Self {
        Self {
            name,
            title,
            kind: PropKind::Number {
                kind: NumberKind::Integer,
                default,
                bounds,
            },
        }
    }

    /// A string property restricted to a set of values.
    pub const fn text(
        name: &'static str,
        title: &'static str,
        default: Option<&'static str>,
        allowed: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            title,
            kind: PropKind::Text { default, allowed },
        }
    }

    fn has_default(&self) -> bool {
        match self.kind {
            PropKind::Number { default, .. } => default.is_some(),
            PropKind::Text { default, .. } => default.is_some(),
        }
    }

    /// Validate a candidate value against this entry.
    pub fn check(&self, value: &PropValue) -> Result<()> {
        match (&self.kind, value) {
            (PropKind::Number { kind, bounds, .. }, PropValue::Number(x)) => {
                if !x.is_finite() {
                    return Err(NodalError::invalid_property(
                        self.name,
                        format!("expected finite {}, got {}", kind, x),
                    ));
                }
                if *kind == NumberKind::Integer && x.fract() != 0.0 {
                    return Err(NodalError::invalid_property(
                        self.name,
                        format!("expected integer, got {}", x),
                    ));
                }
                if let Some(bound) = bounds.iter().find(|b| !b.admits(*x)) {
                    return Err(NodalError::invalid_property(
                        self.name,
                        format!("expected {} {}, got {}", kind, bound, x),
                    ));
                }
                Ok(())
            }
            (PropKind::Text { allowed, .. }, PropValue::Text(s)) => {
                if allowed.iter().any(|a| a.eq_ignore_ascii_case(s)) {
                    Ok(())
                } else {
                    Err(NodalError::invalid_property(
                        self.name,
                        format!("expected one of [{}], got '{}'", allowed.join(", "), s),
                    ))
                }
            }
            (PropKind::Number { kind, .. }, PropValue::Text(s)) => Err(NodalError::invalid_property(
                self.name,
                format!("expected {}, got string '{}'", kind, s),
            )),
            (PropKind::Text { .. }, PropValue::Number(x)) => Err(NodalError::invalid_property(
                self.name,
                format!("expected string, got number {}", x),
            )),
        }
    }
}

/// Device property schema.
pub type Schema = &'static [PropSpec];

/// A property value as supplied by the circuit builder.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Number(f64),
    Text(String),
}

impl From<f64> for PropValue {
    fn from(x: f64) -> Self {
        PropValue::Number(x)
    }
}

impl From<i32> for PropValue {
    fn from(x: i32) -> Self {
        PropValue::Number(x as f64)
    }
}

impl From<&str> for PropValue {
    fn from(s: &str) -> Self {
        PropValue::Text(s.to_string())
    }
}

impl From<String> for PropValue {
    fn from(s: String) -> Self {
        PropValue::Text(s)
    }
}

/// Validated property values for one device instance or model.
#[derive(Debug, Clone)]
pub struct Props {
    schema: Schema,
    values: Vec<Option<PropValue>>,
}

impl Props {
    /// Create an empty record for the given schema.
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            values: vec![None; schema.len()],
        }
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.schema
            .iter()
            .position(|spec| spec.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| NodalError::UnknownProperty {
                property: name.to_string(),
            })
    }

    /// Set a property, validating it against the schema.
    pub fn set(&mut self, name: &str, value: impl Into<PropValue>) -> Result<()> {
        let idx = self.position(name)?;
        let value = value.into();
        let spec = self.schema[idx];
        spec.check(&value)?;
        // Store enumerated strings in their canonical spelling
        let value = match (value, spec.kind) {
            (PropValue::Text(s), PropKind::Text { allowed, .. }) => PropValue::Text(
                allowed
                    .iter()
                    .find(|a| a.eq_ignore_ascii_case(&s))
                    .map(|a| a.to_string())
                    .unwrap_or(s),
            ),
            (value, _) => value,
        };
        self.values[idx] = Some(value);
        Ok(())
    }

    /// Whether the property was explicitly set.
    pub fn is_set(&self, name: &str) -> bool {
        self.position(name)
            .map(|idx| self.values[idx].is_some())
            .unwrap_or(false)
    }

    /// Numeric value of a property, falling back to its default.
    pub fn number(&self, name: &str) -> Result<f64> {
        let idx = self.position(name)?;
        let spec = &self.schema[idx];
        match (&self.values[idx], spec.kind) {
            (Some(PropValue::Number(x)), _) => Ok(*x),
            (None, PropKind::Number { default: Some(d), .. }) => Ok(d),
            (None, PropKind::Number { default: None, .. }) => Err(NodalError::MissingProperty {
                property: spec.name.to_string(),
            }),
            _ => Err(NodalError::invalid_property(spec.name, "not a numeric property")),
        }
    }

    /// String value of a property, falling back to its default.
    pub fn text(&self, name: &str) -> Result<&str> {
        let idx = self.position(name)?;
        let spec = &self.schema[idx];
        match (&self.values[idx], spec.kind) {
            (Some(PropValue::Text(s)), _) => Ok(s.as_str()),
            (None, PropKind::Text { default: Some(d), .. }) => Ok(d),
            (None, PropKind::Text { default: None, .. }) => Err(NodalError::MissingProperty {
                property: spec.name.to_string(),
            }),
            _ => Err(NodalError::invalid_property(spec.name, "not a string property")),
        }
    }

    /// Check that every property without a default has been given a value.
    pub fn validate_complete(&self) -> Result<()> {
        for (spec, value) in self.schema.iter().zip(&self.values) {
            if value.is_none() && !spec.has_default() {
                return Err(NodalError::MissingProperty {
                    property: spec.name.to_string(),
                });
            }
        }
        Ok(())
    }
}
