//! Gate angle parameters.
//!
//! Gates are built from [`ParameterExpression`]s, the user-facing expression
//! tree. Before a gate matrix is formed the expression is lowered to an
//! [`Angle`], an affine combination `c + Σ wᵢ·symbolᵢ`. Affine angles are what
//! the symbolic matrix entries in [`crate::expr`] are built from.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::f64::consts::PI;
use std::fmt;

use crate::error::{IrError, IrResult};

/// A symbolic or concrete parameter expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterExpression {
    /// A constant numeric value.
    Constant(f64),
    /// A symbolic parameter.
    Symbol(String),
    /// The constant π.
    Pi,
    /// Negation.
    Neg(Box<ParameterExpression>),
    /// Addition.
    Add(Box<ParameterExpression>, Box<ParameterExpression>),
    /// Subtraction.
    Sub(Box<ParameterExpression>, Box<ParameterExpression>),
    /// Multiplication.
    Mul(Box<ParameterExpression>, Box<ParameterExpression>),
    /// Division.
    Div(Box<ParameterExpression>, Box<ParameterExpression>),
}

impl ParameterExpression {
    /// Create a constant parameter.
    pub fn constant(value: f64) -> Self {
        ParameterExpression::Constant(value)
    }

    /// Create a symbolic parameter.
    pub fn symbol(name: impl Into<String>) -> Self {
        ParameterExpression::Symbol(name.into())
    }

    /// Create a π constant.
    pub fn pi() -> Self {
        ParameterExpression::Pi
    }

    /// Check if this expression contains any symbols.
    pub fn is_symbolic(&self) -> bool {
        match self {
            ParameterExpression::Symbol(_) => true,
            ParameterExpression::Constant(_) | ParameterExpression::Pi => false,
            ParameterExpression::Neg(e) => e.is_symbolic(),
            ParameterExpression::Add(a, b)
            | ParameterExpression::Sub(a, b)
            | ParameterExpression::Mul(a, b)
            | ParameterExpression::Div(a, b) => a.is_symbolic() || b.is_symbolic(),
        }
    }

    /// Try to evaluate as a concrete f64 value.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParameterExpression::Constant(v) => Some(*v),
            ParameterExpression::Symbol(_) => None,
            ParameterExpression::Pi => Some(PI),
            ParameterExpression::Neg(e) => e.as_f64().map(|v| -v),
            ParameterExpression::Add(a, b) => Some(a.as_f64()? + b.as_f64()?),
            ParameterExpression::Sub(a, b) => Some(a.as_f64()? - b.as_f64()?),
            ParameterExpression::Mul(a, b) => Some(a.as_f64()? * b.as_f64()?),
            ParameterExpression::Div(a, b) => {
                let divisor = b.as_f64()?;
                if divisor == 0.0 {
                    return None;
                }
                Some(a.as_f64()? / divisor)
            }
        }
    }

    /// Get all symbol names in this expression.
    pub fn symbols(&self) -> BTreeSet<String> {
        let mut set = BTreeSet::new();
        self.collect_symbols(&mut set);
        set
    }

    fn collect_symbols(&self, set: &mut BTreeSet<String>) {
        match self {
            ParameterExpression::Constant(_) | ParameterExpression::Pi => {}
            ParameterExpression::Symbol(name) => {
                set.insert(name.clone());
            }
            ParameterExpression::Neg(e) => e.collect_symbols(set),
            ParameterExpression::Add(a, b)
            | ParameterExpression::Sub(a, b)
            | ParameterExpression::Mul(a, b)
            | ParameterExpression::Div(a, b) => {
                a.collect_symbols(set);
                b.collect_symbols(set);
            }
        }
    }

    /// Lower the expression to an affine [`Angle`].
    ///
    /// Products are accepted when at least one side is constant, quotients
    /// when the divisor is a non-zero constant.
    pub fn to_angle(&self) -> IrResult<Angle> {
        let non_affine = || IrError::NonAffineParameter(self.to_string());
        match self {
            ParameterExpression::Constant(v) => Ok(Angle::constant(*v)),
            ParameterExpression::Pi => Ok(Angle::constant(PI)),
            ParameterExpression::Symbol(name) => Ok(Angle::symbol(name.clone())),
            ParameterExpression::Neg(e) => Ok(e.to_angle()?.scale(-1.0)),
            ParameterExpression::Add(a, b) => Ok(a.to_angle()?.add(&b.to_angle()?)),
            ParameterExpression::Sub(a, b) => Ok(a.to_angle()?.add(&b.to_angle()?.scale(-1.0))),
            ParameterExpression::Mul(a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(factor), _) => Ok(b.to_angle()?.scale(factor)),
                (None, Some(factor)) => Ok(a.to_angle()?.scale(factor)),
                (None, None) => Err(non_affine()),
            },
            ParameterExpression::Div(a, b) => match b.as_f64() {
                Some(divisor) if divisor != 0.0 => Ok(a.to_angle()?.scale(1.0 / divisor)),
                _ => Err(non_affine()),
            },
        }
    }
}

impl fmt::Display for ParameterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterExpression::Constant(v) => write!(f, "{v}"),
            ParameterExpression::Symbol(name) => write!(f, "{name}"),
            ParameterExpression::Pi => write!(f, "π"),
            ParameterExpression::Neg(e) => write!(f, "-({e})"),
            ParameterExpression::Add(a, b) => write!(f, "({a} + {b})"),
            ParameterExpression::Sub(a, b) => write!(f, "({a} - {b})"),
            ParameterExpression::Mul(a, b) => write!(f, "({a} * {b})"),
            ParameterExpression::Div(a, b) => write!(f, "({a} / {b})"),
        }
    }
}

impl From<f64> for ParameterExpression {
    fn from(value: f64) -> Self {
        ParameterExpression::Constant(value)
    }
}

impl From<i32> for ParameterExpression {
    fn from(value: i32) -> Self {
        ParameterExpression::Constant(f64::from(value))
    }
}

impl From<&str> for ParameterExpression {
    fn from(name: &str) -> Self {
        ParameterExpression::Symbol(name.to_string())
    }
}

impl std::ops::Add for ParameterExpression {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        ParameterExpression::Add(Box::new(self), Box::new(rhs))
    }
}

impl std::ops::Sub for ParameterExpression {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        ParameterExpression::Sub(Box::new(self), Box::new(rhs))
    }
}

impl std::ops::Mul for ParameterExpression {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        ParameterExpression::Mul(Box::new(self), Box::new(rhs))
    }
}

impl std::ops::Div for ParameterExpression {
    type Output = Self;

    fn div(self, rhs: Self) -> Self::Output {
        ParameterExpression::Div(Box::new(self), Box::new(rhs))
    }
}

impl std::ops::Neg for ParameterExpression {
    type Output = Self;

    fn neg(self) -> Self::Output {
        ParameterExpression::Neg(Box::new(self))
    }
}

/// An affine angle `constant + Σ weight·symbol`.
///
/// Weights are never exactly zero and `-0.0` is normalized to `0.0`, so that
/// structurally equal angles compare equal. Ordering is total (via
/// [`f64::total_cmp`]) which lets angles key ordered maps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Angle {
    constant: f64,
    terms: BTreeMap<String, f64>,
}

impl Angle {
    /// A constant angle.
    pub fn constant(value: f64) -> Self {
        Self {
            constant: value + 0.0,
            terms: BTreeMap::new(),
        }
    }

    /// The angle given by a single symbol.
    pub fn symbol(name: impl Into<String>) -> Self {
        let mut terms = BTreeMap::new();
        terms.insert(name.into(), 1.0);
        Self {
            constant: 0.0,
            terms,
        }
    }

    /// The constant part.
    pub fn constant_part(&self) -> f64 {
        self.constant
    }

    /// Symbol weights, ordered by symbol name.
    pub fn terms(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.terms.iter().map(|(name, w)| (name.as_str(), *w))
    }

    /// Whether the angle has no symbols.
    pub fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }

    /// Multiply by a scalar.
    #[must_use]
    pub fn scale(&self, factor: f64) -> Self {
        let terms = self
            .terms
            .iter()
            .map(|(name, w)| (name.clone(), w * factor))
            .filter(|(_, w)| *w != 0.0)
            .collect();
        Self {
            constant: self.constant * factor + 0.0,
            terms,
        }
    }

    /// Sum of two angles.
    #[must_use]
    pub fn add(&self, other: &Angle) -> Self {
        let mut terms = self.terms.clone();
        for (name, w) in &other.terms {
            let entry = terms.entry(name.clone()).or_insert(0.0);
            *entry += w;
        }
        terms.retain(|_, w| *w != 0.0);
        Self {
            constant: self.constant + other.constant + 0.0,
            terms,
        }
    }

    /// Evaluate with symbol values supplied by `lookup`.
    ///
    /// Returns `None` when a symbol has no value.
    pub fn evaluate<F>(&self, lookup: &F) -> Option<f64>
    where
        F: Fn(&str) -> Option<f64>,
    {
        let mut value = self.constant;
        for (name, w) in &self.terms {
            value += w * lookup(name)?;
        }
        Some(value)
    }

    /// Add the symbols of this angle to `set`.
    pub fn collect_symbols(&self, set: &mut BTreeSet<String>) {
        set.extend(self.terms.keys().cloned());
    }
}

impl PartialEq for Angle {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Angle {}

impl PartialOrd for Angle {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Angle {
    fn cmp(&self, other: &Self) -> Ordering {
        self.constant.total_cmp(&other.constant).then_with(|| {
            for ((na, wa), (nb, wb)) in self.terms.iter().zip(other.terms.iter()) {
                let ord = na.cmp(nb).then(wa.total_cmp(wb));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            self.terms.len().cmp(&other.terms.len())
        })
    }
}

impl fmt::Display for Angle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, w) in &self.terms {
            if !first {
                write!(f, " + ")?;
            }
            first = false;
            if *w == 1.0 {
                write!(f, "{name}")?;
            } else {
                write!(f, "{w}*{name}")?;
            }
        }
        if first {
            write!(f, "{}", self.constant)
        } else if self.constant != 0.0 {
            write!(f, " + {}", self.constant)
        } else {
            Ok(())
        }
    }
}
