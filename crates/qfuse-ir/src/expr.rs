//! Symbolic matrix entries.
//!
//! A [`Polynomial`] is a sum of monomials `c · Π atomᵢ^eᵢ` with a complex
//! coefficient `c` and atoms `cos(a)`, `sin(a)` and `exp(i·a)` over affine
//! [`Angle`]s. This is exactly the shape of entries produced by rotation gates
//! and their products, so composition never has to leave the representation.
//!
//! Simplification is purely term level:
//! - like monomials are merged by adding their coefficients, and a monomial is
//!   dropped only when the sum is exactly zero;
//! - `exp(i·a)·exp(i·b)` is folded into `exp(i·(a+b))`;
//! - an atom whose angle has no symbols is folded into the coefficient.
//!
//! No magnitude threshold is ever applied here.

use num_complex::Complex64;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::parameter::Angle;

/// A transcendental factor of a monomial.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Atom {
    /// `cos(a)`.
    Cos(Angle),
    /// `sin(a)`.
    Sin(Angle),
    /// `exp(i·a)`.
    Expi(Angle),
}

impl Atom {
    fn angle(&self) -> &Angle {
        match self {
            Atom::Cos(a) | Atom::Sin(a) | Atom::Expi(a) => a,
        }
    }

    fn value_at(&self, angle: f64) -> Complex64 {
        match self {
            Atom::Cos(_) => Complex64::new(angle.cos(), 0.0),
            Atom::Sin(_) => Complex64::new(angle.sin(), 0.0),
            Atom::Expi(_) => Complex64::from_polar(1.0, angle),
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Cos(a) => write!(f, "cos({a})"),
            Atom::Sin(a) => write!(f, "sin({a})"),
            Atom::Expi(a) => write!(f, "exp(i*({a}))"),
        }
    }
}

/// Product of atoms with positive exponents. The empty product is `1`.
type Factors = BTreeMap<Atom, u32>;

/// Sum of monomials keyed by their atom product.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Polynomial {
    terms: BTreeMap<Factors, Complex64>,
}

const ZERO: Complex64 = Complex64::new(0.0, 0.0);

impl Polynomial {
    /// The zero polynomial.
    pub fn zero() -> Self {
        Self::default()
    }

    /// A constant polynomial.
    pub fn constant(value: Complex64) -> Self {
        let mut poly = Self::zero();
        poly.accumulate(Factors::new(), value);
        poly
    }

    /// `cos(angle)`.
    pub fn cos(angle: Angle) -> Self {
        Self::atom(Atom::Cos(angle))
    }

    /// `sin(angle)`.
    pub fn sin(angle: Angle) -> Self {
        Self::atom(Atom::Sin(angle))
    }

    /// `exp(i·angle)`.
    pub fn expi(angle: Angle) -> Self {
        Self::atom(Atom::Expi(angle))
    }

    fn atom(atom: Atom) -> Self {
        let mut factors = Factors::new();
        factors.insert(atom, 1);
        let (factors, coefficient) = normalize(factors, Complex64::new(1.0, 0.0));
        let mut poly = Self::zero();
        poly.accumulate(factors, coefficient);
        poly
    }

    /// Whether the polynomial is structurally zero.
    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    /// The value if the polynomial has no symbolic atoms.
    pub fn as_constant(&self) -> Option<Complex64> {
        match self.terms.len() {
            0 => Some(ZERO),
            1 => self
                .terms
                .iter()
                .next()
                .filter(|(factors, _)| factors.is_empty())
                .map(|(_, c)| *c),
            _ => None,
        }
    }

    /// Number of monomials.
    pub fn num_terms(&self) -> usize {
        self.terms.len()
    }

    /// Sum of two polynomials.
    #[must_use]
    pub fn add(&self, other: &Polynomial) -> Polynomial {
        let mut sum = self.clone();
        for (factors, c) in &other.terms {
            sum.accumulate(factors.clone(), *c);
        }
        sum
    }

    /// Product of two polynomials.
    #[must_use]
    pub fn mul(&self, other: &Polynomial) -> Polynomial {
        let mut product = Polynomial::zero();
        for (fa, ca) in &self.terms {
            for (fb, cb) in &other.terms {
                let mut factors = fa.clone();
                for (atom, exp) in fb {
                    *factors.entry(atom.clone()).or_insert(0) += exp;
                }
                let (factors, coefficient) = normalize(factors, ca * cb);
                product.accumulate(factors, coefficient);
            }
        }
        product
    }

    /// Multiply every coefficient by `factor`.
    #[must_use]
    pub fn scale(&self, factor: Complex64) -> Polynomial {
        let mut scaled = Polynomial::zero();
        for (factors, c) in &self.terms {
            scaled.accumulate(factors.clone(), c * factor);
        }
        scaled
    }

    /// Evaluate with symbol values supplied by `lookup`.
    pub fn evaluate<F>(&self, lookup: &F) -> Option<Complex64>
    where
        F: Fn(&str) -> Option<f64>,
    {
        let mut value = ZERO;
        for (factors, c) in &self.terms {
            let mut term = *c;
            for (atom, exp) in factors {
                let base = atom.value_at(atom.angle().evaluate(lookup)?);
                term *= base.powu(*exp);
            }
            value += term;
        }
        Some(value)
    }

    /// All symbols referenced by the polynomial.
    pub fn symbols(&self) -> BTreeSet<String> {
        let mut set = BTreeSet::new();
        for factors in self.terms.keys() {
            for atom in factors.keys() {
                atom.angle().collect_symbols(&mut set);
            }
        }
        set
    }

    fn accumulate(&mut self, factors: Factors, coefficient: Complex64) {
        if coefficient == ZERO {
            return;
        }
        let slot = self.terms.entry(factors).or_insert(ZERO);
        *slot += coefficient;
        if *slot == ZERO {
            self.terms.retain(|_, c| *c != ZERO);
        }
    }
}

/// Fold constant atoms into the coefficient and merge `exp(i·…)` factors.
fn normalize(factors: Factors, mut coefficient: Complex64) -> (Factors, Complex64) {
    let mut out = Factors::new();
    let mut phase: Option<Angle> = None;
    for (atom, exp) in factors {
        if let Atom::Expi(angle) = &atom {
            let scaled = angle.scale(f64::from(exp));
            phase = Some(match phase {
                Some(acc) => acc.add(&scaled),
                None => scaled,
            });
            continue;
        }
        if atom.angle().is_constant() {
            let base = atom.value_at(atom.angle().constant_part());
            coefficient *= base.powu(exp);
        } else {
            out.insert(atom, exp);
        }
    }
    if let Some(angle) = phase {
        if angle.is_constant() {
            coefficient *= Complex64::from_polar(1.0, angle.constant_part());
        } else {
            out.insert(Atom::Expi(angle), 1);
        }
    }
    (out, coefficient)
}

impl fmt::Display for Polynomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return write!(f, "0");
        }
        for (i, (factors, c)) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, " + ")?;
            }
            write!(f, "({c})")?;
            for (atom, exp) in factors {
                if *exp == 1 {
                    write!(f, "*{atom}")?;
                } else {
                    write!(f, "*{atom}^{exp}")?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn theta() -> Angle {
        Angle::symbol("theta")
    }

    fn at(value: f64) -> impl Fn(&str) -> Option<f64> {
        move |name| (name == "theta").then_some(value)
    }

    #[test]
    fn test_constant_atoms_fold() {
        let c = Polynomial::cos(Angle::constant(0.0));
        assert_eq!(c.as_constant(), Some(Complex64::new(1.0, 0.0)));

        let s = Polynomial::sin(Angle::constant(0.0));
        assert!(s.is_zero());
    }

    #[test]
    fn test_exact_cancellation() {
        let c = Polynomial::cos(theta());
        let diff = c.add(&c.scale(Complex64::new(-1.0, 0.0)));
        assert!(diff.is_zero());
        assert_eq!(diff.as_constant(), Some(ZERO));
    }

    #[test]
    fn test_phase_merging() {
        let half = theta().scale(0.5);
        let p = Polynomial::expi(half.clone()).mul(&Polynomial::expi(half.clone()));
        assert_eq!(p, Polynomial::expi(theta()));

        let inverse = Polynomial::expi(half.scale(-1.0));
        let unit = Polynomial::expi(half).mul(&inverse);
        assert_eq!(unit.as_constant(), Some(Complex64::new(1.0, 0.0)));
    }

    #[test]
    fn test_evaluate() {
        let p = Polynomial::cos(theta())
            .mul(&Polynomial::cos(theta()))
            .add(&Polynomial::sin(theta()).mul(&Polynomial::sin(theta())));
        assert_eq!(p.num_terms(), 2);
        let v = p.evaluate(&at(0.7)).unwrap();
        assert!((v - Complex64::new(1.0, 0.0)).norm() < 1e-12);

        let e = Polynomial::expi(theta()).evaluate(&at(PI)).unwrap();
        assert!((e - Complex64::new(-1.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_missing_symbol() {
        let p = Polynomial::sin(Angle::symbol("phi"));
        assert_eq!(p.evaluate(&at(1.0)), None);
        assert!(p.symbols().contains("phi"));
    }

    #[test]
    fn test_zero_absorbs() {
        let p = Polynomial::cos(theta()).mul(&Polynomial::zero());
        assert!(p.is_zero());
    }
}
