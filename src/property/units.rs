//! Physical unit table and unit-expression conversion.
//!
//! Factors are expressed in the base system eV, Å, amu and e, built from the
//! CODATA 2014 constants. A unit expression such as `kcal/mol` or
//! `eV/angstrom^3` is reduced to a single multiplicative factor into that
//! base.

use std::collections::HashMap;
use std::f64::consts::PI;
use std::sync::LazyLock;

use serde_json::Value;

use super::error::Error;

// CODATA 2014
const SPEED_OF_LIGHT: f64 = 299_792_458.0;
const MU0: f64 = 4.0e-7 * PI;
const PLANCK: f64 = 6.626_070_040e-34;
const ELEMENTARY_CHARGE: f64 = 1.602_176_620_8e-19;
const ELECTRON_MASS: f64 = 9.109_383_56e-31;
const AVOGADRO: f64 = 6.022_140_857e23;
const BOLTZMANN: f64 = 1.380_648_52e-23;
const AMU: f64 = 1.660_539_040e-27;

static UNITS: LazyLock<HashMap<&'static str, f64>> = LazyLock::new(build_units);

fn build_units() -> HashMap<&'static str, f64> {
    let eps0 = 1.0 / MU0 / SPEED_OF_LIGHT.powi(2);
    let hbar = PLANCK / (2.0 * PI);

    let bohr = 4.0e10 * PI * eps0 * hbar.powi(2) / ELECTRON_MASS / ELEMENTARY_CHARGE.powi(2);
    let hartree = ELECTRON_MASS * ELEMENTARY_CHARGE.powi(3)
        / 16.0
        / PI.powi(2)
        / eps0.powi(2)
        / hbar.powi(2);
    let rydberg = 0.5 * hartree;
    let joule = 1.0 / ELEMENTARY_CHARGE;
    let kj = 1000.0 * joule;
    let pascal = joule / 1e30;
    let bar = 1e5 * pascal;
    let second = 1e10 * (ELEMENTARY_CHARGE / AMU).sqrt();
    let debye = 1.0 / 1e11 / ELEMENTARY_CHARGE / SPEED_OF_LIGHT;

    HashMap::from([
        ("eV", 1.0),
        ("meV", 1e-3),
        ("Ang", 1.0),
        ("Angstrom", 1.0),
        ("angstrom", 1.0),
        ("nm", 10.0),
        ("m", 1e10),
        ("Bohr", bohr),
        ("bohr", bohr),
        ("Hartree", hartree),
        ("hartree", hartree),
        ("Ha", hartree),
        ("Rydberg", rydberg),
        ("rydberg", rydberg),
        ("Ry", rydberg),
        ("J", joule),
        ("C", joule),
        ("kJ", kj),
        ("kcal", 4.184 * kj),
        ("mol", AVOGADRO),
        ("Pascal", pascal),
        ("GPa", 1e9 * pascal),
        ("bar", bar),
        ("kbar", 1000.0 * bar),
        ("Debye", debye),
        ("debye", debye),
        ("kB", BOLTZMANN / ELEMENTARY_CHARGE),
        ("second", second),
        ("fs", 1e-15 * second),
        ("kg", 1.0 / AMU),
    ])
}

/// Factor of a single named unit.
pub fn unit_factor(name: &str) -> Result<f64, Error> {
    UNITS
        .get(name)
        .copied()
        .ok_or_else(|| Error::UnknownUnit(name.to_string()))
}

/// Reduces an expression like `kcal/mol` or `eV/angstrom^3` to one factor.
///
/// Factors are separated by `*` or `/` and may carry an integer power after
/// `^`. The leading factor always multiplies.
pub fn conversion_factor(expr: &str) -> Result<f64, Error> {
    let malformed = || Error::MalformedUnit(expr.to_string());

    let mut factor = 1.0;
    let mut op = '*';
    let mut rest = expr.trim();
    if rest.is_empty() {
        return Err(malformed());
    }

    loop {
        let split = rest.find(['*', '/']);
        let (token, next) = match split {
            Some(idx) => (&rest[..idx], Some((rest.as_bytes()[idx] as char, &rest[idx + 1..]))),
            None => (rest, None),
        };

        let token = token.trim();
        if token.is_empty() {
            return Err(malformed());
        }
        let (name, power) = match token.split_once('^') {
            Some((name, p)) => (name.trim(), p.trim().parse::<i32>().map_err(|_| malformed())?),
            None => (token, 1),
        };
        let value = unit_factor(name)?.powi(power);

        match op {
            '*' => factor *= value,
            _ => factor /= value,
        }

        match next {
            Some((next_op, tail)) => {
                op = next_op;
                rest = tail;
            }
            None => break,
        }
    }

    Ok(factor)
}

/// Multiplies every number in a scalar or nested array in place.
pub(crate) fn scale(value: &mut Value, factor: f64) -> Option<()> {
    map_numbers(value, &|x| x * factor)
}

/// Adds `shift` to every number in a scalar or nested array in place.
pub(crate) fn offset(value: &mut Value, shift: f64) -> Option<()> {
    map_numbers(value, &|x| x + shift)
}

fn map_numbers(value: &mut Value, f: &dyn Fn(f64) -> f64) -> Option<()> {
    match value {
        Value::Number(n) => {
            let x = n.as_f64()?;
            *value = Value::from(f(x));
            Some(())
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                map_numbers(item, f)?;
            }
            Some(())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() <= eps
    }

    #[test]
    fn atomic_units_match_codata_2014() {
        assert!(approx_eq(unit_factor("Bohr").unwrap(), 0.529_177_210_67, 1e-9));
        assert!(approx_eq(unit_factor("Hartree").unwrap(), 27.211_386_02, 1e-6));
        assert!(approx_eq(unit_factor("Ry").unwrap(), 13.605_693_01, 1e-6));
    }

    #[test]
    fn compound_expressions() {
        let kcal_mol = conversion_factor("kcal/mol").unwrap();
        assert!(approx_eq(kcal_mol, 0.043_364_1, 1e-6));

        assert!(approx_eq(conversion_factor("eV/angstrom^3").unwrap(), 1.0, 1e-12));
        assert!(approx_eq(conversion_factor("eV/Ang").unwrap(), 1.0, 1e-12));

        let gpa = conversion_factor("GPa").unwrap();
        assert!(approx_eq(gpa, 1.0 / 160.217_662_08, 1e-9));

        let ha_bohr = conversion_factor("hartree/bohr").unwrap();
        assert!(approx_eq(ha_bohr, 51.422_067, 1e-5));

        let squared = conversion_factor("Bohr^2").unwrap();
        assert!(approx_eq(squared, 0.529_177_210_67_f64.powi(2), 1e-9));

        let product = conversion_factor("eV*Ang").unwrap();
        assert!(approx_eq(product, 1.0, 1e-12));
    }

    #[test]
    fn kbar_is_thousand_bar() {
        let kbar = unit_factor("kbar").unwrap();
        let bar = unit_factor("bar").unwrap();
        assert!(approx_eq(kbar / bar, 1000.0, 1e-9));
    }

    #[test]
    fn bad_expressions() {
        assert!(matches!(conversion_factor("furlong"), Err(Error::UnknownUnit(u)) if u == "furlong"));
        assert!(matches!(conversion_factor("eV//Ang"), Err(Error::MalformedUnit(_))));
        assert!(matches!(conversion_factor("Ang^x"), Err(Error::MalformedUnit(_))));
        assert!(matches!(conversion_factor(""), Err(Error::MalformedUnit(_))));
    }

    #[test]
    fn scale_nested_arrays() {
        let mut v = json!([[1.0, 2.0], [3.0, 4.0]]);
        scale(&mut v, 2.0).unwrap();
        assert_eq!(v, json!([[2.0, 4.0], [6.0, 8.0]]));

        let mut s = json!(-1.5);
        offset(&mut s, 0.5).unwrap();
        assert_eq!(s, json!(-1.0));

        let mut text = json!("abc");
        assert!(scale(&mut text, 2.0).is_none());
    }
}
