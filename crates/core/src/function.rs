use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{IntegrandError, QuadError};
use crate::integrand::Integrand;

/// Serializable integrand built from a small expression vocabulary.
///
/// Closures cannot leave the process, so the isolated-process strategy ships
/// one of these to each worker instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Function {
    Constant { value: f64 },
    Identity,
    Sin,
    Cos,
    Tan,
    Exp,
    /// Natural logarithm; rejects `x <= 0`.
    Ln,
    /// Square root; rejects `x < 0`.
    Sqrt,
    Powi { exponent: i32 },
    /// `c0 + c1*x + c2*x^2 + ...`
    Polynomial { coefficients: Vec<f64> },
    Scale { factor: f64, inner: Box<Function> },
    Sum { terms: Vec<Function> },
    Product { factors: Vec<Function> },
    /// `outer(inner(x))`
    Compose {
        outer: Box<Function>,
        inner: Box<Function>,
    },
}

impl Function {
    pub fn constant(value: f64) -> Self {
        Self::Constant { value }
    }

    pub fn powi(exponent: i32) -> Self {
        Self::Powi { exponent }
    }

    pub fn polynomial(coefficients: impl Into<Vec<f64>>) -> Self {
        Self::Polynomial {
            coefficients: coefficients.into(),
        }
    }

    pub fn scale(factor: f64, inner: Function) -> Self {
        Self::Scale {
            factor,
            inner: Box::new(inner),
        }
    }

    pub fn compose(outer: Function, inner: Function) -> Self {
        Self::Compose {
            outer: Box::new(outer),
            inner: Box::new(inner),
        }
    }

    fn render(&self, arg: &str) -> String {
        match self {
            Self::Constant { value } => value.to_string(),
            Self::Identity => arg.to_string(),
            Self::Sin => format!("sin({arg})"),
            Self::Cos => format!("cos({arg})"),
            Self::Tan => format!("tan({arg})"),
            Self::Exp => format!("exp({arg})"),
            Self::Ln => format!("ln({arg})"),
            Self::Sqrt => format!("sqrt({arg})"),
            Self::Powi { exponent } => format!("{}^{exponent}", wrap(arg)),
            Self::Polynomial { coefficients } => {
                let terms: Vec<String> = coefficients
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| **c != 0.0)
                    .map(|(power, c)| match power {
                        0 => c.to_string(),
                        1 => format!("{c}*{}", wrap(arg)),
                        _ => format!("{c}*{}^{power}", wrap(arg)),
                    })
                    .collect();
                if terms.is_empty() {
                    "0".to_string()
                } else {
                    terms.join(" + ")
                }
            }
            Self::Scale { factor, inner } => format!("{factor}*({})", inner.render(arg)),
            Self::Sum { terms } => join_rendered(terms, arg, " + ", "0"),
            Self::Product { factors } => join_rendered(factors, arg, " * ", "1"),
            Self::Compose { outer, inner } => outer.render(&inner.render(arg)),
        }
    }
}

fn wrap(arg: &str) -> String {
    if arg.chars().all(|c| c.is_alphanumeric() || c == '.') {
        arg.to_string()
    } else {
        format!("({arg})")
    }
}

fn join_rendered(parts: &[Function], arg: &str, sep: &str, empty: &str) -> String {
    if parts.is_empty() {
        return empty.to_string();
    }
    parts
        .iter()
        .map(|p| format!("({})", p.render(arg)))
        .collect::<Vec<_>>()
        .join(sep)
}

impl Integrand for Function {
    fn eval(&self, x: f64) -> Result<f64, IntegrandError> {
        match self {
            Self::Constant { value } => Ok(*value),
            Self::Identity => Ok(x),
            Self::Sin => Ok(x.sin()),
            Self::Cos => Ok(x.cos()),
            Self::Tan => Ok(x.tan()),
            Self::Exp => Ok(x.exp()),
            Self::Ln => {
                if x <= 0.0 {
                    Err(IntegrandError::Domain {
                        x,
                        reason: "ln undefined for x <= 0".into(),
                    })
                } else {
                    Ok(x.ln())
                }
            }
            Self::Sqrt => {
                if x < 0.0 {
                    Err(IntegrandError::Domain {
                        x,
                        reason: "sqrt undefined for x < 0".into(),
                    })
                } else {
                    Ok(x.sqrt())
                }
            }
            Self::Powi { exponent } => Ok(x.powi(*exponent)),
            Self::Polynomial { coefficients } => {
                Ok(coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c))
            }
            Self::Scale { factor, inner } => Ok(factor * inner.eval(x)?),
            Self::Sum { terms } => terms.iter().try_fold(0.0, |acc, t| Ok(acc + t.eval(x)?)),
            Self::Product { factors } => {
                factors.iter().try_fold(1.0, |acc, f| Ok(acc * f.eval(x)?))
            }
            Self::Compose { outer, inner } => outer.eval(inner.eval(x)?),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render("x"))
    }
}

/// Parses the short command-line notation:
/// `sin`, `cos`, `tan`, `exp`, `ln`, `sqrt`, `x`, `x^N`, `const:V`,
/// `poly:c0,c1,...`, or a JSON document for anything richer.
impl FromStr for Function {
    type Err = QuadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.starts_with('{') || s.starts_with('"') {
            return serde_json::from_str(s)
                .map_err(|e| QuadError::invalid(format!("invalid function JSON: {e}")));
        }

        let lower = s.to_ascii_lowercase();
        match lower.as_str() {
            "x" | "identity" => return Ok(Self::Identity),
            "sin" => return Ok(Self::Sin),
            "cos" => return Ok(Self::Cos),
            "tan" => return Ok(Self::Tan),
            "exp" => return Ok(Self::Exp),
            "ln" | "log" => return Ok(Self::Ln),
            "sqrt" => return Ok(Self::Sqrt),
            _ => {}
        }

        if let Some(exp) = lower.strip_prefix("x^") {
            let exponent = exp
                .trim()
                .parse::<i32>()
                .map_err(|e| QuadError::invalid(format!("invalid exponent '{exp}': {e}")))?;
            return Ok(Self::powi(exponent));
        }

        if let Some(value) = lower.strip_prefix("const:") {
            let value = parse_number(value)?;
            return Ok(Self::constant(value));
        }

        if let Some(list) = lower.strip_prefix("poly:") {
            let coefficients = list
                .split(',')
                .map(parse_number)
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Self::polynomial(coefficients));
        }

        Err(QuadError::invalid(format!("unknown function '{s}'")))
    }
}

fn parse_number(raw: &str) -> Result<f64, QuadError> {
    let raw = raw.trim();
    raw.parse::<f64>()
        .map_err(|e| QuadError::invalid(format!("invalid number '{raw}': {e}")))
}
