//! Four-function calculator with an operation history

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, TrellisError};

/// Arithmetic operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Subtract => "-",
            Operator::Multiply => "*",
            Operator::Divide => "/",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Operator {
    type Err = TrellisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "+" | "add" | "plus" => Ok(Operator::Add),
            "-" | "sub" | "subtract" | "minus" => Ok(Operator::Subtract),
            "*" | "x" | "mul" | "multiply" | "times" => Ok(Operator::Multiply),
            "/" | "div" | "divide" => Ok(Operator::Divide),
            _ => Err(TrellisError::invalid_data(format!(
                "unknown operator '{}' (use + - * /)",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Calculator {
    history: Vec<String>,
}

impl Calculator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, a: f64, b: f64) -> f64 {
        self.record(Operator::Add, a, b, a + b)
    }

    pub fn subtract(&mut self, a: f64, b: f64) -> f64 {
        self.record(Operator::Subtract, a, b, a - b)
    }

    pub fn multiply(&mut self, a: f64, b: f64) -> f64 {
        self.record(Operator::Multiply, a, b, a * b)
    }

    /// Fails on a zero divisor; nothing is recorded in that case
    pub fn divide(&mut self, a: f64, b: f64) -> Result<f64> {
        if b == 0.0 {
            return Err(TrellisError::DivisionByZero);
        }
        Ok(self.record(Operator::Divide, a, b, a / b))
    }

    pub fn apply(&mut self, op: Operator, a: f64, b: f64) -> Result<f64> {
        match op {
            Operator::Add => Ok(self.add(a, b)),
            Operator::Subtract => Ok(self.subtract(a, b)),
            Operator::Multiply => Ok(self.multiply(a, b)),
            Operator::Divide => self.divide(a, b),
        }
    }

    /// Copy of the history, oldest first
    pub fn history(&self) -> Vec<String> {
        self.history.clone()
    }

    #[cfg(test)]
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    fn record(&mut self, op: Operator, a: f64, b: f64, result: f64) -> f64 {
        // {:?} keeps the trailing ".0" on whole numbers
        self.history
            .push(format!("{:?} {} {:?} = {:?}", a, op, b, result));
        result
    }
}
