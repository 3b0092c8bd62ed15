//! Core type definitions for Cohort

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Constant added by [`FunctionKind::AddConstant`]
pub const ADD_CONSTANT: i64 = 10;

/// Constant subtracted by [`FunctionKind::SubtractConstant`]
pub const SUBTRACT_CONSTANT: i64 = 5;

/// The closed set of computations a task can perform on the shared input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionKind {
    /// `x * x` (symbol `a`)
    Square,
    /// `x + 10` (symbol `b`)
    AddConstant,
    /// `x - 5` (symbol `c`)
    SubtractConstant,
}

impl FunctionKind {
    /// Get the string representation of the function kind
    pub fn as_str(&self) -> &'static str {
        match self {
            FunctionKind::Square => "square",
            FunctionKind::AddConstant => "add",
            FunctionKind::SubtractConstant => "subtract",
        }
    }

    /// Get the one-letter console symbol
    pub fn symbol(&self) -> char {
        match self {
            FunctionKind::Square => 'A',
            FunctionKind::AddConstant => 'B',
            FunctionKind::SubtractConstant => 'C',
        }
    }

    /// Get all supported function kinds
    pub fn all() -> &'static [FunctionKind] {
        &[
            FunctionKind::Square,
            FunctionKind::AddConstant,
            FunctionKind::SubtractConstant,
        ]
    }

    /// Apply the computation to the shared input.
    ///
    /// The input is an `i32` and the result an `i64`, so none of the
    /// computations can overflow.
    pub fn apply(&self, x: i32) -> i64 {
        let x = i64::from(x);
        match self {
            FunctionKind::Square => x * x,
            FunctionKind::AddConstant => x + ADD_CONSTANT,
            FunctionKind::SubtractConstant => x - SUBTRACT_CONSTANT,
        }
    }
}

impl fmt::Display for FunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FunctionKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "a" | "square" => Ok(FunctionKind::Square),
            "b" | "add" | "add_constant" => Ok(FunctionKind::AddConstant),
            "c" | "sub" | "subtract" | "subtract_constant" => Ok(FunctionKind::SubtractConstant),
            _ => Err(CoreError::InvalidTag(s.to_string())),
        }
    }
}
