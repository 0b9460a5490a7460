//! Type model for VCalc.
//!
//! The language has two nominal types: `int`, a 64-bit signed scalar, and
//! `vector`, a runtime-length sequence of `int`. Binary operators promote a
//! scalar operand to a vector by broadcasting it.

use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Vector,
}

impl Type {
    pub fn name(&self) -> &'static str {
        match self {
            Type::Int => "int",
            Type::Vector => "vector",
        }
    }

    pub fn from_name(name: &str) -> Option<Type> {
        match name {
            "int" => Some(Type::Int),
            "vector" => Some(Type::Vector),
            _ => None,
        }
    }

    pub fn is_vector(&self) -> bool {
        *self == Type::Vector
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Outcome of applying the promotion table to a binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Promotion {
    pub result: Type,
    pub promote_left: Option<Type>,
    pub promote_right: Option<Type>,
}

/// Promotion table for binary operators, comparisons included.
///
/// | left   | right  | result | promoted |
/// |--------|--------|--------|----------|
/// | vector | vector | vector | -        |
/// | int    | vector | vector | left     |
/// | vector | int    | vector | right    |
/// | int    | int    | int    | -        |
pub fn promote(left: Type, right: Type) -> Promotion {
    match (left, right) {
        (Type::Vector, Type::Vector) => Promotion {
            result: Type::Vector,
            promote_left: None,
            promote_right: None,
        },
        (Type::Int, Type::Vector) => Promotion {
            result: Type::Vector,
            promote_left: Some(Type::Vector),
            promote_right: None,
        },
        (Type::Vector, Type::Int) => Promotion {
            result: Type::Vector,
            promote_left: None,
            promote_right: Some(Type::Vector),
        },
        (Type::Int, Type::Int) => Promotion {
            result: Type::Int,
            promote_left: None,
            promote_right: None,
        },
    }
}
