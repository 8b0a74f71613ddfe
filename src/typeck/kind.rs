use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Family {
    String,
    Stream,
    Clock,
    Tuple,
    Integer,
    Boolean,
}

impl Family {
    pub fn from_name(name: &str) -> Option<Family> {
        match name {
            "String" => Some(Family::String),
            "Stream" => Some(Family::Stream),
            "Clock" => Some(Family::Clock),
            "Tuple" => Some(Family::Tuple),
            "Integer" => Some(Family::Integer),
            "Boolean" => Some(Family::Boolean),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Family::String => "String",
            Family::Stream => "Stream",
            Family::Clock => "Clock",
            Family::Tuple => "Tuple",
            Family::Integer => "Integer",
            Family::Boolean => "Boolean",
        }
    }
}

/// A value type plus its ownership.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Kind {
    pub borrowed: bool,
    pub family: Family,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Kind>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KindError {
    #[error("expecting {expected}, got {actual}")]
    Mismatch { expected: Kind, actual: Kind },
    #[error("expecting owned {expected}, but got {actual}")]
    BorrowedIntoOwned { expected: Kind, actual: Kind },
}

impl Kind {
    pub fn owned(family: Family) -> Self {
        Self { borrowed: false, family, args: Vec::new() }
    }

    pub fn borrowed(family: Family) -> Self {
        Self { borrowed: true, family, args: Vec::new() }
    }

    pub fn tuple(borrowed: bool, args: Vec<Kind>) -> Self {
        Self { borrowed, family: Family::Tuple, args }
    }

    /// Can a value of kind `self` be used where `target` is expected?
    ///
    /// Families (and tuple arguments, recursively) must match. Owned values
    /// may be lent to borrowed targets; a borrowed value never satisfies an
    /// owned target.
    pub fn converts_to(&self, target: &Kind) -> Result<(), KindError> {
        let mismatch = || KindError::Mismatch { expected: target.clone(), actual: self.clone() };
        if self.family != target.family || self.args.len() != target.args.len() {
            return Err(mismatch());
        }
        if self.args.iter().zip(&target.args).any(|(a, b)| a.converts_to(b).is_err()) {
            return Err(mismatch());
        }
        if self.borrowed && !target.borrowed {
            return Err(KindError::BorrowedIntoOwned { expected: target.clone(), actual: self.clone() });
        }
        Ok(())
    }

    /// Exact type identity: same family, same ownership, equivalent arguments.
    pub fn is_equivalent(&self, other: &Kind) -> Result<(), KindError> {
        let same = self.family == other.family
            && self.borrowed == other.borrowed
            && self.args.len() == other.args.len()
            && self.args.iter().zip(&other.args).all(|(a, b)| a.is_equivalent(b).is_ok());
        if same {
            Ok(())
        } else {
            Err(KindError::Mismatch { expected: other.clone(), actual: self.clone() })
        }
    }

    /// Owned heap values the generator must free when they become unreachable.
    pub fn needs_cleanup(&self) -> bool {
        !self.borrowed && matches!(self.family, Family::String | Family::Tuple)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.borrowed {
            write!(f, "&")?;
        }
        write!(f, "{}", self.family.name())?;
        if !self.args.is_empty() {
            write!(f, "<")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{arg}")?;
            }
            write!(f, ">")?;
        }
        Ok(())
    }
}
