//! Component scopes.

use std::str::FromStr;

use strum::{Display, EnumString};

use crate::ContainerError;

/// Lifetime policy applied to instances of a component definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Scope {
    /// One shared instance, created on first resolution and cached until the
    /// container closes.
    #[default]
    Singleton,
    /// A fresh instance for every resolution, owned by the caller.
    Prototype,
}

impl Scope {
    /// Parses a declared scope string.
    ///
    /// A blank value means [`Scope::Singleton`]; matching ignores ASCII case.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::UnsupportedScope`] for any other value.
    pub fn from_declared(value: &str) -> Result<Self, ContainerError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Ok(Self::Singleton);
        }
        Self::from_str(trimmed).map_err(|_| ContainerError::UnsupportedScope {
            value: value.to_owned(),
        })
    }
}
