//! Policy configuration.
//!
//! Every policy that needs configuration names its options type through
//! [`RequiresOptions::Options`]. Options are plain values: they are built with
//! struct literal syntax (usually starting from [`Default`]), validated once
//! when the policy is constructed, and never touched again.

use crate::error::ConfigurationError;

/// A set of options for one policy variant.
///
/// [`Default`] must always produce a configuration that passes
/// [`validate`](PolicyOptions::validate).
pub trait PolicyOptions: Default + Clone + PartialEq + std::fmt::Debug {
    /// Check every field, reporting the first violated constraint.
    fn validate(&self) -> Result<(), ConfigurationError>;
}

/// A policy that is constructed from a validated set of options.
pub trait RequiresOptions: Sized {
    /// The options this policy is built from.
    type Options: PolicyOptions;

    /// Validate `options` and build the policy.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if `options` fails
    /// [`PolicyOptions::validate`]. No policy is built in that case.
    fn from_options(options: Self::Options) -> Result<Self, ConfigurationError>;

    /// Build the policy from [`Default`] options.
    fn with_default_options() -> Self {
        match Self::from_options(Self::Options::default()) {
            Ok(policy) => policy,
            Err(error) => unreachable!("default options must be valid: {}", error),
        }
    }
}

pub(crate) fn finite_non_negative(field: &'static str, value: f64) -> Result<(), ConfigurationError> {
    if !value.is_finite() {
        return Err(ConfigurationError::new(field, "must be finite"));
    }
    if value < 0.0 {
        return Err(ConfigurationError::new(field, "must not be negative"));
    }
    Ok(())
}

pub(crate) fn positive(field: &'static str, value: f64) -> Result<(), ConfigurationError> {
    finite_non_negative(field, value)?;
    if value == 0.0 {
        return Err(ConfigurationError::new(field, "must be > 0"));
    }
    Ok(())
}

pub(crate) fn fraction(field: &'static str, value: f64) -> Result<(), ConfigurationError> {
    finite_non_negative(field, value)?;
    if value > 1.0 {
        return Err(ConfigurationError::new(field, "must not be greater than 1.0"));
    }
    Ok(())
}
