//! Configuration loading errors.

use std::error::Error as StdError;
use std::sync::Arc;

use clap::error::ErrorKind;
use ortho_config::OrthoError;
use thiserror::Error;

use crate::TuningError;

/// Errors raised while assembling [`crate::Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A layer could not be read, parsed or merged, or the command line was
    /// rejected.
    #[error(transparent)]
    Load(Arc<OrthoError>),
    /// The tuning values violate a constraint.
    #[error("invalid server tuning: {0}")]
    Tuning(#[from] TuningError),
}

impl ConfigError {
    /// Returns the command-line output to print when the user asked for help
    /// or version text rather than supplying a bad argument.
    #[must_use]
    pub fn display_request(&self) -> Option<&clap::Error> {
        let Self::Load(error) = self else {
            return None;
        };
        let root: &OrthoError = error;
        let mut cause: Option<&(dyn StdError + 'static)> = Some(root);
        while let Some(current) = cause {
            let clap_error = current
                .downcast_ref::<clap::Error>()
                .or_else(|| current.downcast_ref::<Box<clap::Error>>().map(|boxed| &**boxed));
            if let Some(found) = clap_error {
                return matches!(found.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion)
                    .then_some(found);
            }
            cause = current.source();
        }
        None
    }

    /// Returns `true` when the command line asked for help or version output.
    #[must_use]
    pub fn is_display_request(&self) -> bool {
        self.display_request().is_some()
    }
}
