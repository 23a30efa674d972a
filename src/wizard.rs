//! Step sequencing for the wizard.
//!
//! Each step has a guard that must hold before moving forward; moving back is
//! always allowed except away from the first step.

use crate::csv_import::ParsedCsv;
use crate::error::ValidationError;
use crate::model::{SessionConfig, WizardStep};

/// Shared wizard state handed to each step.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub config: SessionConfig,
    pub parsed: ParsedCsv,
    pub authenticated: bool,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }
}

/// The step after `step`, or the reason it cannot be left yet.
pub fn next_step(step: WizardStep, session: &Session) -> Result<WizardStep, ValidationError> {
    match step {
        WizardStep::Configure => {
            session.config.validate_connection()?;
            Ok(WizardStep::Authenticate)
        }
        WizardStep::Authenticate => {
            if session.authenticated {
                Ok(WizardStep::LoadFile)
            } else {
                Err(ValidationError::NotAuthenticated)
            }
        }
        WizardStep::LoadFile => {
            if !session.parsed.is_valid() {
                Err(ValidationError::InvalidRows(session.parsed.errors.len()))
            } else if session.parsed.records.is_empty() {
                Err(ValidationError::NoRecords)
            } else {
                Ok(WizardStep::Upload)
            }
        }
        WizardStep::Upload => Ok(WizardStep::Upload),
    }
}

pub fn prev_step(step: WizardStep) -> WizardStep {
    match step {
        WizardStep::Configure | WizardStep::Authenticate => WizardStep::Configure,
        WizardStep::LoadFile => WizardStep::Authenticate,
        WizardStep::Upload => WizardStep::LoadFile,
    }
}

/// Drop the authenticated flag when the connection settings changed since
/// the last successful login.
pub fn invalidate_if_changed(session: &mut Session, previous: &SessionConfig) {
    if session.config.connection_changed(previous) {
        session.authenticated = false;
    }
}
