use thiserror::Error;

/// Failures of the external classifier. Callers degrade every variant to "no signal".
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier is not configured")]
    Unavailable,
    #[error("classifier request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("classifier returned status {0}")]
    Status(u16),
    #[error("classifier timed out")]
    Timeout,
    #[error("could not parse classifier output: {0}")]
    Parse(String),
}

/// Invalid administrator input for a policy field.
#[derive(Debug, Error, PartialEq)]
pub enum PolicyError {
    #[error("unknown timezone '{0}'")]
    InvalidTimezone(String),
    #[error("minute of day {0} is outside 0..1439")]
    InvalidMinute(u32),
    #[error("unknown spam level '{0}'")]
    UnknownLevel(String),
    #[error("unknown action '{0}'")]
    UnknownAction(String),
    #[error("could not parse time '{0}', expected HH:MM")]
    InvalidTime(String),
}
