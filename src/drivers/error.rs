use thiserror::Error;
#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("cannot connect to DPScope on {port}: {reason}")]
    Connection { port: String, reason: String },
    #[error("timed out waiting for DPScope ({0})")]
    Timeout(String),
    #[error("communication error: {0}")]
    Comms(String),
    #[error("malformed command {command}: {reason}")]
    Command { command: &'static str, reason: String },
    #[error("cannot decode DPScope response: {0}")]
    Decode(String),
    #[error("invalid setting: {0}")]
    InvalidSetting(String),
    #[error("failed to render plot: {0}")]
    Plot(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
impl ScopeError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ScopeError::Timeout(_))
    }
}
impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for ScopeError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        ScopeError::Plot(format!("{value:?}"))
    }
}
impl From<image::ImageError> for ScopeError {
    fn from(value: image::ImageError) -> Self {
        ScopeError::Plot(value.to_string())
    }
}
