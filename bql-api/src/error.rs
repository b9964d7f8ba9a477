use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// An error raised by a graph-service operation (§6). The engine never
/// inspects the variant beyond display/propagation — it wraps this in
/// its own `Error::ServiceError` and categorizes it as
/// `partially_applied` or `pre_mutation` based on when in the pipeline
/// the call occurred, per §5.
#[derive(Debug, Error)]
pub enum Error {
    #[error("graph service call failed: {0}")]
    Failed(String),

    #[error("graph service call was cancelled")]
    Cancelled,
}
