use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvxError {
  #[error("invalid argument: {0}")]
  InvalidArg(String),

  #[error("invalid resource: {0}")]
  InvalidResource(String),

  #[error("bit stream capacity exhausted")]
  CapacityLimit,

  #[error("allocation failed")]
  OutOfMemory,

  #[error("operation not implemented: {0}")]
  NotImpl(String),

  #[error("underlying operation failed")]
  ExecutionFailure(#[source] Box<EvxError>),
}

pub type EvxResult<T> = Result<T, EvxError>;
