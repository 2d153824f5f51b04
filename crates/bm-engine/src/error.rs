use std::fmt;

use bm_store::{BlockId, StoreError};
use bm_tile::TileError;
use thiserror::Error;

/// Coarse classification used when reporting a failed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Incompatible tile shapes or a contraction index out of range.
    Dimension,
    /// A required tile is absent from its store.
    NotFound,
    /// Matrix identifiers unset or unknown, block sizes or dtypes mismatched.
    Configuration,
    /// Integer overflow in a tile kernel.
    Numeric,
    /// Shuffle or aggregation bookkeeping failure.
    Internal,
}

impl ErrorKind {
    /// Whether re-running the same task could succeed. Shape, configuration
    /// and overflow failures are deterministic.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::NotFound | ErrorKind::Internal)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Dimension => "dimension",
            ErrorKind::NotFound => "not-found",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Numeric => "numeric",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("dimension error: {0}")]
    Dimension(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("tile error: {0}")]
    Tile(#[from] TileError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("block {block} received {received} of {expected} partial products")]
    IncompleteAggregation {
        block: BlockId,
        expected: usize,
        received: usize,
    },
    #[error("block {block} received more than {expected} partial products")]
    ExcessContribution { block: BlockId, expected: usize },
    #[error("shuffle channel closed: {0}")]
    ChannelClosed(String),
    #[error("aggregating block {block} failed: {source}")]
    AggregationFailed {
        block: BlockId,
        #[source]
        source: Box<EngineError>,
    },
    #[error("reduce partition {partition} panicked")]
    ReducerPanicked { partition: usize },
    #[error("task {block} failed after {attempts} attempt(s): {source}")]
    TaskFailed {
        block: BlockId,
        attempts: u32,
        #[source]
        source: Box<EngineError>,
    },
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Dimension(_) => ErrorKind::Dimension,
            EngineError::Configuration(_) => ErrorKind::Configuration,
            EngineError::Tile(e) => tile_kind(e),
            EngineError::Store(e) => match e {
                StoreError::NotFound { .. } => ErrorKind::NotFound,
                StoreError::OutOfRange { .. } => ErrorKind::Dimension,
                StoreError::Tile(t) => tile_kind(t),
                StoreError::BlockShape { .. }
                | StoreError::DTypeMismatch { .. }
                | StoreError::MatrixShape { .. }
                | StoreError::UnknownMatrix(_)
                | StoreError::AlreadyExists(_)
                | StoreError::InvalidGrid(_) => ErrorKind::Configuration,
            },
            EngineError::IncompleteAggregation { .. }
            | EngineError::ExcessContribution { .. }
            | EngineError::ChannelClosed(_)
            | EngineError::ReducerPanicked { .. } => ErrorKind::Internal,
            EngineError::TaskFailed { source, .. }
            | EngineError::AggregationFailed { source, .. } => source.kind(),
        }
    }

    /// True if the failure, or the task failure wrapping it, came from a
    /// closed shuffle channel. Such a task may already have emitted output
    /// and must not be re-run.
    pub fn is_channel_closed(&self) -> bool {
        match self {
            EngineError::ChannelClosed(_) => true,
            EngineError::TaskFailed { source, .. } => source.is_channel_closed(),
            _ => false,
        }
    }

    /// The block the failure is attributed to, if any.
    pub fn block(&self) -> Option<BlockId> {
        match self {
            EngineError::TaskFailed { block, .. }
            | EngineError::AggregationFailed { block, .. }
            | EngineError::IncompleteAggregation { block, .. }
            | EngineError::ExcessContribution { block, .. } => Some(*block),
            EngineError::Store(StoreError::NotFound { block, .. })
            | EngineError::Store(StoreError::OutOfRange { block, .. }) => Some(*block),
            _ => None,
        }
    }
}

fn tile_kind(e: &TileError) -> ErrorKind {
    match e {
        TileError::Dimension { .. } | TileError::DataLength { .. } => ErrorKind::Dimension,
        TileError::Overflow { .. } => ErrorKind::Numeric,
        TileError::DTypeMismatch { .. } | TileError::UnknownDType(_) => ErrorKind::Configuration,
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
