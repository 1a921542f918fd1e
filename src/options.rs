use std::convert::TryFrom;

#[derive(Debug, thiserror::Error)]
#[error("illegal options: {0}")]
pub struct InvalidOptions(pub &'static str);

/// Tunables for the per-peer message buffer.
#[derive(Clone, Default)]
pub struct BufferOptions {
    /// Upper cap on bytes read from the log cache per fill attempt.
    /// Default 2 MiB.
    pub max_buffer_fill_size_bytes: Option<i64>,
    /// Per-group RPC batch cap; the buffer will not fill beyond this total.
    /// Default 1 MiB.
    pub consensus_max_batch_size_bytes: Option<i64>,
}

#[derive(Clone)]
pub(crate) struct BufferOptionsValidated {
    pub max_buffer_fill_size_bytes: i64,
    pub consensus_max_batch_size_bytes: i64,
}

impl BufferOptionsValidated {
    fn validate(&self) -> Result<(), InvalidOptions> {
        if self.max_buffer_fill_size_bytes <= 0 {
            return Err(InvalidOptions("buffer fill size must be positive"));
        }
        if self.consensus_max_batch_size_bytes <= 0 {
            return Err(InvalidOptions("batch size must be positive"));
        }
        Ok(())
    }
}

impl TryFrom<BufferOptions> for BufferOptionsValidated {
    type Error = InvalidOptions;

    fn try_from(options: BufferOptions) -> Result<Self, Self::Error> {
        let values = BufferOptionsValidated {
            max_buffer_fill_size_bytes: options.max_buffer_fill_size_bytes.unwrap_or(2 * 1024 * 1024),
            consensus_max_batch_size_bytes: options
                .consensus_max_batch_size_bytes
                .unwrap_or(1024 * 1024),
        };

        values.validate()?;
        Ok(values)
    }
}

/// Tunables for consensus metadata.
#[derive(Clone, Default)]
pub struct CMetaOptions {
    /// Upper bound on retained previous-vote entries. Default 5.
    pub vote_history_max_size: Option<usize>,
    /// Capacity of the recently-removed-peers registry. Default 20.
    pub max_removed_peers: Option<usize>,
    /// Probability of crashing the process just before a metadata flush.
    /// For testing only; requires the `fault-injection` feature to have any
    /// effect. Default 0.0.
    pub fault_crash_before_flush: Option<f64>,
}

#[derive(Debug, Clone)]
pub(crate) struct CMetaOptionsValidated {
    pub vote_history_max_size: usize,
    pub max_removed_peers: usize,
    pub fault_crash_before_flush: f64,
}

impl CMetaOptionsValidated {
    fn validate(&self) -> Result<(), InvalidOptions> {
        if self.vote_history_max_size == 0 {
            return Err(InvalidOptions("vote history size must be at least 1"));
        }
        if self.max_removed_peers == 0 {
            return Err(InvalidOptions("removed peers capacity must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.fault_crash_before_flush) {
            return Err(InvalidOptions("crash probability must be within [0, 1]"));
        }
        Ok(())
    }
}

impl TryFrom<CMetaOptions> for CMetaOptionsValidated {
    type Error = InvalidOptions;

    fn try_from(options: CMetaOptions) -> Result<Self, Self::Error> {
        let values = CMetaOptionsValidated {
            vote_history_max_size: options.vote_history_max_size.unwrap_or(5),
            max_removed_peers: options.max_removed_peers.unwrap_or(20),
            fault_crash_before_flush: options.fault_crash_before_flush.unwrap_or(0.0),
        };

        values.validate()?;
        Ok(values)
    }
}
