use std::fmt;

/// Every rejected pool operation reports one of these kinds synchronously.
/// All are raised before any state is mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    /// Caller lacks the required role, or the validator co-signature did not
    /// verify. Carries no detail about which check failed.
    Unauthorized,
    /// Zero dividend or zero share amount.
    InvalidAmount,
    /// Pool not initialized, not yet activated, or deactivated.
    PoolInactive,
    /// Second `init_pool` on the same pool.
    AlreadyInitialized,
    /// Reward-asset account cannot cover the transfer.
    InsufficientFunds,
    /// Share balance too small for a burn or transfer.
    InsufficientBalance,
    /// Checked arithmetic refused to wrap.
    ArithmeticOverflow,
    /// The zero address where a real identifier is required.
    InvalidAddress,
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PoolError::Unauthorized => write!(f, "Unauthorized"),
            PoolError::InvalidAmount => write!(f, "Invalid amount"),
            PoolError::PoolInactive => write!(f, "Pool is not active"),
            PoolError::AlreadyInitialized => write!(f, "Pool already initialized"),
            PoolError::InsufficientFunds => write!(f, "Insufficient reward funds"),
            PoolError::InsufficientBalance => write!(f, "Insufficient share balance"),
            PoolError::ArithmeticOverflow => write!(f, "Arithmetic overflow"),
            PoolError::InvalidAddress => write!(f, "Invalid address"),
        }
    }
}

impl std::error::Error for PoolError {}
