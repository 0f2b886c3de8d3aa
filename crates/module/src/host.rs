//! Interfaces the host chain provides to the module.

use thiserror::Error;

use keyshare_types::SlashRequest;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("staking keeper rejected slash: {0}")]
pub struct StakingError(pub String);

/// Host staking subsystem.
pub trait StakingKeeper {
    /// Slash a validator at the request's consensus address and infraction height.
    fn request_slash(&mut self, request: &SlashRequest) -> Result<(), StakingError>;
}

/// Records every request; never fails.
impl StakingKeeper for Vec<SlashRequest> {
    fn request_slash(&mut self, request: &SlashRequest) -> Result<(), StakingError> {
        self.push(request.clone());
        Ok(())
    }
}
