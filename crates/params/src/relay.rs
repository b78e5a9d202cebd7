//! Parameters for the BTC relay client such as the retarget cadence, the median-time-past window
//! and the header submission gas schedule.

use serde::{Deserialize, Serialize};

use super::default::{
    MAX_SHORT_FORK_LEN, MTP_WINDOW, RETARGET_PERIOD, SUBMIT_BASE_GAS, SUBMIT_PER_HEADER_GAS,
};

/// The relay public parameters that are inherent from the protocol and do not need to be
/// interactively shared.
///
/// These must match the values compiled into the on-chain relay contract; a mismatch produces
/// commit hashes the contract will never recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayParams {
    /// Number of blocks between difficulty retargets.
    pub retarget_period: u32,

    /// Number of previous block timestamps tracked per stored header.
    pub mtp_window: usize,

    /// Maximum number of headers accepted in a single short-fork submission.
    pub max_short_fork_len: usize,

    /// Base gas cost of a header submission transaction.
    pub submit_base_gas: u64,

    /// Marginal gas cost per submitted header.
    pub submit_per_header_gas: u64,
}

impl Default for RelayParams {
    fn default() -> Self {
        Self {
            retarget_period: RETARGET_PERIOD,
            mtp_window: MTP_WINDOW,
            max_short_fork_len: MAX_SHORT_FORK_LEN,
            submit_base_gas: SUBMIT_BASE_GAS,
            submit_per_header_gas: SUBMIT_PER_HEADER_GAS,
        }
    }
}

impl RelayParams {
    /// Gas cost of submitting `num_headers` headers in one transaction.
    pub const fn submission_gas(&self, num_headers: usize) -> u64 {
        self.submit_base_gas + self.submit_per_header_gas * num_headers as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_params_serde() {
        let params = RelayParams::default();
        let serialized = toml::to_string(&params).unwrap();

        let deserialized: RelayParams = toml::from_str(&serialized).unwrap();

        assert_eq!(params, deserialized);
    }

    #[test]
    fn test_submission_gas_is_linear() {
        let params = RelayParams::default();
        assert_eq!(params.submission_gas(0), params.submit_base_gas);
        assert_eq!(
            params.submission_gas(7) - params.submission_gas(6),
            params.submit_per_header_gas
        );
    }
}
