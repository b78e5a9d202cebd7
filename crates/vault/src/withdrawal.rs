//! Decoding of Bitcoin withdrawal transactions: the OP_RETURN payload codec, the packed
//! fee-rate word and the fee splits derived from it.

use alloy_primitives::{keccak256, Address, B256};
use alloy_sol_types::SolValue;

use crate::{errors::VaultError, state::Utxo};

/// Divisor for the packed fee rates: rates are expressed in parts per 100 000.
pub const FEE_RATE_DIVISOR: u64 = 100_000;

/// The three withdrawal fee rates packed into a single u64 carried by the withdrawal
/// transaction: bits 0..20 caller rate, 20..40 fronting rate, 40..60 execution rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PackedFeeRate(u64);

impl PackedFeeRate {
    const RATE_MASK: u64 = (1 << 20) - 1;

    /// Wraps a raw packed word.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Packs three rates, each in parts per 100 000.
    pub const fn pack(caller: u32, fronting: u32, execution: u32) -> Self {
        Self(
            (caller as u64 & Self::RATE_MASK)
                | ((fronting as u64 & Self::RATE_MASK) << 20)
                | ((execution as u64 & Self::RATE_MASK) << 40),
        )
    }

    /// Rate charged by the claim caller.
    pub const fn caller_rate(&self) -> u64 {
        self.0 & Self::RATE_MASK
    }

    /// Rate paid to a fronter on top of the fronted amount.
    pub const fn fronting_rate(&self) -> u64 {
        (self.0 >> 20) & Self::RATE_MASK
    }

    /// Rate reserved for the execution handler.
    pub const fn execution_rate(&self) -> u64 {
        (self.0 >> 40) & Self::RATE_MASK
    }
}

/// Applies a parts-per-100 000 rate to an amount, with a u128 intermediate so the product cannot
/// overflow.
fn apply_rate(amount: u64, rate: u64) -> u64 {
    ((amount as u128 * rate as u128) / FEE_RATE_DIVISOR as u128) as u64
}

/// The decoded OP_RETURN withdrawal instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpReturnPayload {
    /// Withdrawal recipient on the EVM chain.
    pub recipient: Address,

    /// Raw amounts, one or two tokens.
    pub amounts: [u64; 2],

    /// Number of amounts present (1 or 2).
    pub num_amounts: usize,

    /// Optional execution hash scheduling a handler call on claim.
    pub execution_hash: Option<[u8; 32]>,
}

impl OpReturnPayload {
    /// Decodes an OP_RETURN payload. Exact byte layouts (big-endian amounts):
    ///
    /// | length | layout |
    /// |--------|--------|
    /// | 28     | recipient(20) ‖ amount0(8) |
    /// | 36     | recipient(20) ‖ amount0(8) ‖ amount1(8) |
    /// | 60     | recipient(20) ‖ amount0(8) ‖ executionHash(32) |
    /// | 68     | recipient(20) ‖ amount0(8) ‖ amount1(8) ‖ executionHash(32) |
    pub fn decode(data: &[u8]) -> Result<Self, VaultError> {
        let (num_amounts, has_hash) = match data.len() {
            28 => (1, false),
            36 => (2, false),
            60 => (1, true),
            68 => (2, true),
            other => return Err(VaultError::InvalidOpReturnLength(other)),
        };

        let recipient = Address::from_slice(&data[..20]);
        if recipient == Address::ZERO {
            return Err(VaultError::InvalidRecipient);
        }

        let mut amounts = [0u64; 2];
        for (i, amount) in amounts.iter_mut().take(num_amounts).enumerate() {
            let raw = u64::from_be_bytes(data[20 + i * 8..28 + i * 8].try_into().expect("8 bytes"));
            // The wire encoding is a signed 64-bit integer; a set sign bit is invalid.
            if raw > i64::MAX as u64 {
                return Err(VaultError::AmountOutOfRange);
            }
            *amount = raw;
        }

        let execution_hash = has_hash.then(|| {
            let start = 20 + num_amounts * 8;
            let mut hash = [0u8; 32];
            hash.copy_from_slice(&data[start..start + 32]);
            hash
        });

        Ok(Self {
            recipient,
            amounts,
            num_amounts,
            execution_hash,
        })
    }

    /// Encodes the exact inverse of [`Self::decode`].
    pub fn encode(
        recipient: Address,
        amounts: &[u64],
        execution_hash: Option<&[u8]>,
    ) -> Result<Vec<u8>, VaultError> {
        if recipient == Address::ZERO {
            return Err(VaultError::InvalidRecipient);
        }
        if amounts.is_empty() || amounts.len() > 2 {
            return Err(VaultError::InvalidAmountCount(amounts.len()));
        }
        if let Some(hash) = execution_hash {
            if hash.len() != 32 {
                return Err(VaultError::InvalidExecutionHash(hash.len()));
            }
        }

        let mut out = Vec::with_capacity(20 + amounts.len() * 8 + 32);
        out.extend_from_slice(recipient.as_slice());
        for &amount in amounts {
            if amount > i64::MAX as u64 {
                return Err(VaultError::AmountOutOfRange);
            }
            out.extend_from_slice(&amount.to_be_bytes());
        }
        if let Some(hash) = execution_hash {
            out.extend_from_slice(hash);
        }
        Ok(out)
    }
}

/// A confirmed Bitcoin withdrawal transaction, decoded and ready for the vault engine.
///
/// Constructed once per confirmed transaction and immutable afterwards; the engine consumes it
/// to produce a state delta and claim/front transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpvWithdrawalData {
    txid: [u8; 32],
    block_hash: [u8; 32],
    vout: u32,
    spent_utxo: Utxo,
    payload: OpReturnPayload,
    fee_rate: PackedFeeRate,
    execution_expiry: u64,
}

impl SpvWithdrawalData {
    /// Builds withdrawal data from a confirmed transaction's parts and its OP_RETURN payload.
    pub fn new(
        txid: [u8; 32],
        block_hash: [u8; 32],
        vout: u32,
        spent_utxo: Utxo,
        op_return: &[u8],
        fee_rate: PackedFeeRate,
        execution_expiry: u64,
    ) -> Result<Self, VaultError> {
        Ok(Self {
            txid,
            block_hash,
            vout,
            spent_utxo,
            payload: OpReturnPayload::decode(op_return)?,
            fee_rate,
            execution_expiry,
        })
    }

    /// Transaction id, natural byte order.
    pub const fn txid(&self) -> [u8; 32] {
        self.txid
    }

    /// Hash of the block the transaction confirmed in.
    pub const fn block_hash(&self) -> [u8; 32] {
        self.block_hash
    }

    /// Output index of the withdrawal output.
    pub const fn vout(&self) -> u32 {
        self.vout
    }

    /// The vault UTXO this transaction declares it spends.
    pub const fn spent_utxo(&self) -> Utxo {
        self.spent_utxo
    }

    /// The decoded OP_RETURN instruction.
    pub const fn payload(&self) -> &OpReturnPayload {
        &self.payload
    }

    /// The packed fee-rate word.
    pub const fn fee_rate(&self) -> PackedFeeRate {
        self.fee_rate
    }

    /// Per-token caller fee.
    pub fn caller_fee(&self) -> [u64; 2] {
        self.payload
            .amounts
            .map(|a| apply_rate(a, self.fee_rate.caller_rate()))
    }

    /// Per-token fronting fee.
    pub fn fronting_fee(&self) -> [u64; 2] {
        self.payload
            .amounts
            .map(|a| apply_rate(a, self.fee_rate.fronting_rate()))
    }

    /// Execution handler fee; applies to token0 only.
    pub fn execution_fee(&self) -> u64 {
        apply_rate(self.payload.amounts[0], self.fee_rate.execution_rate())
    }

    /// Amounts a fronter must advance to the recipient immediately: the token0 amount plus the
    /// execution handler's fee share, token1 unaffected.
    pub fn fronting_amounts(&self) -> Result<[u64; 2], VaultError> {
        Ok([
            self.payload.amounts[0]
                .checked_add(self.execution_fee())
                .ok_or(VaultError::Arithmetic)?,
            self.payload.amounts[1],
        ])
    }

    /// Total per-token debit against the vault: amounts plus every fee share.
    pub fn total_debit(&self) -> Result<[u64; 2], VaultError> {
        let caller = self.caller_fee();
        let fronting = self.fronting_fee();

        let token0 = self.payload.amounts[0]
            .checked_add(caller[0])
            .and_then(|v| v.checked_add(fronting[0]))
            .and_then(|v| v.checked_add(self.execution_fee()))
            .ok_or(VaultError::Arithmetic)?;
        let token1 = self.payload.amounts[1]
            .checked_add(caller[1])
            .and_then(|v| v.checked_add(fronting[1]))
            .ok_or(VaultError::Arithmetic)?;

        Ok([token0, token1])
    }

    /// The idempotency key determining whether this withdrawal has already been fronted.
    ///
    /// A double keccak256 binding the canonical encoding of the withdrawal terms to the
    /// underlying Bitcoin txid, so no two distinct transactions (or term sets) collide.
    pub fn fronting_id(&self) -> B256 {
        let caller = self.caller_fee();
        let fronting = self.fronting_fee();
        let execution_hash = B256::from(self.payload.execution_hash.unwrap_or_default());

        let terms = (
            self.payload.recipient,
            self.payload.amounts[0],
            self.payload.amounts[1],
            caller[0],
            caller[1],
            fronting[0],
            fronting[1],
            self.execution_fee(),
            execution_hash,
            self.execution_expiry,
        )
            .abi_encode();

        let mut preimage = [0u8; 64];
        preimage[..32].copy_from_slice(keccak256(terms).as_slice());
        preimage[32..].copy_from_slice(&self.txid);
        keccak256(preimage)
    }
}
