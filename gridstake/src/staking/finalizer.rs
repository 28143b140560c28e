// Copyright (c) 2024 Gridstake Developers

//! Claim attachment and block signing.

use thiserror::Error;
use tracing::{debug, warn};

use crate::block::Block;
use crate::claim::MiningId;
use crate::research::{BeaconError, IdentityProvider};
use crate::script::PublicKey;
use crate::transaction::TxOut;
use crate::wallet::{StakingWallet, WalletError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SigningError {
    #[error("block has no coinstake")]
    MissingCoinstake,
    #[error("expected {expected} spent outputs for the coinstake, got {got}")]
    SpentOutputs { expected: usize, got: usize },
    #[error("failed to sign research claim: {0}")]
    Claim(#[from] BeaconError),
    #[error("failed to sign coinstake input {index}: {source}")]
    Input { index: usize, source: WalletError },
    #[error("failed to sign block: {0}")]
    Header(WalletError),
}

/// Sign the research claim when the minting identity holds an active
/// beacon. Investors and researchers without a beacon go unsigned.
pub fn sign_claim<I: IdentityProvider + ?Sized>(identity: &I, block: &mut Block) -> Result<bool, SigningError> {
    let MiningId::Researcher(cpid) = block.claim.mining_id else {
        return Ok(false);
    };
    if !identity.has_active_beacon(&cpid) {
        debug!(cpid = %cpid, "No active beacon, claim left unsigned");
        return Ok(false);
    }
    let digest = block.claim.signing_hash(&block.claim.last_block_hash);
    let signature = identity.sign_with_beacon(&cpid, &digest)?;
    block.claim.signature = Some(signature);
    Ok(true)
}

/// Seal a fully assembled block.
///
/// Commits the claim to the coinbase, signs every coinstake input, fixes
/// the merkle root and signs the header hash with `stake_key`. `spent`
/// holds the outputs the coinstake inputs spend, in input order.
pub fn finalize_block<I, W>(
    identity: &I,
    wallet: &W,
    block: &mut Block,
    spent: &[TxOut],
    stake_key: &PublicKey,
) -> Result<(), SigningError>
where
    I: IdentityProvider + ?Sized,
    W: StakingWallet + ?Sized,
{
    if block.transactions.len() < 2 {
        return Err(SigningError::MissingCoinstake);
    }

    sign_claim(identity, block)?;
    let claim_hash = block.claim.hash();
    block.transactions[0].claim_hash = Some(claim_hash);

    let coinstake = &mut block.transactions[1];
    if coinstake.inputs.len() != spent.len() {
        return Err(SigningError::SpentOutputs {
            expected: coinstake.inputs.len(),
            got: spent.len(),
        });
    }
    for (index, output) in spent.iter().enumerate() {
        wallet
            .sign_input(coinstake, index, output)
            .map_err(|source| SigningError::Input { index, source })?;
    }

    block.header.merkle_root = block.compute_merkle_root();
    let header_hash = block.hash();
    block.signature = wallet.sign_digest(stake_key, &header_hash).map_err(|e| {
        warn!(error = %e, "Block signing failed");
        SigningError::Header(e)
    })?;

    debug!(hash = %header_hash.short(), claim = %claim_hash.short(), "Block signed");
    Ok(())
}
