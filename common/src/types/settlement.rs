//! Settlement lifecycle types; one record per matched pair

use std::fmt::{Display, Formatter, Result as FmtResult};

use constants::Scalar;
use serde::{Deserialize, Serialize};

use super::MatchResult;

/// The role a signer plays in a settlement
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureRole {
    /// The buying counterparty
    Buyer,
    /// The selling counterparty
    Seller,
}

impl Display for SignatureRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            SignatureRole::Buyer => write!(f, "buyer"),
            SignatureRole::Seller => write!(f, "seller"),
        }
    }
}

/// The lifecycle states of a settlement record
///
/// Exactly one terminal transition occurs per record: either `Confirmed` or
/// `Failed`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettlementStatus {
    /// The pair has been matched but proving has not begun
    Matched,
    /// A proof worker is generating the settlement proof
    Proving,
    /// The proof is ready; neither party has signed
    AwaitingSignatures,
    /// Exactly one party has signed
    PartiallySigned,
    /// Both parties have signed; the transaction is being assembled
    SignaturesComplete,
    /// The settlement transaction has been submitted on-chain
    QueuedOnChain,
    /// The settlement was confirmed on-chain (terminal)
    Confirmed,
    /// The settlement failed (terminal)
    Failed,
}

impl SettlementStatus {
    /// Whether the status is terminal
    pub fn is_terminal(self) -> bool {
        matches!(self, SettlementStatus::Confirmed | SettlementStatus::Failed)
    }
}

impl Display for SettlementStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            SettlementStatus::Matched => "matched",
            SettlementStatus::Proving => "proving",
            SettlementStatus::AwaitingSignatures => "awaiting-signatures",
            SettlementStatus::PartiallySigned => "partially-signed",
            SettlementStatus::SignaturesComplete => "signatures-complete",
            SettlementStatus::QueuedOnChain => "queued-on-chain",
            SettlementStatus::Confirmed => "confirmed",
            SettlementStatus::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// The settlement record for a matched pair
///
/// Read-shared by the event gateway and the API surface; mutated only by
/// the settlement coordinator
#[derive(Clone, Debug)]
pub struct SettlementRecord {
    /// The identifier of the underlying match
    pub match_id: String,
    /// The asset the match executes on
    pub asset: String,
    /// The buying trader's address
    pub buyer: String,
    /// The selling trader's address
    pub seller: String,
    /// The current lifecycle state
    pub status: SettlementStatus,
    /// The nullifier for the pair, available once the proof is generated
    pub nullifier: Option<Scalar>,
    /// The encoded Groth16 proof, 256 bytes
    pub proof_bytes: Option<Vec<u8>>,
    /// The length-prefixed public signal encoding
    pub public_signals: Option<Vec<u8>>,
    /// Whether the buyer has signed the settlement intent
    pub buyer_signed: bool,
    /// Whether the seller has signed the settlement intent
    pub seller_signed: bool,
    /// The buyer's signature over the settlement intent
    pub buyer_signature: Option<String>,
    /// The seller's signature over the settlement intent
    pub seller_signature: Option<String>,
    /// The transaction hash, available once confirmed
    pub tx_hash: Option<String>,
    /// The failure reason for records in the `Failed` state
    pub error: Option<String>,
}

impl SettlementRecord {
    /// Create a fresh record for a new match
    pub fn new(match_result: &MatchResult) -> Self {
        Self {
            match_id: match_result.match_id.clone(),
            asset: match_result.asset().to_string(),
            buyer: match_result.buyer().to_string(),
            seller: match_result.seller().to_string(),
            status: SettlementStatus::Matched,
            nullifier: None,
            proof_bytes: None,
            public_signals: None,
            buyer_signed: false,
            seller_signed: false,
            buyer_signature: None,
            seller_signature: None,
            tx_hash: None,
            error: None,
        }
    }
}

/// The packet handed to the settlement sink for on-chain submission
#[derive(Clone, Debug)]
pub struct SettlementPacket {
    /// The identifier of the match being settled
    pub match_id: String,
    /// The encoded proof bytes
    pub proof_bytes: Vec<u8>,
    /// The encoded public signals
    pub public_signals: Vec<u8>,
    /// The pair's nullifier
    pub nullifier: Scalar,
    /// The buyer's signature over the settlement intent
    pub buyer_signature: String,
    /// The seller's signature over the settlement intent
    pub seller_signature: String,
}
