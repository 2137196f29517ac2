//! Call payloads carried in a transaction's `data`
//!
//! A finalized transaction with non-empty `data` invokes one [`Call`] on
//! its target, with the finalizing wallet as the caller. Payloads are
//! JSON, e.g. `{"create_wallet":{"required_approvals":2,"signatories":[..]}}`.

use crate::core::Address;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Call {
    /// Registry: create a wallet owned by the caller
    CreateWallet {
        required_approvals: u64,
        signatories: Vec<Address>,
    },
    /// Wallet: propose a transaction
    InitiateTransaction {
        to: Address,
        value: u128,
        #[serde(default, with = "hex::serde")]
        data: Vec<u8>,
        #[serde(default, with = "hex::serde")]
        metadata: Vec<u8>,
    },
    /// Wallet: approve or reject
    VoteForTransaction { transaction_id: u64, approve: bool },
    /// Wallet: withdraw a vote
    ResetVote { transaction_id: u64 },
    /// Wallet: execute a transaction that reached quorum
    FinalizeTransaction { transaction_id: u64 },
}

impl Call {
    /// Encode as transaction data
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decode transaction data
    pub fn decode(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }

    /// Method name, for error reporting
    pub fn method(&self) -> &'static str {
        match self {
            Call::CreateWallet { .. } => "create_wallet",
            Call::InitiateTransaction { .. } => "initiate_transaction",
            Call::VoteForTransaction { .. } => "vote_for_transaction",
            Call::ResetVote { .. } => "reset_vote",
            Call::FinalizeTransaction { .. } => "finalize_transaction",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_wallet_payload_shape() {
        let call = Call::CreateWallet {
            required_approvals: 4,
            signatories: vec![Address::from("a"), Address::from("b")],
        };

        let data = call.encode().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&data).unwrap();
        assert_eq!(json["create_wallet"]["required_approvals"], 4);
        assert_eq!(Call::decode(&data).unwrap(), call);
    }

    #[test]
    fn test_decode_hand_written_payload() {
        let data = br#"{"initiate_transaction":{"to":"0xbob","value":5,"metadata":"6869"}}"#;
        let call = Call::decode(data).unwrap();

        assert_eq!(
            call,
            Call::InitiateTransaction {
                to: Address::from("0xbob"),
                value: 5,
                data: vec![],
                metadata: b"hi".to_vec(),
            }
        );
        assert_eq!(call.method(), "initiate_transaction");
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(Call::decode(b"\x00\x01").is_err());
        assert!(Call::decode(br#"{"self_destruct":{}}"#).is_err());
    }
}
