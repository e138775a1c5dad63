//! Block-level counters folded over a block's classified transactions.

use serde::{Deserialize, Serialize};

use crate::transaction::{ClassifiedTransaction, TxCategory};
use crate::TokenStandard;

/// Committed and published with the block it describes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockStats {
    pub tx_qty: u64,
    pub transfer_qty: u64,
    pub staking_qty: u64,
    pub delegate_qty: u64,
    pub proposal_qty: u64,
    /// Token transfers decoded from receipt logs, per standard.
    pub erc20_tx_qty: u64,
    pub erc721_tx_qty: u64,
    pub erc1155_tx_qty: u64,
    pub fee_total: u128,
    pub gas_limit_total: u128,
}

impl BlockStats {
    pub fn fold(transactions: &[ClassifiedTransaction]) -> Self {
        transactions.iter().fold(Self::default(), |mut acc, tx| {
            acc.tx_qty += 1;
            match tx.category() {
                TxCategory::Transfer => acc.transfer_qty += 1,
                TxCategory::Staking => acc.staking_qty += 1,
                TxCategory::Delegate => acc.delegate_qty += 1,
                TxCategory::Proposal => acc.proposal_qty += 1,
                TxCategory::Other => {}
            }
            for transfer in &tx.token_transfers {
                match transfer.standard {
                    TokenStandard::Erc20 => acc.erc20_tx_qty += 1,
                    TokenStandard::Erc721 => acc.erc721_tx_qty += 1,
                    TokenStandard::Erc1155 => acc.erc1155_tx_qty += 1,
                }
            }
            acc.fee_total = acc.fee_total.saturating_add(tx.fee);
            acc.gas_limit_total = acc.gas_limit_total.saturating_add(u128::from(tx.gas_limit));
            acc
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Address, AddressKind, Timestamp, TokenTransferRecord, TxHash, TxStatus, TxType,
    };

    fn tx(tx_type: TxType, fee: u128, gas_limit: u64) -> ClassifiedTransaction {
        ClassifiedTransaction {
            id: 0,
            hash: TxHash::ZERO,
            parent_hash: None,
            block_height: 1,
            block_time: Timestamp::new(0),
            index: 0,
            seq: 0,
            from: Address::ZERO,
            to: None,
            value: 0,
            input: vec![],
            tx_type,
            to_type: AddressKind::Account,
            info: serde_json::json!({}),
            gas_limit,
            gas_price: 0,
            gas_used: 0,
            fee,
            status: TxStatus::Success,
            fail_reason: None,
            contract_address: None,
            contract_kind: None,
            bin: None,
            method: None,
            virtual_transactions: vec![],
            embedded_transfers: vec![],
            token_transfers: vec![],
        }
    }

    fn token_transfer(standard: TokenStandard) -> TokenTransferRecord {
        TokenTransferRecord {
            seq: 100_000,
            parent_hash: TxHash::ZERO,
            block_height: 1,
            block_time: Timestamp::new(0),
            contract: Address::new([0xa1; 20]),
            standard,
            operator: None,
            from: Address::new([1; 20]),
            to: Address::new([2; 20]),
            value: 1,
            token_id: None,
        }
    }

    #[test]
    fn fold_counts_categories_and_sums() {
        let stats = BlockStats::fold(&[
            tx(TxType::Transfer, 10, 21_000),
            tx(TxType::StakeCreate, 20, 100_000),
            tx(TxType::DelegateExit, 5, 50_000),
            tx(TxType::ProposalVote, 1, 60_000),
            tx(TxType::ContractInvoke, 4, 70_000),
        ]);
        assert_eq!(stats.tx_qty, 5);
        assert_eq!(stats.transfer_qty, 1);
        assert_eq!(stats.staking_qty, 1);
        assert_eq!(stats.delegate_qty, 1);
        assert_eq!(stats.proposal_qty, 1);
        assert_eq!(stats.fee_total, 40);
        assert_eq!(stats.gas_limit_total, 301_000);
    }

    #[test]
    fn fold_counts_token_transfers_per_standard() {
        let mut invoke = tx(TxType::ContractInvoke, 0, 0);
        invoke.token_transfers = vec![
            token_transfer(TokenStandard::Erc20),
            token_transfer(TokenStandard::Erc20),
            token_transfer(TokenStandard::Erc721),
        ];
        let stats = BlockStats::fold(&[invoke, tx(TxType::Transfer, 0, 0)]);
        assert_eq!(stats.erc20_tx_qty, 2);
        assert_eq!(stats.erc721_tx_qty, 1);
        assert_eq!(stats.erc1155_tx_qty, 0);
        assert_eq!(stats.tx_qty, 2);
    }
}
