//! Business analyzers: node operations and rewards derived from a
//! classified block.
//!
//! Analyzers run in registration order after sequencing and before the
//! commit. Their output is committed and published with the block.

use scan_analyzer::AddressStatsCache;
use scan_chain::ChainClient;
use scan_types::{
    ClassifiedTransaction, InnerContract, NodeOperation, NodeOperationKind, RawBlock, RewardClaim,
    TxType,
};
use tracing::debug;

use crate::node_cache::NodeCache;
use crate::CycleError;

/// Read-only view of a classified block.
pub struct BusinessInput<'a> {
    pub block: &'a RawBlock,
    /// Sorted by index, ids assigned.
    pub transactions: &'a [ClassifiedTransaction],
    pub addresses: &'a AddressStatsCache,
    pub nodes: &'a NodeCache,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BusinessOutput {
    pub node_operations: Vec<NodeOperation>,
    pub rewards: Vec<RewardClaim>,
}

pub trait BusinessAnalyzer: Send + Sync {
    fn name(&self) -> &'static str;

    fn analyze(
        &self,
        input: &BusinessInput<'_>,
        client: &dyn ChainClient,
        output: &mut BusinessOutput,
    ) -> Result<(), CycleError>;
}

/// The analyzers every pipeline starts with.
pub fn default_analyzers() -> Vec<Box<dyn BusinessAnalyzer>> {
    vec![
        Box::new(StakingOperationAnalyzer),
        Box::new(RewardClaimAnalyzer),
    ]
}

/// Node history: stake operations, duplicate-sign reports and slashes.
#[derive(Clone, Copy, Debug, Default)]
pub struct StakingOperationAnalyzer;

impl StakingOperationAnalyzer {
    fn operation_kind(tx_type: TxType) -> Option<(NodeOperationKind, Option<usize>)> {
        // Position of the node id among the call arguments.
        let op = match tx_type {
            TxType::StakeCreate => (NodeOperationKind::Create, Some(2)),
            TxType::StakeModify => (NodeOperationKind::Modify, Some(1)),
            TxType::StakeIncrease => (NodeOperationKind::Increase, Some(0)),
            TxType::StakeExit => (NodeOperationKind::Exit, Some(0)),
            TxType::Report => (NodeOperationKind::Report, None),
            _ => return None,
        };
        Some(op)
    }

    fn node_id(tx: &ClassifiedTransaction, arg: Option<usize>) -> String {
        if let Some(id) = tx.info.get("nodeId").and_then(|v| v.as_str()) {
            return id.to_string();
        }
        arg.and_then(|i| tx.info.get("args")?.get(i)?.as_str().map(str::to_string))
            .unwrap_or_else(|| tx.from.to_string())
    }

    fn operation_for(tx: &ClassifiedTransaction, nodes: &NodeCache) -> Option<NodeOperation> {
        if !tx.status.is_success() {
            return None;
        }
        let (kind, arg) = Self::operation_kind(tx.tx_type)?;
        let node_id = Self::node_id(tx, arg);
        Some(NodeOperation {
            node_name: nodes.name_of(&node_id),
            node_id,
            kind,
            block_height: tx.block_height,
            tx_hash: Some(tx.hash),
            description: format!("{:?} from {}", tx.tx_type, tx.from),
        })
    }
}

impl BusinessAnalyzer for StakingOperationAnalyzer {
    fn name(&self) -> &'static str {
        "staking"
    }

    fn analyze(
        &self,
        input: &BusinessInput<'_>,
        client: &dyn ChainClient,
        output: &mut BusinessOutput,
    ) -> Result<(), CycleError> {
        for tx in input.transactions {
            let children = tx.virtual_transactions.iter();
            for candidate in std::iter::once(tx).chain(children) {
                if let Some(op) = Self::operation_for(candidate, input.nodes) {
                    output.node_operations.push(op);
                }
            }
        }

        let height = input.block.height;
        for evidence in client.fetch_historical_slash_evidence(height)? {
            debug!(height, node = %evidence.node_id, "slash evidence");
            output.node_operations.push(NodeOperation {
                node_name: input.nodes.name_of(&evidence.node_id),
                node_id: evidence.node_id,
                kind: NodeOperationKind::Slash,
                block_height: height,
                tx_hash: None,
                description: format!("slashed {} for {}", evidence.amount, evidence.reason),
            });
        }
        Ok(())
    }
}

/// Delegation rewards paid out to delegators.
///
/// A claim pays through embedded transfers from the reward contract to the
/// claimer. A delegation exit pays the reward recorded in its `info`.
#[derive(Clone, Copy, Debug, Default)]
pub struct RewardClaimAnalyzer;

impl RewardClaimAnalyzer {
    fn claimed(tx: &ClassifiedTransaction) -> Result<u128, CycleError> {
        let reward_contract = InnerContract::DelegateReward.address();
        let mut amount: u128 = 0;
        for transfer in &tx.embedded_transfers {
            if transfer.from == reward_contract && transfer.to == tx.from {
                amount = amount.checked_add(transfer.value).ok_or_else(|| {
                    CycleError::ConsistencyViolation(format!("reward overflow in {}", tx.hash))
                })?;
            }
        }
        Ok(amount)
    }

    fn exit_reward(tx: &ClassifiedTransaction) -> Result<u128, CycleError> {
        let Some(reward) = tx.info.get("reward") else {
            return Ok(0);
        };
        reward
            .as_str()
            .and_then(|r| r.parse::<u128>().ok())
            .ok_or_else(|| {
                CycleError::ConsistencyViolation(format!("unreadable exit reward {reward} in {}", tx.hash))
            })
    }
}

impl BusinessAnalyzer for RewardClaimAnalyzer {
    fn name(&self) -> &'static str {
        "reward"
    }

    fn analyze(
        &self,
        input: &BusinessInput<'_>,
        _client: &dyn ChainClient,
        output: &mut BusinessOutput,
    ) -> Result<(), CycleError> {
        for tx in input.transactions {
            if !tx.status.is_success() {
                continue;
            }
            let amount = match tx.tx_type {
                TxType::ClaimRewards => Self::claimed(tx)?,
                TxType::DelegateExit => Self::exit_reward(tx)?,
                _ => continue,
            };
            if amount > 0 {
                output.rewards.push(RewardClaim {
                    address: tx.from,
                    amount,
                });
            }
        }
        Ok(())
    }
}
