//! Token event signatures and transfer log decoding.
//!
//! On a generic contract a signature match only queues the contract for an
//! interface probe; the probe decides. On a registered token contract the
//! matching logs are decoded into transfers.

use scan_types::{Address, ContractKind, Log, Receipt, TokenStandard, Topic};
use std::collections::BTreeSet;
use thiserror::Error;

/// `Transfer(address,address,uint256)`, shared by ERC20 and ERC721.
pub const TRANSFER_EVENT: Topic = Topic::new([
    0xdd, 0xf2, 0x52, 0xad, 0x1b, 0xe2, 0xc8, 0x9b, 0x69, 0xc2, 0xb0, 0x68, 0xfc, 0x37, 0x8d, 0xaa,
    0x95, 0x2b, 0xa7, 0xf1, 0x63, 0xc4, 0xa1, 0x16, 0x28, 0xf5, 0x5a, 0x4d, 0xf5, 0x23, 0xb3, 0xef,
]);

/// ERC1155 `TransferSingle(address,address,address,uint256,uint256)`.
pub const TRANSFER_SINGLE_EVENT: Topic = Topic::new([
    0xc3, 0xd5, 0x81, 0x68, 0xc5, 0xae, 0x73, 0x97, 0x73, 0x1d, 0x06, 0x3d, 0x5b, 0xbf, 0x3d, 0x65,
    0x78, 0x54, 0x42, 0x73, 0x43, 0xf4, 0xc0, 0x83, 0x24, 0x0f, 0x7a, 0xac, 0xaa, 0x2d, 0x0f, 0x62,
]);

/// ERC1155 `TransferBatch(address,address,address,uint256[],uint256[])`.
pub const TRANSFER_BATCH_EVENT: Topic = Topic::new([
    0x4a, 0x39, 0xdc, 0x06, 0xd4, 0xc0, 0xdb, 0xc6, 0x4b, 0x70, 0xaf, 0x90, 0xfd, 0x69, 0x8a, 0x23,
    0x3a, 0x51, 0x8a, 0xa5, 0xd0, 0x7e, 0x59, 0x5d, 0x98, 0x3b, 0x8c, 0x05, 0x26, 0xc8, 0xf7, 0xfb,
]);

pub fn is_token_event(topic0: &Topic) -> bool {
    *topic0 == TRANSFER_EVENT || *topic0 == TRANSFER_SINGLE_EVENT || *topic0 == TRANSFER_BATCH_EVENT
}

/// Emitters of token-shaped events in a receipt.
pub fn token_event_addresses(receipt: &Receipt) -> BTreeSet<Address> {
    receipt
        .logs
        .iter()
        .filter(|log| log.topics.first().is_some_and(is_token_event))
        .map(|log| log.address)
        .collect()
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenLogError {
    #[error("{standard:?} transfer log has {topics} topics and {data} data bytes")]
    Shape {
        standard: TokenStandard,
        topics: usize,
        data: usize,
    },

    #[error("transfer amount does not fit in 128 bits")]
    AmountOverflow,
}

/// One token movement read from a transfer log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenTransfer {
    pub standard: TokenStandard,
    pub operator: Option<Address>,
    pub from: Address,
    pub to: Address,
    pub value: u128,
    pub token_id: Option<String>,
}

/// Decode `log` as a transfer of a contract registered as `kind`.
///
/// `Ok(None)` for logs that are not single transfers of that standard.
/// ERC1155 `TransferBatch` is not decoded.
pub fn decode_token_transfer(log: &Log, kind: ContractKind) -> Result<Option<TokenTransfer>, TokenLogError> {
    let Some(topic0) = log.topics.first() else {
        return Ok(None);
    };
    let (standard, expected_topics, expected_data) = match kind {
        ContractKind::Erc20Evm if *topic0 == TRANSFER_EVENT => (TokenStandard::Erc20, 3, 32),
        ContractKind::Erc721Evm if *topic0 == TRANSFER_EVENT => (TokenStandard::Erc721, 4, 0),
        ContractKind::Erc1155Evm if *topic0 == TRANSFER_SINGLE_EVENT => (TokenStandard::Erc1155, 4, 64),
        _ => return Ok(None),
    };
    let topics = &log.topics;
    let data = &log.data;
    if topics.len() != expected_topics || data.len() < expected_data {
        return Err(TokenLogError::Shape {
            standard,
            topics: topics.len(),
            data: data.len(),
        });
    }

    let transfer = match standard {
        TokenStandard::Erc20 => TokenTransfer {
            standard,
            operator: None,
            from: topic_address(&topics[1]),
            to: topic_address(&topics[2]),
            value: word_to_u128(&data[..32])?,
            token_id: None,
        },
        TokenStandard::Erc721 => TokenTransfer {
            standard,
            operator: None,
            from: topic_address(&topics[1]),
            to: topic_address(&topics[2]),
            value: 1,
            token_id: Some(word_hex(topics[3].as_bytes())),
        },
        TokenStandard::Erc1155 => TokenTransfer {
            standard,
            operator: Some(topic_address(&topics[1])),
            from: topic_address(&topics[2]),
            to: topic_address(&topics[3]),
            value: word_to_u128(&data[32..64])?,
            token_id: Some(word_hex(&data[..32])),
        },
    };
    Ok(Some(transfer))
}

/// Indexed address parameters are left-padded to 32 bytes.
fn topic_address(topic: &Topic) -> Address {
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&topic.as_bytes()[12..]);
    Address::new(bytes)
}

fn word_to_u128(word: &[u8]) -> Result<u128, TokenLogError> {
    let (high, low) = word.split_at(16);
    if high.iter().any(|b| *b != 0) {
        return Err(TokenLogError::AmountOverflow);
    }
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(low);
    Ok(u128::from_be_bytes(bytes))
}

/// Minimal hex of a 32-byte word, `0x0` for zero.
fn word_hex(word: &[u8]) -> String {
    let digits = hex::encode(word);
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        "0x0".to_string()
    } else {
        format!("0x{trimmed}")
    }
}
