//! Inner-contract call decoding and payload inspection.
//!
//! System contract input is an RLP list. The first item holds the RLP
//! encoding of a `u16` function code; the remaining items are the call's
//! arguments.

use rlp::{DecoderError, Rlp};
use scan_types::{InnerContract, Log, TxType};
use serde_json::{json, Value};
use thiserror::Error;

/// Leading bytes of a WebAssembly module.
pub const WASM_MAGIC: [u8; 4] = [0x00, 0x61, 0x73, 0x6d];

/// Bytes in a general contract method selector.
pub const SELECTOR_LEN: usize = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("input is not an RLP list")]
    NotAList,

    #[error("input list is empty")]
    Empty,

    #[error("malformed RLP: {0}")]
    Rlp(String),

    #[error("unknown function code {0}")]
    UnknownFunction(u16),

    #[error("reward of {0} bytes does not fit in 128 bits")]
    RewardTooLarge(usize),
}

impl From<DecoderError> for DecodeError {
    fn from(e: DecoderError) -> Self {
        Self::Rlp(e.to_string())
    }
}

/// A decoded system contract call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InnerCall {
    pub function_code: u16,
    pub tx_type: TxType,
    /// Raw argument items following the function code.
    pub args: Vec<Vec<u8>>,
}

/// Decode the function code and arguments of an inner-contract call.
pub fn decode_inner_call(input: &[u8]) -> Result<InnerCall, DecodeError> {
    let list = Rlp::new(input);
    if !list.is_list() {
        return Err(DecodeError::NotAList);
    }
    let count = list.item_count()?;
    if count == 0 {
        return Err(DecodeError::Empty);
    }
    let code_item = list.at(0)?;
    let function_code: u16 = rlp::decode(code_item.data()?)?;
    let tx_type =
        TxType::from_function_code(function_code).ok_or(DecodeError::UnknownFunction(function_code))?;

    let mut args = Vec::with_capacity(count - 1);
    for i in 1..count {
        let item = list.at(i)?;
        // Nested lists are passed through in their encoded form.
        let bytes = if item.is_list() {
            item.as_raw().to_vec()
        } else {
            item.data()?.to_vec()
        };
        args.push(bytes);
    }

    Ok(InnerCall {
        function_code,
        tx_type,
        args,
    })
}

/// Decodes the business parameters of a typed inner call.
pub trait ParamDecoder: Send + Sync {
    fn decode(&self, call: &InnerCall) -> Result<Value, DecodeError>;
}

/// Emits the function code and hex-encoded arguments.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultParamDecoder;

impl ParamDecoder for DefaultParamDecoder {
    fn decode(&self, call: &InnerCall) -> Result<Value, DecodeError> {
        let args: Vec<String> = call
            .args
            .iter()
            .map(|a| format!("0x{}", hex::encode(a)))
            .collect();
        Ok(json!({
            "functionType": call.function_code,
            "args": args,
        }))
    }
}

/// Whether a creation payload deploys a WASM module, either directly or as
/// the first item of an RLP deployment list.
pub fn is_wasm_payload(input: &[u8]) -> bool {
    if input.starts_with(&WASM_MAGIC) {
        return true;
    }
    let list = Rlp::new(input);
    if !list.is_list() {
        return false;
    }
    list.at(0)
        .and_then(|item| item.data().map(|d| d.starts_with(&WASM_MAGIC)))
        .unwrap_or(false)
}

/// Reward paid out by a delegation exit, read from the receipt log the
/// staking contract emits.
///
/// The log data is an RLP list `[code, reward]`; `code` 0 means the exit
/// succeeded and `reward` is a big-endian integer. Returns `None` when there
/// is no such log or it reports a failure.
pub fn decode_delegate_reward(logs: &[Log]) -> Result<Option<u128>, DecodeError> {
    let staking = InnerContract::Staking.address();
    let Some(log) = logs.iter().find(|log| log.address == staking) else {
        return Ok(None);
    };
    let list = Rlp::new(&log.data);
    if !list.is_list() {
        return Err(DecodeError::NotAList);
    }
    if list.item_count()? < 2 {
        return Err(DecodeError::Empty);
    }
    let code: u64 = list.val_at(0)?;
    if code != 0 {
        return Ok(None);
    }
    let reward = list.at(1)?.data()?;
    if reward.len() > 16 {
        return Err(DecodeError::RewardTooLarge(reward.len()));
    }
    let mut bytes = [0u8; 16];
    bytes[16 - reward.len()..].copy_from_slice(reward);
    Ok(Some(u128::from_be_bytes(bytes)))
}

/// Hex of the four-byte method selector, if the input is long enough.
pub fn method_selector(input: &[u8]) -> Option<String> {
    input
        .get(..SELECTOR_LEN)
        .map(|selector| format!("0x{}", hex::encode(selector)))
}
