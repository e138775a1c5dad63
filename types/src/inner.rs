//! Fixed-address system ("inner") contracts.

use crate::Address;

const fn system_address(last: u8) -> Address {
    let mut bytes = [0u8; 20];
    bytes[0] = 0x10;
    bytes[19] = last;
    Address::new(bytes)
}

/// System contracts implementing staking, delegation, governance and slashing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InnerContract {
    Restricting,
    Staking,
    Parameter,
    Slashing,
    Governance,
    DelegateReward,
}

impl InnerContract {
    pub const ALL: [InnerContract; 6] = [
        Self::Restricting,
        Self::Staking,
        Self::Parameter,
        Self::Slashing,
        Self::Governance,
        Self::DelegateReward,
    ];

    pub const fn address(&self) -> Address {
        match self {
            Self::Restricting => system_address(0x01),
            Self::Staking => system_address(0x02),
            Self::Parameter => system_address(0x03),
            Self::Slashing => system_address(0x04),
            Self::Governance => system_address(0x05),
            Self::DelegateReward => system_address(0x06),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Restricting => "RestrictingContract",
            Self::Staking => "StakingContract",
            Self::Parameter => "ParameterContract",
            Self::Slashing => "SlashingContract",
            Self::Governance => "GovernanceContract",
            Self::DelegateReward => "DelegateRewardContract",
        }
    }

    pub fn from_address(address: &Address) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.address() == *address)
    }
}

/// Whether `address` is one of the fixed system contracts.
pub fn is_inner_contract(address: &Address) -> bool {
    InnerContract::from_address(address).is_some()
}
