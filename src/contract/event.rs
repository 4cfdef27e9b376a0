//! Events emitted during execution and stored in receipts.
//!
//! Explorers and cross-chain settlement decode events by their numeric
//! kind, so the discriminants below are frozen.

use crate::types::address::Address;
use nexus_derive::BinaryCodec;
use num_bigint::BigInt;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, BinaryCodec)]
pub enum EventKind {
    Unknown = 0,
    ChainCreate = 1,
    TokenCreate = 2,
    TokenSend = 3,
    TokenReceive = 4,
    TokenMint = 5,
    TokenBurn = 6,
    TokenStake = 7,
    TokenClaim = 8,
    AddressRegister = 9,
    AddressLink = 10,
    AddressUnlink = 11,
    OrganizationCreate = 12,
    OrganizationAdd = 13,
    OrganizationRemove = 14,
    GasEscrow = 15,
    GasPayment = 16,
    AddressUnregister = 17,
    OrderCreated = 18,
    OrderCancelled = 19,
    OrderFilled = 20,
    OrderClosed = 21,
    FeedCreate = 22,
    FeedUpdate = 23,
    FileCreate = 24,
    FileDelete = 25,
    ValidatorPropose = 26,
    ValidatorElect = 27,
    ValidatorRemove = 28,
    ValidatorSwitch = 29,
    PackedNFT = 30,
    ValueCreate = 31,
    ValueUpdate = 32,
    PollCreated = 33,
    PollClosed = 34,
    PollVote = 35,
    ChannelCreate = 36,
    ChannelRefill = 37,
    ChannelSettle = 38,
    LeaderboardCreate = 39,
    LeaderboardInsert = 40,
    LeaderboardReset = 41,
    PlatformCreate = 42,
    ChainSwap = 43,
    ContractRegister = 44,
    ContractDeploy = 45,
    AddressMigration = 46,
    ContractUpgrade = 47,
    Log = 48,
    Inflation = 49,
    OwnerAdded = 50,
    OwnerRemoved = 51,
    DomainCreate = 52,
    DomainDelete = 53,
    TaskStart = 54,
    TaskStop = 55,
    CrownRewards = 56,
    Infusion = 57,
    Crowdsale = 58,
    OrderBid = 59,
    ContractKill = 60,
    OrganizationKill = 61,
    MasterClaim = 62,
    ExecutionFailure = 63,
    /// First value available to contract-defined events.
    Custom = 64,
}

impl EventKind {
    const ALL: [EventKind; 65] = [
        EventKind::Unknown,
        EventKind::ChainCreate,
        EventKind::TokenCreate,
        EventKind::TokenSend,
        EventKind::TokenReceive,
        EventKind::TokenMint,
        EventKind::TokenBurn,
        EventKind::TokenStake,
        EventKind::TokenClaim,
        EventKind::AddressRegister,
        EventKind::AddressLink,
        EventKind::AddressUnlink,
        EventKind::OrganizationCreate,
        EventKind::OrganizationAdd,
        EventKind::OrganizationRemove,
        EventKind::GasEscrow,
        EventKind::GasPayment,
        EventKind::AddressUnregister,
        EventKind::OrderCreated,
        EventKind::OrderCancelled,
        EventKind::OrderFilled,
        EventKind::OrderClosed,
        EventKind::FeedCreate,
        EventKind::FeedUpdate,
        EventKind::FileCreate,
        EventKind::FileDelete,
        EventKind::ValidatorPropose,
        EventKind::ValidatorElect,
        EventKind::ValidatorRemove,
        EventKind::ValidatorSwitch,
        EventKind::PackedNFT,
        EventKind::ValueCreate,
        EventKind::ValueUpdate,
        EventKind::PollCreated,
        EventKind::PollClosed,
        EventKind::PollVote,
        EventKind::ChannelCreate,
        EventKind::ChannelRefill,
        EventKind::ChannelSettle,
        EventKind::LeaderboardCreate,
        EventKind::LeaderboardInsert,
        EventKind::LeaderboardReset,
        EventKind::PlatformCreate,
        EventKind::ChainSwap,
        EventKind::ContractRegister,
        EventKind::ContractDeploy,
        EventKind::AddressMigration,
        EventKind::ContractUpgrade,
        EventKind::Log,
        EventKind::Inflation,
        EventKind::OwnerAdded,
        EventKind::OwnerRemoved,
        EventKind::DomainCreate,
        EventKind::DomainDelete,
        EventKind::TaskStart,
        EventKind::TaskStop,
        EventKind::CrownRewards,
        EventKind::Infusion,
        EventKind::Crowdsale,
        EventKind::OrderBid,
        EventKind::ContractKill,
        EventKind::OrganizationKill,
        EventKind::MasterClaim,
        EventKind::ExecutionFailure,
        EventKind::Custom,
    ];

    pub fn from_u8(value: u8) -> Option<EventKind> {
        Self::ALL.get(value as usize).copied()
    }

    pub fn value(self) -> u8 {
        self as u8
    }

    /// Kinds only the engine may emit; scripts cannot notify them.
    pub fn is_system(self) -> bool {
        matches!(
            self,
            EventKind::TokenCreate
                | EventKind::TokenSend
                | EventKind::TokenReceive
                | EventKind::TokenMint
                | EventKind::TokenBurn
                | EventKind::TokenStake
                | EventKind::TokenClaim
                | EventKind::AddressRegister
                | EventKind::AddressUnregister
                | EventKind::AddressMigration
                | EventKind::GasEscrow
                | EventKind::GasPayment
                | EventKind::Inflation
                | EventKind::CrownRewards
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, BinaryCodec)]
pub struct Event {
    pub kind: EventKind,
    pub address: Address,
    /// Name of the context that emitted the event.
    pub contract: String,
    pub data: Vec<u8>,
}

impl Event {
    pub fn new(kind: EventKind, address: Address, contract: &str, data: Vec<u8>) -> Self {
        Self {
            kind,
            address,
            contract: contract.to_string(),
            data,
        }
    }
}

/// Payload of token send, receive, mint, burn and stake events.
#[derive(Debug, Clone, PartialEq, Eq, BinaryCodec)]
pub struct TokenEventData {
    pub symbol: String,
    pub value: BigInt,
    pub chain_name: String,
}

impl TokenEventData {
    pub fn new(symbol: &str, value: BigInt, chain_name: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            value,
            chain_name: chain_name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::encoding::{Decode, Encode};
    use crate::utils::test_utils::utils::user_address;

    #[test]
    fn kind_values_are_stable() {
        let pinned = [
            (EventKind::Unknown, 0),
            (EventKind::TokenCreate, 2),
            (EventKind::TokenSend, 3),
            (EventKind::TokenReceive, 4),
            (EventKind::TokenMint, 5),
            (EventKind::TokenBurn, 6),
            (EventKind::TokenStake, 7),
            (EventKind::TokenClaim, 8),
            (EventKind::AddressRegister, 9),
            (EventKind::GasEscrow, 15),
            (EventKind::GasPayment, 16),
            (EventKind::AddressUnregister, 17),
            (EventKind::PackedNFT, 30),
            (EventKind::ContractDeploy, 45),
            (EventKind::AddressMigration, 46),
            (EventKind::Log, 48),
            (EventKind::ExecutionFailure, 63),
            (EventKind::Custom, 64),
        ];
        for (kind, value) in pinned {
            assert_eq!(kind.value(), value, "{kind:?}");
        }
    }

    #[test]
    fn from_u8_matches_discriminants() {
        for value in 0..=64u8 {
            assert_eq!(EventKind::from_u8(value).map(EventKind::value), Some(value));
        }
        assert_eq!(EventKind::from_u8(65), None);
    }

    #[test]
    fn event_encoding_starts_with_kind_byte() {
        let data = TokenEventData::new("FUEL", BigInt::from(10), "main").to_bytes();
        let event = Event::new(EventKind::TokenSend, user_address(1), "entry", data.clone());
        let bytes = event.to_bytes();
        assert_eq!(bytes[0], 3);
        assert_eq!(Event::from_bytes(&bytes).unwrap(), event);
        let payload = TokenEventData::from_bytes(&data).unwrap();
        assert_eq!(payload.value, BigInt::from(10));
    }

    #[test]
    fn scripts_cannot_notify_token_events() {
        assert!(EventKind::TokenSend.is_system());
        assert!(!EventKind::Custom.is_system());
        assert!(!EventKind::Log.is_system());
    }
}
