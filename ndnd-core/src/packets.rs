use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::name::Name;
use crate::tlv::{self, TlvElement, TlvError};

/// TLV type constants for NDN packets
pub mod tlv_types {
    pub const INTEREST: u32 = 0x05;
    pub const DATA: u32 = 0x06;
    pub const NAME: u32 = 0x07;
    pub const CAN_BE_PREFIX: u32 = 0x21;
    pub const MUST_BE_FRESH: u32 = 0x12;
    pub const FORWARDING_HINT: u32 = 0x1E;
    pub const NONCE: u32 = 0x0A;
    pub const INTEREST_LIFETIME: u32 = 0x0C;
    pub const HOP_LIMIT: u32 = 0x22;
    pub const META_INFO: u32 = 0x14;
    pub const CONTENT: u32 = 0x15;
    pub const FRESHNESS_PERIOD: u32 = 0x19;
    pub const FINAL_BLOCK_ID: u32 = 0x1A;
    pub const NACK: u32 = 0x0320;
    pub const NACK_REASON: u32 = 0x0321;
}

/// Default Interest lifetime when the packet carries none
pub const DEFAULT_INTEREST_LIFETIME: Duration = Duration::from_millis(4000);

/// Interest packet structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interest {
    pub name: Name,
    pub can_be_prefix: bool,
    pub must_be_fresh: bool,
    /// Delegation names toward the producer region, in preference order
    pub forwarding_hint: Vec<Name>,
    pub nonce: Option<u32>,
    pub lifetime: Option<Duration>,
    pub hop_limit: Option<u8>,
}

impl Interest {
    /// Create a new Interest with the given name
    pub fn new(name: Name) -> Self {
        Self {
            name,
            can_be_prefix: false,
            must_be_fresh: false,
            forwarding_hint: Vec::new(),
            nonce: None,
            lifetime: None,
            hop_limit: None,
        }
    }

    /// Set the CanBePrefix flag
    pub fn with_can_be_prefix(mut self, can_be_prefix: bool) -> Self {
        self.can_be_prefix = can_be_prefix;
        self
    }

    /// Set the MustBeFresh flag
    pub fn with_must_be_fresh(mut self, must_be_fresh: bool) -> Self {
        self.must_be_fresh = must_be_fresh;
        self
    }

    /// Set the forwarding hint delegations
    pub fn with_forwarding_hint(mut self, delegations: Vec<Name>) -> Self {
        self.forwarding_hint = delegations;
        self
    }

    /// Set the nonce for this Interest
    pub fn with_nonce(mut self, nonce: u32) -> Self {
        self.nonce = Some(nonce);
        self
    }

    /// Set the interest lifetime
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = Some(lifetime);
        self
    }

    /// Set the hop limit
    pub fn with_hop_limit(mut self, hop_limit: u8) -> Self {
        self.hop_limit = Some(hop_limit);
        self
    }

    /// Generate a random nonce if none is set
    pub fn ensure_nonce(&mut self) {
        if self.nonce.is_none() {
            self.nonce = Some(rand::random::<u32>());
        }
    }

    /// Lifetime carried by the packet, or the protocol default
    pub fn lifetime_or_default(&self) -> Duration {
        self.lifetime.unwrap_or(DEFAULT_INTEREST_LIFETIME)
    }

    /// Check if the Interest can be satisfied by a Data packet with the given name
    pub fn matches_data(&self, data_name: &Name) -> bool {
        if self.can_be_prefix {
            self.name.is_prefix_of(data_name)
        } else {
            self.name == *data_name
        }
    }

    /// Encode Interest packet to TLV wire format
    pub fn encode(&self) -> Result<Vec<u8>, TlvError> {
        let mut elements = Vec::new();

        elements.push(TlvElement::decode(&self.name.encode()?)?.0);

        if self.can_be_prefix {
            elements.push(TlvElement::new(tlv_types::CAN_BE_PREFIX, vec![]));
        }

        if self.must_be_fresh {
            elements.push(TlvElement::new(tlv_types::MUST_BE_FRESH, vec![]));
        }

        if !self.forwarding_hint.is_empty() {
            let mut delegations = Vec::new();
            for delegation in &self.forwarding_hint {
                delegations.push(TlvElement::decode(&delegation.encode()?)?.0);
            }
            elements.push(TlvElement::new(
                tlv_types::FORWARDING_HINT,
                tlv::encode_tlv_sequence(&delegations)?,
            ));
        }

        if let Some(nonce) = self.nonce {
            elements.push(TlvElement::new(tlv_types::NONCE, nonce.to_be_bytes().to_vec()));
        }

        if let Some(lifetime) = self.lifetime {
            elements.push(TlvElement::new(
                tlv_types::INTEREST_LIFETIME,
                tlv::encode_nni(lifetime.as_millis() as u64),
            ));
        }

        if let Some(hop_limit) = self.hop_limit {
            elements.push(TlvElement::new(tlv_types::HOP_LIMIT, vec![hop_limit]));
        }

        let interest_content = tlv::encode_tlv_sequence(&elements)?;
        TlvElement::new(tlv_types::INTEREST, interest_content).encode()
    }

    /// Decode Interest packet from TLV wire format
    pub fn decode(data: &[u8]) -> Result<(Self, usize), TlvError> {
        let (interest_element, consumed) = TlvElement::decode(data)?;

        if interest_element.type_ != tlv_types::INTEREST {
            return Err(TlvError::InvalidType(interest_element.type_));
        }

        let interest = Self::decode_value(&interest_element.value)?;
        Ok((interest, consumed))
    }

    fn decode_value(value: &[u8]) -> Result<Self, TlvError> {
        let mut name = None;
        let mut can_be_prefix = false;
        let mut must_be_fresh = false;
        let mut forwarding_hint = Vec::new();
        let mut nonce = None;
        let mut lifetime = None;
        let mut hop_limit = None;

        for element in tlv::decode_tlv_sequence(value)? {
            match element.type_ {
                tlv_types::NAME => {
                    name = Some(Name::decode_value(&element.value)?);
                }
                tlv_types::CAN_BE_PREFIX => {
                    can_be_prefix = true;
                }
                tlv_types::MUST_BE_FRESH => {
                    must_be_fresh = true;
                }
                tlv_types::FORWARDING_HINT => {
                    for delegation in tlv::decode_tlv_sequence(&element.value)? {
                        if delegation.type_ == tlv_types::NAME {
                            forwarding_hint.push(Name::decode_value(&delegation.value)?);
                        }
                    }
                }
                tlv_types::NONCE => {
                    if element.value.len() == 4 {
                        nonce = Some(u32::from_be_bytes([
                            element.value[0],
                            element.value[1],
                            element.value[2],
                            element.value[3],
                        ]));
                    }
                }
                tlv_types::INTEREST_LIFETIME => {
                    lifetime = Some(Duration::from_millis(tlv::decode_nni(&element.value)?));
                }
                tlv_types::HOP_LIMIT => {
                    if !element.value.is_empty() {
                        hop_limit = Some(element.value[0]);
                    }
                }
                _ => {} // Ignore unknown elements
            }
        }

        let name = name.ok_or(TlvError::InvalidType(tlv_types::NAME))?;

        Ok(Interest {
            name,
            can_be_prefix,
            must_be_fresh,
            forwarding_hint,
            nonce,
            lifetime,
            hop_limit,
        })
    }
}

/// Data packet structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Data {
    pub name: Name,
    pub freshness_period: Option<Duration>,
    pub final_block_id: Option<Vec<u8>>,
    pub content: Vec<u8>,
}

impl Data {
    /// Create a new Data packet with the given name and content
    pub fn new(name: Name, content: Vec<u8>) -> Self {
        Self {
            name,
            freshness_period: None,
            final_block_id: None,
            content,
        }
    }

    /// Set the freshness period
    pub fn with_freshness_period(mut self, freshness_period: Duration) -> Self {
        self.freshness_period = Some(freshness_period);
        self
    }

    /// Set the final block id
    pub fn with_final_block_id(mut self, final_block_id: Vec<u8>) -> Self {
        self.final_block_id = Some(final_block_id);
        self
    }

    /// Whether this Data can satisfy a MustBeFresh Interest at all.
    ///
    /// A missing or zero freshness period means immediately non-fresh.
    pub fn can_satisfy_fresh(&self) -> bool {
        matches!(self.freshness_period, Some(p) if p > Duration::ZERO)
    }

    /// Check if this Data packet matches the given Interest
    pub fn matches_interest(&self, interest: &Interest) -> bool {
        interest.matches_data(&self.name)
    }

    /// Encode Data packet to TLV wire format
    pub fn encode(&self) -> Result<Vec<u8>, TlvError> {
        let mut elements = Vec::new();

        elements.push(TlvElement::decode(&self.name.encode()?)?.0);

        if self.freshness_period.is_some() || self.final_block_id.is_some() {
            let mut meta = Vec::new();
            if let Some(freshness) = self.freshness_period {
                meta.push(TlvElement::new(
                    tlv_types::FRESHNESS_PERIOD,
                    tlv::encode_nni(freshness.as_millis() as u64),
                ));
            }
            if let Some(final_block_id) = &self.final_block_id {
                meta.push(TlvElement::new(tlv_types::FINAL_BLOCK_ID, final_block_id.clone()));
            }
            elements.push(TlvElement::new(tlv_types::META_INFO, tlv::encode_tlv_sequence(&meta)?));
        }

        elements.push(TlvElement::new(tlv_types::CONTENT, self.content.clone()));

        let data_content = tlv::encode_tlv_sequence(&elements)?;
        TlvElement::new(tlv_types::DATA, data_content).encode()
    }

    /// Decode Data packet from TLV wire format
    pub fn decode(data: &[u8]) -> Result<(Self, usize), TlvError> {
        let (data_element, consumed) = TlvElement::decode(data)?;

        if data_element.type_ != tlv_types::DATA {
            return Err(TlvError::InvalidType(data_element.type_));
        }

        let decoded = Self::decode_value(&data_element.value)?;
        Ok((decoded, consumed))
    }

    fn decode_value(value: &[u8]) -> Result<Self, TlvError> {
        let mut name = None;
        let mut freshness_period = None;
        let mut final_block_id = None;
        let mut content = None;

        for element in tlv::decode_tlv_sequence(value)? {
            match element.type_ {
                tlv_types::NAME => {
                    name = Some(Name::decode_value(&element.value)?);
                }
                tlv_types::META_INFO => {
                    for meta in tlv::decode_tlv_sequence(&element.value)? {
                        match meta.type_ {
                            tlv_types::FRESHNESS_PERIOD => {
                                freshness_period =
                                    Some(Duration::from_millis(tlv::decode_nni(&meta.value)?));
                            }
                            tlv_types::FINAL_BLOCK_ID => {
                                final_block_id = Some(meta.value);
                            }
                            _ => {}
                        }
                    }
                }
                tlv_types::CONTENT => {
                    content = Some(element.value);
                }
                _ => {} // Ignore unknown elements
            }
        }

        let name = name.ok_or(TlvError::InvalidType(tlv_types::NAME))?;

        Ok(Data {
            name,
            freshness_period,
            final_block_id,
            content: content.unwrap_or_default(),
        })
    }
}

/// Reason code carried by a Nack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NackReason {
    Congestion,
    Duplicate,
    NoRoute,
}

impl NackReason {
    /// Numeric wire code
    pub fn code(self) -> u64 {
        match self {
            NackReason::Congestion => 50,
            NackReason::Duplicate => 100,
            NackReason::NoRoute => 150,
        }
    }

    /// Decode a wire code; unknown codes are treated as the most severe
    pub fn from_code(code: u64) -> Self {
        match code {
            50 => NackReason::Congestion,
            100 => NackReason::Duplicate,
            _ => NackReason::NoRoute,
        }
    }

    /// Lower code means less severe; used when collapsing several Nacks
    pub fn less_severe(self, other: NackReason) -> NackReason {
        if self.code() <= other.code() {
            self
        } else {
            other
        }
    }
}

/// Negative acknowledgement referring to an outstanding Interest by nonce
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nack {
    pub reason: NackReason,
    pub interest: Interest,
}

impl Nack {
    pub fn new(reason: NackReason, interest: Interest) -> Self {
        Self { reason, interest }
    }

    /// Encode Nack to TLV wire format
    pub fn encode(&self) -> Result<Vec<u8>, TlvError> {
        let elements = vec![
            TlvElement::new(tlv_types::NACK_REASON, tlv::encode_nni(self.reason.code())),
            TlvElement::decode(&self.interest.encode()?)?.0,
        ];
        let content = tlv::encode_tlv_sequence(&elements)?;
        TlvElement::new(tlv_types::NACK, content).encode()
    }

    /// Decode Nack from TLV wire format
    pub fn decode(data: &[u8]) -> Result<(Self, usize), TlvError> {
        let (nack_element, consumed) = TlvElement::decode(data)?;

        if nack_element.type_ != tlv_types::NACK {
            return Err(TlvError::InvalidType(nack_element.type_));
        }

        let mut reason = None;
        let mut interest = None;

        for element in tlv::decode_tlv_sequence(&nack_element.value)? {
            match element.type_ {
                tlv_types::NACK_REASON => {
                    reason = Some(NackReason::from_code(tlv::decode_nni(&element.value)?));
                }
                tlv_types::INTEREST => {
                    interest = Some(Interest::decode_value(&element.value)?);
                }
                _ => {}
            }
        }

        let interest = interest.ok_or(TlvError::InvalidType(tlv_types::INTEREST))?;

        Ok((
            Nack {
                reason: reason.unwrap_or(NackReason::NoRoute),
                interest,
            },
            consumed,
        ))
    }
}

/// Packet types that faces deliver into the forwarding plane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Packet {
    Interest(Interest),
    Data(Data),
    Nack(Nack),
}

impl Packet {
    /// Decode a frame by its outer TLV type
    pub fn decode(frame: &[u8]) -> Result<Self, TlvError> {
        let (element, _) = TlvElement::decode(frame)?;
        match element.type_ {
            tlv_types::INTEREST => Ok(Packet::Interest(Interest::decode(frame)?.0)),
            tlv_types::DATA => Ok(Packet::Data(Data::decode(frame)?.0)),
            tlv_types::NACK => Ok(Packet::Nack(Nack::decode(frame)?.0)),
            other => Err(TlvError::InvalidType(other)),
        }
    }

    /// Get the name of the packet
    pub fn name(&self) -> &Name {
        match self {
            Packet::Interest(interest) => &interest.name,
            Packet::Data(data) => &data.name,
            Packet::Nack(nack) => &nack.interest.name,
        }
    }
}

impl From<Interest> for Packet {
    fn from(interest: Interest) -> Self {
        Packet::Interest(interest)
    }
}

impl From<Data> for Packet {
    fn from(data: Data) -> Self {
        Packet::Data(data)
    }
}

impl From<Nack> for Packet {
    fn from(nack: Nack) -> Self {
        Packet::Nack(nack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interest_round_trip() {
        let interest = Interest::new(Name::from_str("/a/b"))
            .with_can_be_prefix(true)
            .with_must_be_fresh(true)
            .with_nonce(0xAABBCCDD)
            .with_lifetime(Duration::from_millis(100))
            .with_hop_limit(7);

        let encoded = interest.encode().unwrap();
        let (decoded, consumed) = Interest::decode(&encoded).unwrap();
        assert_eq!(decoded, interest);
        assert_eq!(consumed, encoded.len());
    }

    #[test]
    fn test_interest_forwarding_hint_round_trip() {
        let interest = Interest::new(Name::from_str("/data/x"))
            .with_forwarding_hint(vec![Name::from_str("/hub/site"), Name::from_str("/hub/alt")])
            .with_nonce(1);

        let encoded = interest.encode().unwrap();
        let (decoded, _) = Interest::decode(&encoded).unwrap();
        assert_eq!(decoded.forwarding_hint.len(), 2);
        assert_eq!(decoded, interest);
    }

    #[test]
    fn test_interest_defaults() {
        let interest = Interest::new(Name::from_str("/a"));
        let encoded = interest.encode().unwrap();
        let (decoded, _) = Interest::decode(&encoded).unwrap();

        assert!(!decoded.can_be_prefix);
        assert!(!decoded.must_be_fresh);
        assert_eq!(decoded.nonce, None);
        assert_eq!(decoded.lifetime_or_default(), DEFAULT_INTEREST_LIFETIME);
    }

    #[test]
    fn test_interest_matching() {
        let exact = Interest::new(Name::from_str("/a/b"));
        assert!(exact.matches_data(&Name::from_str("/a/b")));
        assert!(!exact.matches_data(&Name::from_str("/a/b/seg0")));

        let prefix = Interest::new(Name::from_str("/a/b")).with_can_be_prefix(true);
        assert!(prefix.matches_data(&Name::from_str("/a/b/seg0")));
    }

    #[test]
    fn test_data_round_trip() {
        let data = Data::new(Name::from_str("/a/b/v1"), b"payload".to_vec())
            .with_freshness_period(Duration::from_secs(5))
            .with_final_block_id(vec![0x01]);

        let encoded = data.encode().unwrap();
        let (decoded, consumed) = Data::decode(&encoded).unwrap();
        assert_eq!(decoded, data);
        assert_eq!(consumed, encoded.len());
    }

    #[test]
    fn test_data_freshness() {
        let stale = Data::new(Name::from_str("/a"), vec![]);
        assert!(!stale.can_satisfy_fresh());

        let fresh = Data::new(Name::from_str("/a"), vec![]).with_freshness_period(Duration::from_secs(1));
        assert!(fresh.can_satisfy_fresh());
    }

    #[test]
    fn test_nack_round_trip() {
        let interest = Interest::new(Name::from_str("/a/b")).with_nonce(42);
        let nack = Nack::new(NackReason::Duplicate, interest);

        let encoded = nack.encode().unwrap();
        let (decoded, _) = Nack::decode(&encoded).unwrap();
        assert_eq!(decoded, nack);
    }

    #[test]
    fn test_nack_severity() {
        assert_eq!(
            NackReason::NoRoute.less_severe(NackReason::Congestion),
            NackReason::Congestion
        );
        assert_eq!(NackReason::from_code(9999), NackReason::NoRoute);
    }

    #[test]
    fn test_packet_dispatch() {
        let interest = Interest::new(Name::from_str("/a")).with_nonce(1);
        let frame = interest.encode().unwrap();
        assert!(matches!(Packet::decode(&frame), Ok(Packet::Interest(_))));

        let data = Data::new(Name::from_str("/a"), vec![1]);
        let frame = data.encode().unwrap();
        assert!(matches!(Packet::decode(&frame), Ok(Packet::Data(_))));

        let nack = Nack::new(NackReason::NoRoute, Interest::new(Name::from_str("/a")));
        let frame = nack.encode().unwrap();
        assert!(matches!(Packet::decode(&frame), Ok(Packet::Nack(_))));

        assert!(Packet::decode(&[0x09, 0x00]).is_err());
    }
}
