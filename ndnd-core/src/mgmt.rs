use serde::{Deserialize, Serialize};

use crate::name::Name;
use crate::tlv::{self, TlvElement, TlvError};

/// TLV type constants for management ControlParameters
pub mod tlv_types {
    pub const CONTROL_PARAMETERS: u32 = 0x68;
    pub const NAME: u32 = 0x07;
    pub const FACE_ID: u32 = 0x69;
    pub const URI: u32 = 0x72;
    pub const LOCAL_URI: u32 = 0x81;
    pub const ORIGIN: u32 = 0x6F;
    pub const COST: u32 = 0x6A;
    pub const CAPACITY: u32 = 0x83;
    pub const COUNT: u32 = 0x84;
    pub const BASE_CONGESTION_MARKING_INTERVAL: u32 = 0x87;
    pub const DEFAULT_CONGESTION_THRESHOLD: u32 = 0x88;
    pub const MTU: u32 = 0x89;
    pub const FLAGS: u32 = 0x6C;
    pub const MASK: u32 = 0x70;
    pub const STRATEGY: u32 = 0x6B;
    pub const EXPIRATION_PERIOD: u32 = 0x6D;
    pub const FACE_PERSISTENCY: u32 = 0x85;
}

/// Errors from decoding or validating ControlParameters
#[derive(Debug, thiserror::Error)]
pub enum ControlParametersError {
    #[error("TLV error: {0}")]
    Tlv(#[from] TlvError),
    #[error("not a ControlParameters element: type {0}")]
    UnexpectedType(u32),
    #[error("duplicate {0}")]
    Duplicate(&'static str),
    #[error("unable to decode {0}")]
    Field(&'static str),
    #[error("unrecognized critical field: type {0}")]
    UnrecognizedCritical(u32),
}

/// Parameters of a management command; every field is optional on the wire
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlParameters {
    pub name: Option<Name>,
    pub face_id: Option<u64>,
    pub uri: Option<String>,
    pub local_uri: Option<String>,
    pub origin: Option<u64>,
    pub cost: Option<u64>,
    pub capacity: Option<u64>,
    pub count: Option<u64>,
    pub base_congestion_marking_interval: Option<u64>,
    pub default_congestion_threshold: Option<u64>,
    pub mtu: Option<u64>,
    pub flags: Option<u64>,
    pub mask: Option<u64>,
    pub strategy: Option<Name>,
    pub expiration_period: Option<u64>,
    pub face_persistency: Option<u64>,
}

fn decode_nni_field(
    element: &TlvElement,
    slot: &mut Option<u64>,
    label: &'static str,
) -> Result<(), ControlParametersError> {
    // Each field's duplicate check consults its own slot.
    if slot.is_some() {
        return Err(ControlParametersError::Duplicate(label));
    }
    *slot = Some(tlv::decode_nni(&element.value).map_err(|_| ControlParametersError::Field(label))?);
    Ok(())
}

impl ControlParameters {
    /// Create an empty ControlParameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode ControlParameters from the wire
    pub fn decode(wire: &[u8]) -> Result<(Self, usize), ControlParametersError> {
        let (element, consumed) = TlvElement::decode(wire)?;

        if element.type_ != tlv_types::CONTROL_PARAMETERS {
            return Err(ControlParametersError::UnexpectedType(element.type_));
        }

        let mut c = ControlParameters::new();

        for elem in tlv::decode_tlv_sequence(&element.value)? {
            match elem.type_ {
                tlv_types::NAME => {
                    if c.name.is_some() {
                        return Err(ControlParametersError::Duplicate("Name"));
                    }
                    c.name = Some(
                        Name::decode_value(&elem.value).map_err(|_| ControlParametersError::Field("Name"))?,
                    );
                }
                tlv_types::FACE_ID => {
                    decode_nni_field(&elem, &mut c.face_id, "FaceId")?;
                }
                tlv_types::URI => {
                    if c.uri.is_some() {
                        return Err(ControlParametersError::Duplicate("Uri"));
                    }
                    c.uri = Some(
                        String::from_utf8(elem.value).map_err(|_| ControlParametersError::Field("Uri"))?,
                    );
                }
                tlv_types::LOCAL_URI => {
                    if c.local_uri.is_some() {
                        return Err(ControlParametersError::Duplicate("LocalUri"));
                    }
                    c.local_uri = Some(
                        String::from_utf8(elem.value)
                            .map_err(|_| ControlParametersError::Field("LocalUri"))?,
                    );
                }
                tlv_types::ORIGIN => {
                    decode_nni_field(&elem, &mut c.origin, "Origin")?;
                }
                tlv_types::COST => {
                    decode_nni_field(&elem, &mut c.cost, "Cost")?;
                }
                tlv_types::CAPACITY => {
                    decode_nni_field(&elem, &mut c.capacity, "Capacity")?;
                }
                tlv_types::COUNT => {
                    decode_nni_field(&elem, &mut c.count, "Count")?;
                }
                tlv_types::BASE_CONGESTION_MARKING_INTERVAL => {
                    decode_nni_field(
                        &elem,
                        &mut c.base_congestion_marking_interval,
                        "BaseCongestionMarkingInterval",
                    )?;
                }
                tlv_types::DEFAULT_CONGESTION_THRESHOLD => {
                    decode_nni_field(
                        &elem,
                        &mut c.default_congestion_threshold,
                        "DefaultCongestionThreshold",
                    )?;
                }
                tlv_types::MTU => {
                    decode_nni_field(&elem, &mut c.mtu, "Mtu")?;
                }
                tlv_types::FLAGS => {
                    decode_nni_field(&elem, &mut c.flags, "Flags")?;
                }
                tlv_types::MASK => {
                    decode_nni_field(&elem, &mut c.mask, "Mask")?;
                }
                tlv_types::STRATEGY => {
                    if c.strategy.is_some() {
                        return Err(ControlParametersError::Duplicate("Strategy"));
                    }
                    // Strategy wraps exactly one Name subelement
                    let inner = tlv::decode_tlv_sequence(&elem.value)
                        .map_err(|_| ControlParametersError::Field("Strategy"))?;
                    if inner.len() != 1 || inner[0].type_ != tlv_types::NAME {
                        return Err(ControlParametersError::Field("Strategy"));
                    }
                    c.strategy = Some(
                        Name::decode_value(&inner[0].value)
                            .map_err(|_| ControlParametersError::Field("Strategy"))?,
                    );
                }
                tlv_types::EXPIRATION_PERIOD => {
                    decode_nni_field(&elem, &mut c.expiration_period, "ExpirationPeriod")?;
                }
                tlv_types::FACE_PERSISTENCY => {
                    decode_nni_field(&elem, &mut c.face_persistency, "FacePersistency")?;
                }
                other => {
                    if tlv::is_critical(other) {
                        return Err(ControlParametersError::UnrecognizedCritical(other));
                    }
                }
            }
        }

        Ok((c, consumed))
    }

    /// Encode ControlParameters to the wire
    pub fn encode(&self) -> Result<Vec<u8>, ControlParametersError> {
        let mut elements = Vec::new();

        if let Some(name) = &self.name {
            elements.push(TlvElement::decode(&name.encode()?)?.0);
        }
        if let Some(face_id) = self.face_id {
            elements.push(TlvElement::new(tlv_types::FACE_ID, tlv::encode_nni(face_id)));
        }
        if let Some(uri) = &self.uri {
            elements.push(TlvElement::new(tlv_types::URI, uri.as_bytes().to_vec()));
        }
        if let Some(local_uri) = &self.local_uri {
            elements.push(TlvElement::new(tlv_types::LOCAL_URI, local_uri.as_bytes().to_vec()));
        }
        if let Some(origin) = self.origin {
            elements.push(TlvElement::new(tlv_types::ORIGIN, tlv::encode_nni(origin)));
        }
        if let Some(cost) = self.cost {
            elements.push(TlvElement::new(tlv_types::COST, tlv::encode_nni(cost)));
        }
        if let Some(capacity) = self.capacity {
            elements.push(TlvElement::new(tlv_types::CAPACITY, tlv::encode_nni(capacity)));
        }
        if let Some(count) = self.count {
            elements.push(TlvElement::new(tlv_types::COUNT, tlv::encode_nni(count)));
        }
        if let Some(interval) = self.base_congestion_marking_interval {
            elements.push(TlvElement::new(
                tlv_types::BASE_CONGESTION_MARKING_INTERVAL,
                tlv::encode_nni(interval),
            ));
        }
        if let Some(threshold) = self.default_congestion_threshold {
            elements.push(TlvElement::new(
                tlv_types::DEFAULT_CONGESTION_THRESHOLD,
                tlv::encode_nni(threshold),
            ));
        }
        if let Some(mtu) = self.mtu {
            elements.push(TlvElement::new(tlv_types::MTU, tlv::encode_nni(mtu)));
        }
        if let Some(flags) = self.flags {
            elements.push(TlvElement::new(tlv_types::FLAGS, tlv::encode_nni(flags)));
        }
        if let Some(mask) = self.mask {
            elements.push(TlvElement::new(tlv_types::MASK, tlv::encode_nni(mask)));
        }
        if let Some(strategy) = &self.strategy {
            let inner = strategy.encode()?;
            elements.push(TlvElement::new(tlv_types::STRATEGY, inner));
        }
        if let Some(period) = self.expiration_period {
            elements.push(TlvElement::new(tlv_types::EXPIRATION_PERIOD, tlv::encode_nni(period)));
        }
        if let Some(persistency) = self.face_persistency {
            elements.push(TlvElement::new(tlv_types::FACE_PERSISTENCY, tlv::encode_nni(persistency)));
        }

        let content = tlv::encode_tlv_sequence(&elements)?;
        Ok(TlvElement::new(tlv_types::CONTROL_PARAMETERS, content).encode()?)
    }
}
