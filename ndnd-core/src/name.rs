use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::tlv::{self, TlvElement, TlvError};

/// TLV types for name components
pub mod component_types {
    pub const IMPLICIT_SHA256_DIGEST: u32 = 0x01;
    pub const PARAMETERS_SHA256_DIGEST: u32 = 0x02;
    pub const GENERIC: u32 = 0x08;
}

const NAME_TLV_TYPE: u32 = 0x07;

/// A single name component: a type code and an opaque byte string
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Component {
    pub typ: u32,
    pub value: Vec<u8>,
}

impl Component {
    /// Create a generic component from raw bytes
    pub fn generic(value: Vec<u8>) -> Self {
        Self {
            typ: component_types::GENERIC,
            value,
        }
    }

    /// Create a generic component from a string
    pub fn from_str(value: &str) -> Self {
        Self::generic(value.as_bytes().to_vec())
    }
}

impl Ord for Component {
    /// Canonical component order: type, then value length, then value bytes
    fn cmp(&self, other: &Self) -> Ordering {
        self.typ
            .cmp(&other.typ)
            .then_with(|| self.value.len().cmp(&other.value.len()))
            .then_with(|| self.value.cmp(&other.value))
    }
}

impl PartialOrd for Component {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Represents a hierarchical name in the NDN network
///
/// Ordering is the canonical NDN order: component-wise, with a name that is a
/// proper prefix of another sorting first. Every table in the forwarder keys
/// on names, and the content store relies on this order for prefix ranges.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Name {
    pub components: Vec<Component>,
}

impl Name {
    /// Create a new empty name
    pub fn new() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// Create a name from a string path (e.g., "/hello/world")
    pub fn from_str(path: &str) -> Self {
        let mut name = Name::new();
        if path.starts_with('/') && path.len() > 1 {
            for component in path[1..].split('/') {
                if !component.is_empty() {
                    name.components.push(Component::from_str(component));
                }
            }
        }
        name
    }

    /// Append a component to the name
    pub fn append(&mut self, component: Component) -> &mut Self {
        self.components.push(component);
        self
    }

    /// Append a generic string component to the name
    pub fn append_str(&mut self, component: &str) -> &mut Self {
        self.components.push(Component::from_str(component));
        self
    }

    /// Get the number of components
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Check if the name is empty
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Get a component by index
    pub fn get(&self, index: usize) -> Option<&Component> {
        self.components.get(index)
    }

    /// Check if this name is a prefix of another name
    pub fn is_prefix_of(&self, other: &Name) -> bool {
        if self.len() > other.len() {
            return false;
        }
        self.components
            .iter()
            .zip(other.components.iter())
            .all(|(a, b)| a == b)
    }

    /// Get a prefix of this name with the specified number of components
    pub fn get_prefix(&self, length: usize) -> Name {
        Name {
            components: self.components.iter().take(length).cloned().collect(),
        }
    }

    /// Stable hash over the first `k` components (or all, if fewer).
    ///
    /// The dispatcher keys worker affinity on this, so it must not depend on
    /// anything but the component bytes.
    pub fn hash_prefix(&self, k: usize) -> u64 {
        let mut hasher = DefaultHasher::new();
        for component in self.components.iter().take(k) {
            component.typ.hash(&mut hasher);
            component.value.hash(&mut hasher);
        }
        hasher.finish()
    }

    /// Canonical comparison; equivalent to `Ord` but kept as an explicit name
    pub fn compare(&self, other: &Name) -> Ordering {
        self.cmp(other)
    }

    /// Encode name to TLV format
    pub fn encode(&self) -> Result<Vec<u8>, TlvError> {
        let mut components_tlv = Vec::new();

        for component in &self.components {
            let element = TlvElement::new(component.typ, component.value.clone());
            element.encode_to(&mut components_tlv)?;
        }

        let name_element = TlvElement::new(NAME_TLV_TYPE, components_tlv);
        name_element.encode()
    }

    /// Decode name from TLV format
    pub fn decode(data: &[u8]) -> Result<(Self, usize), TlvError> {
        let (name_element, consumed) = TlvElement::decode(data)?;

        if name_element.type_ != NAME_TLV_TYPE {
            return Err(TlvError::InvalidType(name_element.type_));
        }

        let name = Self::decode_value(&name_element.value)?;
        Ok((name, consumed))
    }

    /// Decode the inner value of a Name TLV (the component sequence)
    pub fn decode_value(value: &[u8]) -> Result<Self, TlvError> {
        let mut name = Name::new();
        for element in tlv::decode_tlv_sequence(value)? {
            name.components.push(Component {
                typ: element.type_,
                value: element.value,
            });
        }
        Ok(name)
    }
}

impl std::fmt::Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "/");
        }
        for component in &self.components {
            write!(f, "/{}", String::from_utf8_lossy(&component.value))?;
        }
        Ok(())
    }
}
