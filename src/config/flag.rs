//! Booleans that remember whether they were set.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A boolean option that only overrides a parent value when a child sets it
/// explicitly. `insecurely: false` in a variant therefore undoes
/// `insecurely: true` inherited from the root, while omitting it does not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flag {
    set: bool,
    value: bool,
}

impl Flag {
    pub fn new(value: bool) -> Self {
        Self { set: true, value }
    }

    pub fn is_true(&self) -> bool {
        self.value
    }

    pub fn is_set(&self) -> bool {
        self.set
    }

    pub fn is_unset(&self) -> bool {
        !self.set
    }

    pub fn merge(&mut self, other: &Flag) {
        if other.set {
            *self = *other;
        }
    }
}

impl<'de> Deserialize<'de> for Flag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<bool>::deserialize(deserializer).map(|value| match value {
            Some(value) => Flag::new(value),
            None => Flag::default(),
        })
    }
}

impl Serialize for Flag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bool(self.value)
    }
}
