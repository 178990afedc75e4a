//! # Instances
//!
//! A built value tagged with the descriptor that produced it. The tag is a
//! weak back-reference: an instance never keeps its descriptor alive. For
//! union descriptors the instance also records the branch that accepted
//! it, which display and dispatch code keys on.

use serde::Serialize;
use serde_json::Value;

use crate::descriptor::{Descriptor, WeakDescriptor};

/// A value together with its producing descriptor.
#[derive(Debug, Clone)]
pub struct Instance {
    value: Value,
    descriptor: WeakDescriptor,
    branch: Option<Descriptor>,
}

impl Instance {
    pub(crate) fn new(value: Value, descriptor: &Descriptor, branch: Option<Descriptor>) -> Self {
        Self {
            value,
            descriptor: descriptor.downgrade(),
            branch,
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// The producing descriptor, if it is still alive.
    pub fn descriptor(&self) -> Option<Descriptor> {
        self.descriptor.upgrade()
    }

    /// The union branch that accepted the value.
    pub fn branch(&self) -> Option<&Descriptor> {
        self.branch.as_ref()
    }

    /// True if `descriptor` produced this instance.
    pub fn is_instance_of(&self, descriptor: &Descriptor) -> bool {
        self.descriptor().is_some_and(|d| d.ptr_eq(descriptor))
    }
}

impl PartialEq<Value> for Instance {
    fn eq(&self, other: &Value) -> bool {
        &self.value == other
    }
}

impl Serialize for Instance {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}

impl AsRef<Value> for Instance {
    fn as_ref(&self) -> &Value {
        &self.value
    }
}
