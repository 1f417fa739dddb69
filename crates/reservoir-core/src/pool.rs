//! Offer-local resource bookkeeping.
//!
//! A [`ResourcePool`] is built once per offer per evaluation round. Stages
//! draw from it as they match requirements, so a quantity consumed by one
//! task is never visible to the next within the same round.

use std::collections::BTreeMap;

use tracing::warn;

use reservoir_model::{Offer, Resource, Value};

use crate::error::InsufficientResourceError;
use crate::labels::ResourceLabelReader;

/// Mutable view over one offer's resources for the duration of a single
/// evaluation round.
///
/// Resources are sorted into three buckets at construction: previously
/// reserved resources keyed by their reservation ID, atomic unreserved
/// resources (dedicated mount disks, consumed whole), and everything else
/// merged per resource name.
#[derive(Debug, Clone)]
pub struct ResourcePool {
    reserved: BTreeMap<String, Resource>,
    unreserved_atomic: Vec<Resource>,
    unreserved_merged: BTreeMap<String, Value>,
}

impl ResourcePool {
    pub fn new(offer: &Offer) -> Self {
        let mut reserved = BTreeMap::new();
        let mut unreserved_atomic = Vec::new();
        let mut unreserved_merged: BTreeMap<String, Value> = BTreeMap::new();

        for resource in &offer.resources {
            if let Some(id) = ResourceLabelReader::new(resource).resource_id() {
                reserved.insert(id.to_string(), resource.clone());
            } else if resource.is_atomic() {
                unreserved_atomic.push(resource.clone());
            } else {
                match unreserved_merged.get(&resource.name) {
                    Some(existing) => match existing.merge(&resource.value) {
                        Ok(merged) => {
                            unreserved_merged.insert(resource.name.clone(), merged);
                        }
                        Err(err) => {
                            warn!(
                                resource = %resource.name,
                                error = %err,
                                "dropping offered resource with mismatched value kind"
                            );
                        }
                    },
                    None => {
                        unreserved_merged.insert(resource.name.clone(), resource.value.clone());
                    }
                }
            }
        }

        Self {
            reserved,
            unreserved_atomic,
            unreserved_merged,
        }
    }

    /// The previously reserved resource with the given reservation ID, if the
    /// offer carries it and it has not been consumed this round.
    pub fn reserved(&self, resource_id: &str) -> Option<&Resource> {
        self.reserved.get(resource_id)
    }

    /// Currently available unreserved quantity under `name`, excluding atomic
    /// resources.
    pub fn available_unreserved(&self, name: &str) -> Option<&Value> {
        self.unreserved_merged.get(name)
    }

    /// Draw a previously reserved resource back out of the offer.
    ///
    /// Atomic resources come out whole. Divisible ones are split: the desired
    /// quantity is returned and the remainder stays claimable under the same
    /// reservation ID.
    pub fn consume_reserved(
        &mut self,
        name: &str,
        desired: &Value,
        resource_id: &str,
    ) -> Result<Resource, InsufficientResourceError> {
        let Some(existing) = self.reserved.remove(resource_id) else {
            return Err(InsufficientResourceError::new(name, desired.clone(), None));
        };

        if existing.is_atomic() {
            return Ok(existing);
        }

        if !existing.value.fits(desired) {
            let available = existing.value.clone();
            self.reserved.insert(resource_id.to_string(), existing);
            return Err(InsufficientResourceError::new(
                name,
                desired.clone(),
                Some(available),
            ));
        }
        let remainder = match existing.value.subtract(desired) {
            Ok(remainder) => remainder,
            Err(_) => {
                let available = existing.value.clone();
                self.reserved.insert(resource_id.to_string(), existing);
                return Err(InsufficientResourceError::new(
                    name,
                    desired.clone(),
                    Some(available),
                ));
            }
        };
        let consumed = existing.with_value(desired.clone());
        self.reserved
            .insert(resource_id.to_string(), existing.with_value(remainder));
        Ok(consumed)
    }

    /// Draw an atomic unreserved resource large enough for `desired`. The
    /// whole resource is returned; any surplus stays attached to it.
    pub fn consume_unreserved_atomic(
        &mut self,
        name: &str,
        desired: &Value,
    ) -> Result<Resource, InsufficientResourceError> {
        let position = self
            .unreserved_atomic
            .iter()
            .position(|r| r.name == name && r.value.fits(desired));
        match position {
            Some(i) => Ok(self.unreserved_atomic.remove(i)),
            None => {
                let largest = self
                    .unreserved_atomic
                    .iter()
                    .filter(|r| r.name == name)
                    .map(|r| r.value.clone())
                    .next();
                Err(InsufficientResourceError::new(name, desired.clone(), largest))
            }
        }
    }

    /// Draw a quantity from the merged unreserved bucket under `name`.
    pub fn consume_unreserved(
        &mut self,
        name: &str,
        desired: &Value,
    ) -> Result<Resource, InsufficientResourceError> {
        let Some(available) = self.unreserved_merged.get(name) else {
            return Err(InsufficientResourceError::new(name, desired.clone(), None));
        };
        if !available.fits(desired) {
            return Err(InsufficientResourceError::new(
                name,
                desired.clone(),
                Some(available.clone()),
            ));
        }
        let remainder = available.subtract(desired).map_err(|_| {
            InsufficientResourceError::new(name, desired.clone(), Some(available.clone()))
        })?;
        self.unreserved_merged.insert(name.to_string(), remainder);
        Ok(Resource::unreserved(name, desired.clone()))
    }
}
