use std::collections::HashSet;

use tracing::debug;

use crate::domain::product::{Product, ProductId};
use crate::errors::DomainError;
use crate::personalization::RankedCandidate;
use crate::retrieval::{slot_name, CategoryMap};

pub const DEFAULT_MAX_OUTFITS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub name: String,
    pub sub_category: String,
}

/// Slots a base product needs filled to make a complete look.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SlotTemplate {
    pub slots: Vec<Slot>,
}

impl SlotTemplate {
    /// One slot per mapped target of the base's sub-category.
    pub fn for_base(categories: &CategoryMap, base: &Product) -> Self {
        let slots = categories
            .targets(&base.sub_category)
            .unwrap_or_default()
            .iter()
            .map(|category| Slot { name: slot_name(category), sub_category: category.clone() })
            .collect();
        Self { slots }
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// A filled slot before budget scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct FilledSlot {
    pub slot: String,
    pub candidate: RankedCandidate,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Assembly {
    pub outfits: Vec<Vec<FilledSlot>>,
    /// First slot that could not be filled, when assembly stopped early.
    pub unfilled: Option<DomainError>,
}

#[derive(Debug, Clone, Copy)]
pub struct OutfitAssembler {
    max_outfits: usize,
}

impl Default for OutfitAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_OUTFITS)
    }
}

impl OutfitAssembler {
    pub fn new(max_outfits: usize) -> Self {
        Self { max_outfits }
    }

    /// Greedily fills every slot with the best remaining candidate.
    ///
    /// `ranked` must already be in rank order. Assembly stops at the first
    /// slot with no eligible candidate; completed outfits are kept.
    pub fn assemble(
        &self,
        base: &ProductId,
        template: &SlotTemplate,
        ranked: &[RankedCandidate],
    ) -> Assembly {
        let mut assembly = Assembly::default();
        if template.is_empty() {
            return assembly;
        }

        let mut used: HashSet<ProductId> = HashSet::from([*base]);
        while assembly.outfits.len() < self.max_outfits {
            let mut outfit = Vec::with_capacity(template.slots.len());
            let mut claimed: Vec<ProductId> = Vec::new();

            for slot in &template.slots {
                let pick = ranked.iter().find(|candidate| {
                    candidate.product.is_sub_category(&slot.sub_category)
                        && !used.contains(&candidate.product.id)
                        && !claimed.contains(&candidate.product.id)
                });
                match pick {
                    Some(candidate) => {
                        claimed.push(candidate.product.id);
                        outfit.push(FilledSlot { slot: slot.name.clone(), candidate: candidate.clone() });
                    }
                    None => {
                        debug!(
                            event_name = "engine.assembly.slot_unfillable",
                            base_product_id = %base,
                            slot = %slot.name,
                            completed = assembly.outfits.len(),
                            "outfit assembly stopped at unfillable slot"
                        );
                        assembly.unfilled =
                            Some(DomainError::SlotUnfillable { slot: slot.name.clone() });
                        return assembly;
                    }
                }
            }

            used.extend(claimed);
            assembly.outfits.push(outfit);
        }

        assembly
    }
}
