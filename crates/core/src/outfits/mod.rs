//! Outfit assembly and budget scoring

mod assembler;
mod budget;

pub use assembler::{
    Assembly, FilledSlot, OutfitAssembler, Slot, SlotTemplate, DEFAULT_MAX_OUTFITS,
};
pub use budget::{BudgetScorer, BudgetTiers};
