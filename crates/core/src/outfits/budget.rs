use crate::domain::outfit::{Outfit, OutfitItem};
use crate::domain::product::Product;

use super::assembler::FilledSlot;

/// Budget multiples and the bonus earned at or under each.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetTiers {
    /// `(multiple of budget, bonus)` in ascending multiple order.
    pub tiers: Vec<(f64, f64)>,
    /// Multiplier applied to the summed slot compatibility.
    pub compatibility_scale: f64,
}

impl Default for BudgetTiers {
    fn default() -> Self {
        Self {
            tiers: vec![(1.0, 10.0), (1.2, 5.0), (1.5, 2.0), (2.0, 1.0)],
            compatibility_scale: 90.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BudgetScorer {
    tiers: BudgetTiers,
}

impl BudgetScorer {
    pub fn new(tiers: BudgetTiers) -> Self {
        Self { tiers }
    }

    pub fn bonus(&self, total_price: f64, budget: f64) -> f64 {
        if !budget.is_finite() || budget <= 0.0 {
            return 0.0;
        }
        self.tiers
            .tiers
            .iter()
            .find(|(multiple, _)| total_price <= budget * multiple)
            .map(|(_, bonus)| *bonus)
            .unwrap_or(0.0)
    }

    /// Prices the base plus every slot and applies the bonus.
    pub fn score(&self, base: &Product, slots: Vec<FilledSlot>, budget: f64) -> Outfit {
        let total_price = base.price + slots.iter().map(|s| s.candidate.product.price).sum::<f64>();
        let compatibility: f64 = slots.iter().map(|s| s.candidate.compatibility_score).sum();
        let outfit_score =
            self.tiers.compatibility_scale * compatibility + self.bonus(total_price, budget);

        let items = slots
            .into_iter()
            .map(|filled| OutfitItem {
                slot: filled.slot,
                compatibility_score: filled.candidate.compatibility_score,
                rank_score: filled.candidate.rank_score,
                product: filled.candidate.product,
            })
            .collect();

        Outfit { base: base.clone(), items, outfit_score, total_price }
    }
}

#[cfg(test)]
mod tests {
    use super::BudgetScorer;
    use crate::domain::product::{Product, ProductId};
    use crate::outfits::FilledSlot;
    use crate::personalization::RankedCandidate;

    fn product(price: f64) -> Product {
        Product {
            id: ProductId::new(),
            name: "Piece".to_owned(),
            brand: "Harbor".to_owned(),
            gender: "Women".to_owned(),
            master_category: "Apparel".to_owned(),
            sub_category: "Bottomwear".to_owned(),
            article_type: "Skirts".to_owned(),
            primary_colour: "Black".to_owned(),
            fit: None,
            season: None,
            price,
            occasion_tags: vec![],
            formality_score: 0.5,
            style_archetype: None,
            images: vec![],
            style_embedding: None,
            complementary_embedding: None,
            semantic_embedding: None,
        }
    }

    fn slot(name: &str, price: f64, compatibility_score: f64) -> FilledSlot {
        FilledSlot {
            slot: name.to_owned(),
            candidate: RankedCandidate {
                product: product(price),
                compatibility_score,
                price_match: 1.0,
                style_alignment: 0.6,
                rank_score: 0.0,
            },
        }
    }

    #[test]
    fn bonus_tiers() {
        let scorer = BudgetScorer::default();
        assert_eq!(scorer.bonus(100.0, 100.0), 10.0);
        assert_eq!(scorer.bonus(119.0, 100.0), 5.0);
        assert_eq!(scorer.bonus(150.0, 100.0), 2.0);
        assert_eq!(scorer.bonus(200.0, 100.0), 1.0);
        assert_eq!(scorer.bonus(201.0, 100.0), 0.0);
    }

    #[test]
    fn degenerate_budgets_earn_nothing() {
        let scorer = BudgetScorer::default();
        assert_eq!(scorer.bonus(0.0, 0.0), 0.0);
        assert_eq!(scorer.bonus(10.0, -5.0), 0.0);
        assert_eq!(scorer.bonus(10.0, f64::NAN), 0.0);
    }

    #[test]
    fn outfit_total_includes_base_and_score_scales_compatibility() {
        let scorer = BudgetScorer::default();
        let base = product(40.0);
        let outfit = scorer.score(
            &base,
            vec![slot("top", 30.0, 0.5), slot("shoe", 30.0, 0.25)],
            100.0,
        );

        assert_eq!(outfit.total_price, 100.0);
        assert!((outfit.outfit_score - (90.0 * 0.75 + 10.0)).abs() < 1e-9);
        assert_eq!(outfit.items.len(), 2);
        assert_eq!(outfit.base.id, base.id);
    }
}
