use crate::domain::product::Product;
use crate::scoring::CompatibilityBreakdown;

pub const DEFAULT_DIVERSITY_CAP: usize = 40;

/// A candidate after compatibility scoring, before selection.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub product: Product,
    pub breakdown: CompatibilityBreakdown,
}

impl ScoredCandidate {
    pub fn score(&self) -> f64 {
        self.breakdown.total
    }
}

/// Round-robin top-N across sub-categories.
#[derive(Debug, Clone, Copy)]
pub struct DiversitySelector {
    cap: usize,
}

impl Default for DiversitySelector {
    fn default() -> Self {
        Self::new(DEFAULT_DIVERSITY_CAP)
    }
}

impl DiversitySelector {
    pub fn new(cap: usize) -> Self {
        Self { cap }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Groups keep the order in which their category first appears in `scored`.
    /// Within a group, equal scores keep input order.
    pub fn select(&self, scored: Vec<ScoredCandidate>) -> Vec<ScoredCandidate> {
        let mut groups: Vec<(String, Vec<ScoredCandidate>)> = Vec::new();
        for candidate in scored {
            let key = candidate.product.sub_category.trim().to_lowercase();
            match groups.iter_mut().find(|(category, _)| *category == key) {
                Some((_, members)) => members.push(candidate),
                None => groups.push((key, vec![candidate])),
            }
        }

        let mut queues: Vec<std::vec::IntoIter<ScoredCandidate>> = groups
            .into_iter()
            .map(|(_, mut members)| {
                members.sort_by(|a, b| b.score().total_cmp(&a.score()));
                members.into_iter()
            })
            .collect();

        let mut selected = Vec::new();
        while selected.len() < self.cap {
            let before = selected.len();
            for queue in queues.iter_mut() {
                if selected.len() == self.cap {
                    break;
                }
                if let Some(candidate) = queue.next() {
                    selected.push(candidate);
                }
            }
            if selected.len() == before {
                break;
            }
        }

        selected
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{DiversitySelector, ScoredCandidate};
    use crate::domain::product::{Product, ProductId};
    use crate::scoring::CompatibilityBreakdown;

    fn scored(sub_category: &str, total: f64) -> ScoredCandidate {
        ScoredCandidate {
            product: Product {
                id: ProductId::new(),
                name: format!("{sub_category} {total}"),
                brand: "Harbor".to_owned(),
                gender: "Men".to_owned(),
                master_category: "Apparel".to_owned(),
                sub_category: sub_category.to_owned(),
                article_type: "Generic".to_owned(),
                primary_colour: "Grey".to_owned(),
                fit: None,
                season: None,
                price: 20.0,
                occasion_tags: vec![],
                formality_score: 0.5,
                style_archetype: None,
                images: vec![],
                style_embedding: None,
                complementary_embedding: None,
                semantic_embedding: None,
            },
            breakdown: CompatibilityBreakdown { total, ..CompatibilityBreakdown::default() },
        }
    }

    #[test]
    fn round_robin_interleaves_categories_by_rank() {
        let input = vec![
            scored("Bottomwear", 0.4),
            scored("Bottomwear", 0.9),
            scored("Shoes", 0.7),
            scored("Bottomwear", 0.6),
            scored("Shoes", 0.8),
        ];

        let picked = DiversitySelector::new(4).select(input);
        let order: Vec<(&str, f64)> =
            picked.iter().map(|c| (c.product.sub_category.as_str(), c.score())).collect();

        assert_eq!(
            order,
            vec![("Bottomwear", 0.9), ("Shoes", 0.8), ("Bottomwear", 0.6), ("Shoes", 0.7)]
        );
    }

    #[test]
    fn exhausted_categories_yield_to_the_rest() {
        let mut input = vec![scored("Accessories", 0.5)];
        input.extend((0..5).map(|i| scored("Topwear", f64::from(i) / 10.0)));

        let picked = DiversitySelector::default().select(input);
        assert_eq!(picked.len(), 6);
        assert_eq!(picked[0].product.sub_category, "Accessories");
        assert!(picked[1..].iter().all(|c| c.product.sub_category == "Topwear"));
    }

    #[test]
    fn selection_is_capped_and_balanced() {
        let mut input = Vec::new();
        for category in ["Bottomwear", "Shoes", "Accessories"] {
            input.extend((0..30).map(|i| scored(category, f64::from(i))));
        }

        let picked = DiversitySelector::default().select(input);
        assert_eq!(picked.len(), 40);

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for candidate in &picked {
            *counts.entry(candidate.product.sub_category.as_str()).or_default() += 1;
        }
        let max = counts.values().max().copied().unwrap_or_default();
        let min = counts.values().min().copied().unwrap_or_default();
        assert!(max - min <= 1, "unbalanced counts: {counts:?}");
    }

    #[test]
    fn equal_scores_keep_input_order() {
        let first = scored("Shoes", 0.5);
        let second = scored("Shoes", 0.5);
        let ids = [first.product.id, second.product.id];

        let picked = DiversitySelector::default().select(vec![first, second]);
        assert_eq!(picked.iter().map(|c| c.product.id).collect::<Vec<_>>(), ids);
    }

    #[test]
    fn empty_input_selects_nothing() {
        assert!(DiversitySelector::default().select(Vec::new()).is_empty());
        assert!(DiversitySelector::new(0).select(vec![scored("Shoes", 1.0)]).is_empty());
    }
}
