//! Stylist rules over categorical product and shopper attributes

use std::collections::HashSet;

use crate::domain::product::Product;
use crate::domain::user::UserProfile;

use super::PRICE_FIT_EPSILON;

/// Lookup tables and constants behind the rule scorers.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleTables {
    /// Unordered season pairs that still work together.
    pub transitional_seasons: Vec<(String, String)>,
    /// Unordered fit pairs with their score. Labels are matched lower-cased.
    pub fit_compatibility: Vec<(String, String, f64)>,
    pub same_season: f64,
    pub unknown_season: f64,
    pub transitional_season: f64,
    pub season_mismatch: f64,
    /// Floor for disjoint occasion sets so a composite never collapses to zero.
    pub occasion_floor: f64,
    pub default_fit: f64,
    /// Returned when the shopper has no spend history for the category.
    pub neutral_price_fit: f64,
    /// Returned when the price exceeds the shopper's recorded max.
    pub over_max_price_fit: f64,
}

impl Default for RuleTables {
    fn default() -> Self {
        let pair = |a: &str, b: &str| (a.to_owned(), b.to_owned());
        Self {
            transitional_seasons: vec![
                pair("Spring", "Summer"),
                pair("Autumn", "Winter"),
                pair("All Season", "Summer"),
            ],
            fit_compatibility: vec![
                ("slim".to_owned(), "oversized".to_owned(), 1.2),
                ("regular".to_owned(), "regular".to_owned(), 1.0),
                ("oversized".to_owned(), "oversized".to_owned(), 0.8),
            ],
            same_season: 1.0,
            unknown_season: 0.5,
            transitional_season: 0.7,
            season_mismatch: 0.2,
            occasion_floor: 0.1,
            default_fit: 0.5,
            neutral_price_fit: 0.5,
            over_max_price_fit: 0.1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuleScorer {
    tables: RuleTables,
}

impl RuleScorer {
    pub fn new(tables: RuleTables) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &RuleTables {
        &self.tables
    }

    pub fn season_score(&self, left: Option<&str>, right: Option<&str>) -> f64 {
        let (Some(left), Some(right)) = (present(left), present(right)) else {
            return self.tables.unknown_season;
        };

        if left.eq_ignore_ascii_case(right) {
            return self.tables.same_season;
        }

        let transitional = self.tables.transitional_seasons.iter().any(|(a, b)| {
            (a.eq_ignore_ascii_case(left) && b.eq_ignore_ascii_case(right))
                || (a.eq_ignore_ascii_case(right) && b.eq_ignore_ascii_case(left))
        });
        if transitional {
            self.tables.transitional_season
        } else {
            self.tables.season_mismatch
        }
    }

    /// Jaccard index of the two tag sets, floored when they share nothing.
    pub fn occasion_score(&self, left: &[String], right: &[String]) -> f64 {
        let left: HashSet<&str> = left.iter().map(String::as_str).collect();
        let right: HashSet<&str> = right.iter().map(String::as_str).collect();

        let intersection = left.intersection(&right).count();
        if intersection == 0 {
            return self.tables.occasion_floor;
        }

        let union = left.union(&right).count();
        intersection as f64 / union as f64
    }

    pub fn fit_score(&self, left: Option<&str>, right: Option<&str>) -> f64 {
        let (Some(left), Some(right)) = (present(left), present(right)) else {
            return self.tables.default_fit;
        };

        self.tables
            .fit_compatibility
            .iter()
            .find(|(a, b, _)| {
                (a.eq_ignore_ascii_case(left) && b.eq_ignore_ascii_case(right))
                    || (a.eq_ignore_ascii_case(right) && b.eq_ignore_ascii_case(left))
            })
            .map(|(_, _, score)| *score)
            .unwrap_or(self.tables.default_fit)
    }

    /// How comfortably `product` sits inside the shopper's spend for its sub-category.
    pub fn price_fit_score(&self, user: &UserProfile, product: &Product) -> f64 {
        let Some(range) = user.spend_for(&product.sub_category) else {
            return self.tables.neutral_price_fit;
        };
        let avg = match range.avg {
            Some(avg) if avg.is_finite() && avg > 0.0 => avg,
            _ => return self.tables.neutral_price_fit,
        };

        if product.price <= avg {
            return 1.0;
        }

        let max = range.max.unwrap_or(0.0);
        if product.price <= max {
            let ratio = (product.price - avg) / (max - avg + PRICE_FIT_EPSILON);
            return 1.0 - ratio * sensitivity(user.price_sensitivity_score);
        }

        self.tables.over_max_price_fit
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn sensitivity(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.5
    }
}
