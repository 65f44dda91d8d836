//! Shelf search: client-side re-filtering and ordering of catalog results.
//! Pure and deterministic; the input slice is never touched.

#![forbid(unsafe_code)]

use std::cmp::Ordering;

use feruca::Collator;
use shelf_core::CatalogItem;
use tracing::trace;

pub mod criteria;

pub use criteria::{Category, CriteriaChange, FilterCriteria, FilterError, MinRating, PriceRange, SortKey};

/// Survivor counts after each stage, for explaining an empty result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct FilterDebugInfo {
    pub total: usize,
    pub after_price: usize,
    pub after_rating: usize,
    pub after_category: usize,
}

pub fn apply_filters(items: &[CatalogItem], criteria: &FilterCriteria) -> Vec<CatalogItem> {
    apply_filters_with_debug(items, criteria).0
}

pub fn apply_filters_with_debug(
    items: &[CatalogItem],
    criteria: &FilterCriteria,
) -> (Vec<CatalogItem>, FilterDebugInfo) {
    let started = std::time::Instant::now();
    let total = items.len();

    let mut out: Vec<CatalogItem> = items
        .iter()
        .filter(|it| criteria.price_range.admits(it.price))
        .cloned()
        .collect();
    let after_price = out.len();

    out.retain(|it| criteria.min_rating.admits(it.rating));
    let after_rating = out.len();

    out.retain(|it| criteria.category.admits(&it.name));
    let after_category = out.len();

    sort_items(&mut out, criteria.sort_key);

    let dbg = FilterDebugInfo { total, after_price, after_rating, after_category };
    let elapsed = started.elapsed();
    metrics::histogram!("filter_eval_ms", elapsed.as_secs_f64() * 1_000.0);
    trace!(total, after_price, after_rating, after_category, sort = %criteria.sort_key, "filters applied");
    (out, dbg)
}

/// Stable for every key: ties keep their pre-sort order.
fn sort_items(items: &mut [CatalogItem], key: SortKey) {
    match key {
        SortKey::Name => {
            let mut collator = Collator::default();
            items.sort_by(|a, b| collator.collate(a.name.as_str(), b.name.as_str()));
        }
        SortKey::PriceAsc => items.sort_by(|a, b| a.price.total_cmp(&b.price)),
        SortKey::PriceDesc => items.sort_by(|a, b| b.price.total_cmp(&a.price)),
        SortKey::RatingDesc => items.sort_by(|a, b| b.rating.cmp(&a.rating)),
    }
}

/// Unicode collation with the CLDR root order: accents and case only break
/// ties between otherwise equal names, lowercase first.
pub fn collate(a: &str, b: &str) -> Ordering { Collator::default().collate(a, b) }

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: u64, name: &str, price: f64, rating: u8) -> CatalogItem {
        CatalogItem::new(id, name, price, rating)
    }

    fn ids(items: &[CatalogItem]) -> Vec<u64> { items.iter().map(|i| i.id).collect() }

    fn sample() -> Vec<CatalogItem> {
        vec![
            item(1, "Python Basics", 15.0, 4),
            item(2, "React Deep Dive", 60.0, 5),
            item(3, "css for everyone", 20.0, 3),
            item(4, "Backend APIs with Rust", 120.0, 4),
            item(5, "UX Design Handbook", 50.0, 2),
        ]
    }

    #[test]
    fn min_only_price_with_descending_sort() {
        let items = vec![item(1, "Python Basics", 15.0, 4), item(2, "React Deep Dive", 60.0, 5)];
        let criteria = FilterCriteria {
            price_range: PriceRange::AtLeast { min: 20.0 },
            sort_key: SortKey::PriceDesc,
            ..Default::default()
        };
        assert_eq!(ids(&apply_filters(&items, &criteria)), vec![2]);
    }

    #[test]
    fn bounded_price_is_inclusive() {
        let criteria = FilterCriteria { price_range: PriceRange::between(20.0, 60.0).unwrap(), ..Default::default() };
        let out = apply_filters(&sample(), &criteria);
        // name order: css, React, UX
        assert_eq!(ids(&out), vec![3, 2, 5]);
    }

    #[test]
    fn rating_and_category_stages_compose() {
        let criteria = FilterCriteria {
            min_rating: MinRating::AtLeast(4),
            category: Category::Backend,
            ..Default::default()
        };
        assert_eq!(ids(&apply_filters(&sample(), &criteria)), vec![4]);
    }

    #[test]
    fn name_sort_ignores_case() {
        let out = apply_filters(&sample(), &FilterCriteria::default());
        assert_eq!(ids(&out), vec![4, 3, 1, 2, 5]);
    }

    #[test]
    fn ties_keep_input_order() {
        let items = vec![item(9, "b", 10.0, 3), item(3, "a", 10.0, 3), item(5, "c", 10.0, 3)];
        for key in [SortKey::PriceAsc, SortKey::PriceDesc, SortKey::RatingDesc] {
            let criteria = FilterCriteria { sort_key: key, ..Default::default() };
            assert_eq!(ids(&apply_filters(&items, &criteria)), vec![9, 3, 5], "sort {key}");
        }
    }

    #[test]
    fn input_is_left_untouched() {
        let items = sample();
        let before = items.clone();
        let criteria = FilterCriteria { sort_key: SortKey::RatingDesc, ..Default::default() };
        let _ = apply_filters(&items, &criteria);
        assert_eq!(items, before);
    }

    #[test]
    fn debug_counts_each_stage() {
        let criteria = FilterCriteria {
            price_range: PriceRange::AtLeast { min: 20.0 },
            min_rating: MinRating::AtLeast(3),
            category: Category::React,
            sort_key: SortKey::Name,
        };
        let (out, dbg) = apply_filters_with_debug(&sample(), &criteria);
        assert_eq!(ids(&out), vec![2]);
        assert_eq!(dbg, FilterDebugInfo { total: 5, after_price: 4, after_rating: 3, after_category: 1 });
    }

    #[test]
    fn collate_orders_letters_before_accents_before_case() {
        assert_eq!(collate("apple", "Banana"), Ordering::Less);
        assert_eq!(collate("apple", "Apple"), Ordering::Less);
        assert_eq!(collate("Éclair", "Zebra"), Ordering::Less);
        assert_eq!(collate("eclair", "éclair"), Ordering::Less);
        assert_eq!(collate("same", "same"), Ordering::Equal);
    }

    #[test]
    fn name_sort_places_accented_and_case_variants_by_collation() {
        let items = vec![
            item(1, "Zebra Patterns", 10.0, 3),
            item(2, "Éclair Baking", 10.0, 3),
            item(3, "react hooks", 10.0, 3),
            item(4, "React Hooks", 10.0, 3),
        ];
        assert_eq!(ids(&apply_filters(&items, &FilterCriteria::default())), vec![2, 3, 4, 1]);
    }
}
