use std::collections::HashMap;
use std::hash::Hash;

/// Sum counts per key, keeping keys in order of first appearance.
pub fn tally<K, I>(items: I) -> Vec<(K, usize)>
where
    K: Copy + Eq + Hash,
    I: IntoIterator<Item = (K, usize)>,
{
    let mut positions: HashMap<K, usize> = HashMap::new();
    let mut totals: Vec<(K, usize)> = Vec::new();
    for (key, count) in items {
        match positions.get(&key) {
            Some(&index) => totals[index].1 += count,
            None => {
                positions.insert(key, totals.len());
                totals.push((key, count));
            }
        }
    }
    totals
}

/// Highest counts first, zero counts dropped, ties kept in input order.
pub fn top_by<T, C, F>(mut items: Vec<T>, limit: usize, count: F) -> Vec<T>
where
    C: Ord + Default,
    F: Fn(&T) -> C,
{
    items.retain(|item| count(item) > C::default());
    items.sort_by(|a, b| count(b).cmp(&count(a)));
    items.truncate(limit);
    items
}

/// Percentage with two decimals; 0 when nothing was recorded.
pub fn percentage(part: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round2(f64::from(part) * 100.0 / f64::from(total))
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_merges_repeated_keys_in_first_seen_order() {
        let totals = tally([("b", 1), ("a", 2), ("b", 3), ("c", 0)]);
        assert_eq!(totals, vec![("b", 4), ("a", 2), ("c", 0)]);
    }

    #[test]
    fn top_by_is_stable_and_drops_zeroes() {
        let ranked = top_by(
            vec![("x", 2), ("y", 5), ("z", 2), ("w", 0), ("v", 5)],
            4,
            |item| item.1,
        );
        assert_eq!(ranked, vec![("y", 5), ("v", 5), ("x", 2), ("z", 2)]);
    }

    #[test]
    fn top_by_respects_limit() {
        let ranked = top_by((1..=20).collect::<Vec<u32>>(), 3, |value| *value);
        assert_eq!(ranked, vec![20, 19, 18]);
    }

    #[test]
    fn percentage_rounds_to_two_decimals() {
        assert_eq!(percentage(180, 200), 90.0);
        assert_eq!(percentage(2, 3), 66.67);
        assert_eq!(percentage(0, 0), 0.0);
    }
}
