//! Cost-only rewrites of an operation list

use tracing::debug;

use crate::ops::Operation;

/// Rewrite `operations` into an equivalent, cheaper sequence.
///
/// - `[Sort, Filter]` becomes `[Filter, Sort]`: a filter does not look at
///   record order, and running it first shrinks the sort's input. Applied until
///   nothing moves, so a filter hops over a whole run of sorts.
/// - `[Limit(a), Limit(b)]` becomes `[Limit(min(a, b))]`.
///
/// When the original list succeeds, the rewritten list succeeds with the same
/// records. The reverse does not hold: a sort that would fail on a column of
/// mixed types can succeed once the filter has dropped the offending records.
/// Rewrites only ever remove errors, they never introduce one.
pub fn optimize(operations: &[Operation]) -> Vec<Operation> {
    let mut ops = operations.to_vec();
    let mut swaps = 0usize;

    loop {
        let mut changed = false;
        for i in 1..ops.len() {
            if ops[i - 1].is_sort() && ops[i].is_filter() {
                ops.swap(i - 1, i);
                swaps += 1;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    let before = ops.len();
    let ops = merge_limits(ops);
    let merged = before - ops.len();

    if swaps > 0 || merged > 0 {
        debug!(swaps, merged_limits = merged, "optimized pipeline");
    }
    ops
}

fn merge_limits(ops: Vec<Operation>) -> Vec<Operation> {
    let mut out: Vec<Operation> = Vec::with_capacity(ops.len());
    for op in ops {
        if let (Some(Operation::Limit(prev)), Operation::Limit(next)) = (out.last_mut(), &op) {
            *prev = prev.merge(*next);
            continue;
        }
        out.push(op);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::SortKey;

    fn names(ops: &[Operation]) -> Vec<&'static str> {
        ops.iter().map(Operation::name).collect()
    }

    #[test]
    fn test_sort_filter_is_swapped() {
        let ops = vec![
            Operation::sort(vec![SortKey::asc("a")]),
            Operation::filter(|_| true),
        ];
        assert_eq!(names(&optimize(&ops)), vec!["filter", "sort"]);
        // input untouched
        assert_eq!(names(&ops), vec!["sort", "filter"]);
    }

    #[test]
    fn test_filter_hops_over_sort_run() {
        let ops = vec![
            Operation::limit(5),
            Operation::sort(vec![SortKey::asc("a")]),
            Operation::sort(vec![SortKey::desc("b")]),
            Operation::filter(|_| true),
        ];
        assert_eq!(
            names(&optimize(&ops)),
            vec!["limit", "filter", "sort", "sort"]
        );
    }

    #[test]
    fn test_filter_never_crosses_other_operations() {
        let ops = vec![
            Operation::sort(vec![SortKey::asc("a")]),
            Operation::limit(1),
            Operation::filter(|_| true),
            Operation::add_column("x", |_| 1),
            Operation::sort(vec![SortKey::asc("x")]),
        ];
        assert_eq!(names(&optimize(&ops)), names(&ops));
    }

    #[test]
    fn test_adjacent_limits_merge() {
        let ops = vec![Operation::limit(7), Operation::limit(3), Operation::limit(9)];
        let optimized = optimize(&ops);
        assert_eq!(optimized.len(), 1);
        assert!(matches!(&optimized[0], Operation::Limit(l) if l.count() == 3));
    }

    #[test]
    fn test_idempotent() {
        let ops = vec![
            Operation::sort(vec![SortKey::asc("a")]),
            Operation::filter(|_| true),
            Operation::limit(2),
            Operation::limit(1),
        ];
        let once = optimize(&ops);
        assert_eq!(names(&optimize(&once)), names(&once));
    }
}
