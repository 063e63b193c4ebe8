//! Join operators over row tuples pulled from the local mirror store.
//!
//! Qualified joins run a sort-merge when both inputs arrive sorted by their
//! equality keys (grouping is streaming; a side that is not pre-sorted is
//! materialized and sorted first) and fall back to a nested loop when the ON
//! condition yields no equality pairs. Outer variants share one merge with
//! two pad flags, which keeps left and right joins mirror images of each
//! other.

use std::cmp::Ordering;
use std::rc::Rc;

use crate::parser::JoinKind;
use crate::schema::Value;

pub type Row = Vec<Value>;

/// Residual acceptance test over a concatenated `left ++ right` row.
pub type RowPredicate = Rc<dyn Fn(&[Value]) -> bool>;

/// A stream of rows of a fixed width, optionally sorted by some offsets.
pub struct RowStream {
    pub iter: Box<dyn Iterator<Item = Row>>,
    pub width: usize,
    /// Row offsets the stream is sorted by, ascending, in significance order.
    pub sorted_by: Vec<usize>,
}

impl RowStream {
    pub fn from_rows(rows: Vec<Row>, width: usize, sorted_by: Vec<usize>) -> Self {
        RowStream {
            iter: Box::new(rows.into_iter()),
            width,
            sorted_by,
        }
    }

    fn is_sorted_for(&self, keys: &[usize]) -> bool {
        self.sorted_by.len() >= keys.len()
            && self.sorted_by.iter().zip(keys).all(|(have, want)| have == want)
    }

    /// Materializes and, unless already ordered so, sorts by `keys`.
    fn sorted(self, keys: &[usize]) -> Vec<Row> {
        let already = self.is_sorted_for(keys);
        let mut rows: Vec<Row> = self.iter.collect();
        if !already {
            rows.sort_by(|a, b| compare_keys(a, b, keys, keys));
        }
        rows
    }
}

fn compare_keys(a: &[Value], b: &[Value], akeys: &[usize], bkeys: &[usize]) -> Ordering {
    for (&i, &j) in akeys.iter().zip(bkeys) {
        match a[i].cmp_total(&b[j]) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

fn cmp_key(a: &[Value], b: &[Value]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        match x.cmp_total(y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

fn key_of(row: &[Value], keys: &[usize]) -> Vec<Value> {
    keys.iter().map(|&i| row[i].clone()).collect()
}

fn has_null(key: &[Value]) -> bool {
    key.iter().any(Value::is_null)
}

fn padded(row: &[Value], nulls_after: usize) -> Row {
    let mut out = row.to_vec();
    out.extend(std::iter::repeat_n(Value::Null, nulls_after));
    out
}

fn padded_front(row: &[Value], nulls_before: usize) -> Row {
    let mut out = vec![Value::Null; nulls_before];
    out.extend_from_slice(row);
    out
}

/// Cartesian product; the right side is materialized, the left streams.
pub fn cross_join(left: RowStream, right: RowStream) -> RowStream {
    let right_rows: Vec<Row> = right.iter.collect();
    let width = left.width + right.width;
    let sorted_by = left.sorted_by.clone();
    let iter = left.iter.flat_map(move |lrow| {
        right_rows
            .clone()
            .into_iter()
            .map(move |rrow| {
                let mut row = lrow.clone();
                row.extend(rrow);
                row
            })
    });
    RowStream {
        iter: Box::new(iter),
        width,
        sorted_by,
    }
}

/// Inner or outer join with an ON condition.
///
/// `keys` are `(left offset, right offset)` equality pairs; when present the
/// join merges by key order, otherwise every candidate pair goes through the
/// nested loop.
pub fn qualified_join(
    kind: JoinKind,
    left: RowStream,
    right: RowStream,
    spec: Option<RowPredicate>,
    keys: &[(usize, usize)],
) -> RowStream {
    debug_assert!(kind != JoinKind::Cross);
    let pad_left = matches!(kind, JoinKind::Left | JoinKind::Full);
    let pad_right = matches!(kind, JoinKind::Right | JoinKind::Full);

    if keys.is_empty() {
        nested_loop(left, right, spec, pad_left, pad_right)
    } else {
        merge(left, right, spec, keys, pad_left, pad_right)
    }
}

fn accepts(spec: &Option<RowPredicate>, row: &[Value]) -> bool {
    spec.as_ref().map_or(true, |s| s(row))
}

fn nested_loop(
    left: RowStream,
    right: RowStream,
    spec: Option<RowPredicate>,
    pad_left: bool,
    pad_right: bool,
) -> RowStream {
    let left_width = left.width;
    let right_width = right.width;
    let right_rows: Vec<Row> = right.iter.collect();
    let mut right_matched = vec![false; right_rows.len()];
    let mut out: Vec<Row> = Vec::new();

    for lrow in left.iter {
        let mut matched = false;
        for (j, rrow) in right_rows.iter().enumerate() {
            let mut row = lrow.clone();
            row.extend(rrow.iter().cloned());
            if accepts(&spec, &row) {
                matched = true;
                right_matched[j] = true;
                out.push(row);
            }
        }
        if !matched && pad_left {
            out.push(padded(&lrow, right_width));
        }
    }
    if pad_right {
        for (j, rrow) in right_rows.iter().enumerate() {
            if !right_matched[j] {
                out.push(padded_front(rrow, left_width));
            }
        }
    }

    RowStream::from_rows(out, left_width + right_width, Vec::new())
}

/// Streaming group-by over a sorted row iterator.
struct KeyGroups {
    iter: std::iter::Peekable<Box<dyn Iterator<Item = Row>>>,
    keys: Vec<usize>,
}

impl KeyGroups {
    fn new(iter: Box<dyn Iterator<Item = Row>>, keys: Vec<usize>) -> Self {
        KeyGroups {
            iter: iter.peekable(),
            keys,
        }
    }
}

impl Iterator for KeyGroups {
    type Item = (Vec<Value>, Vec<Row>);

    fn next(&mut self) -> Option<Self::Item> {
        let first = self.iter.next()?;
        let key = key_of(&first, &self.keys);
        let mut rows = vec![first];
        while let Some(candidate) = self.iter.peek() {
            if key_of(candidate, &self.keys) == key {
                rows.push(self.iter.next().expect("peeked row"));
            } else {
                break;
            }
        }
        Some((key, rows))
    }
}

fn merge(
    left: RowStream,
    right: RowStream,
    spec: Option<RowPredicate>,
    keys: &[(usize, usize)],
    pad_left: bool,
    pad_right: bool,
) -> RowStream {
    let left_width = left.width;
    let right_width = right.width;
    let lkeys: Vec<usize> = keys.iter().map(|(l, _)| *l).collect();
    let rkeys: Vec<usize> = keys.iter().map(|(_, r)| *r).collect();

    let left_rows = left.sorted(&lkeys);
    let right_rows = right.sorted(&rkeys);

    let mut left_groups =
        KeyGroups::new(Box::new(left_rows.into_iter()), lkeys.clone());
    let mut right_groups =
        KeyGroups::new(Box::new(right_rows.into_iter()), rkeys.clone());

    let mut out: Vec<Row> = Vec::new();
    let mut cur_left = left_groups.next();
    let mut cur_right = right_groups.next();

    let pad_left_group = |rows: &[Row], out: &mut Vec<Row>| {
        if pad_left {
            for row in rows {
                out.push(padded(row, right_width));
            }
        }
    };
    let pad_right_group = |rows: &[Row], out: &mut Vec<Row>| {
        if pad_right {
            for row in rows {
                out.push(padded_front(row, left_width));
            }
        }
    };

    loop {
        match (&cur_left, &cur_right) {
            (None, None) => break,
            (Some((_, lrows)), None) => {
                pad_left_group(lrows, &mut out);
                cur_left = left_groups.next();
            }
            (None, Some((_, rrows))) => {
                pad_right_group(rrows, &mut out);
                cur_right = right_groups.next();
            }
            (Some((lkey, lrows)), Some((rkey, rrows))) => {
                // NULL keys never match anything
                if has_null(lkey) {
                    pad_left_group(lrows, &mut out);
                    cur_left = left_groups.next();
                } else if has_null(rkey) {
                    pad_right_group(rrows, &mut out);
                    cur_right = right_groups.next();
                } else {
                    match cmp_key(lkey, rkey) {
                        Ordering::Equal => {
                            let mut right_hit = vec![false; rrows.len()];
                            for lrow in lrows {
                                let mut hit = false;
                                for (j, rrow) in rrows.iter().enumerate() {
                                    let mut row = lrow.clone();
                                    row.extend(rrow.iter().cloned());
                                    if accepts(&spec, &row) {
                                        hit = true;
                                        right_hit[j] = true;
                                        out.push(row);
                                    }
                                }
                                if !hit && pad_left {
                                    out.push(padded(lrow, right_width));
                                }
                            }
                            if pad_right {
                                for (j, rrow) in rrows.iter().enumerate() {
                                    if !right_hit[j] {
                                        out.push(padded_front(rrow, left_width));
                                    }
                                }
                            }
                            cur_left = left_groups.next();
                            cur_right = right_groups.next();
                        }
                        Ordering::Less => {
                            pad_left_group(lrows, &mut out);
                            cur_left = left_groups.next();
                        }
                        Ordering::Greater => {
                            pad_right_group(rrows, &mut out);
                            cur_right = right_groups.next();
                        }
                    }
                }
            }
        }
    }

    RowStream::from_rows(out, left_width + right_width, lkeys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn rows(data: &[&[i64]]) -> Vec<Row> {
        data.iter()
            .map(|r| r.iter().map(|&v| Value::Int(v)).collect())
            .collect()
    }

    fn stream(data: &[&[i64]], width: usize) -> RowStream {
        RowStream::from_rows(rows(data), width, Vec::new())
    }

    fn nullable_stream(data: &[&[Option<i64>]], width: usize) -> RowStream {
        let rows = data
            .iter()
            .map(|r| {
                r.iter()
                    .map(|v| v.map(Value::Int).unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        RowStream::from_rows(rows, width, Vec::new())
    }

    fn collect(stream: RowStream) -> Vec<Row> {
        stream.iter.collect()
    }

    #[rstest]
    fn cross_join_is_cartesian() {
        let left = stream(&[&[1], &[2]], 1);
        let right = stream(&[&[10], &[20]], 1);
        let out = collect(cross_join(left, right));
        assert_eq!(out.len(), 4);
        assert_eq!(out[0], vec![Value::Int(1), Value::Int(10)]);
        assert_eq!(out[3], vec![Value::Int(2), Value::Int(20)]);
    }

    #[rstest]
    fn inner_merge_matches_by_key() {
        let left = stream(&[&[1, 100], &[2, 200], &[4, 400]], 2);
        let right = stream(&[&[2, 7], &[3, 8], &[4, 9]], 2);
        let out = collect(qualified_join(
            JoinKind::Inner,
            left,
            right,
            None,
            &[(0, 0)],
        ));
        assert_eq!(
            out,
            vec![
                vec![Value::Int(2), Value::Int(200), Value::Int(2), Value::Int(7)],
                vec![Value::Int(4), Value::Int(400), Value::Int(4), Value::Int(9)],
            ]
        );
    }

    #[rstest]
    fn left_join_pads_unmatched_rows() {
        let left = stream(&[&[1], &[2]], 1);
        let right = stream(&[&[2], &[3]], 1);
        let out = collect(qualified_join(JoinKind::Left, left, right, None, &[(0, 0)]));
        assert_eq!(
            out,
            vec![
                vec![Value::Int(1), Value::Null],
                vec![Value::Int(2), Value::Int(2)],
            ]
        );
    }

    #[rstest]
    fn right_join_mirrors_left() {
        let left = stream(&[&[1], &[2]], 1);
        let right = stream(&[&[2], &[3]], 1);
        let out = collect(qualified_join(JoinKind::Right, left, right, None, &[(0, 0)]));
        assert_eq!(
            out,
            vec![
                vec![Value::Int(2), Value::Int(2)],
                vec![Value::Null, Value::Int(3)],
            ]
        );
    }

    #[rstest]
    fn full_join_pads_both_sides() {
        let left = stream(&[&[1], &[2]], 1);
        let right = stream(&[&[2], &[3]], 1);
        let out = collect(qualified_join(JoinKind::Full, left, right, None, &[(0, 0)]));
        assert_eq!(out.len(), 3);
        assert!(out.contains(&vec![Value::Int(1), Value::Null]));
        assert!(out.contains(&vec![Value::Int(2), Value::Int(2)]));
        assert!(out.contains(&vec![Value::Null, Value::Int(3)]));
    }

    #[rstest]
    fn null_keys_never_match() {
        let left = nullable_stream(&[&[None], &[Some(1)]], 1);
        let right = nullable_stream(&[&[None], &[Some(1)]], 1);
        let inner = collect(qualified_join(
            JoinKind::Inner,
            nullable_stream(&[&[None], &[Some(1)]], 1),
            nullable_stream(&[&[None], &[Some(1)]], 1),
            None,
            &[(0, 0)],
        ));
        assert_eq!(inner, vec![vec![Value::Int(1), Value::Int(1)]]);

        let left_join = collect(qualified_join(JoinKind::Left, left, right, None, &[(0, 0)]));
        // the NULL-keyed left row survives, padded
        assert!(left_join.contains(&vec![Value::Null, Value::Null]));
        assert!(left_join.contains(&vec![Value::Int(1), Value::Int(1)]));
        assert_eq!(left_join.len(), 2);
    }

    #[rstest]
    fn duplicate_keys_produce_group_product() {
        let left = stream(&[&[1, 10], &[1, 11]], 2);
        let right = stream(&[&[1, 20], &[1, 21]], 2);
        let out = collect(qualified_join(
            JoinKind::Inner,
            left,
            right,
            None,
            &[(0, 0)],
        ));
        assert_eq!(out.len(), 4);
    }

    #[rstest]
    fn unsorted_inputs_are_sorted_before_merge() {
        let left = stream(&[&[3], &[1], &[2]], 1);
        let right = stream(&[&[2], &[3], &[1]], 1);
        let out = collect(qualified_join(
            JoinKind::Inner,
            left,
            right,
            None,
            &[(0, 0)],
        ));
        assert_eq!(out.len(), 3);
        // merge emits in key order
        assert_eq!(out[0][0], Value::Int(1));
        assert_eq!(out[2][0], Value::Int(3));
    }

    #[rstest]
    fn nested_loop_applies_predicate() {
        // no equality pairs: brute force with a residual test
        let spec: RowPredicate = Rc::new(|row: &[Value]| {
            matches!(
                (row[0].clone(), row[1].clone()),
                (Value::Int(l), Value::Int(r)) if l < r
            )
        });
        let left = stream(&[&[1], &[5]], 1);
        let right = stream(&[&[3], &[4]], 1);
        let out = collect(qualified_join(JoinKind::Inner, left, right, Some(spec), &[]));
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|r| r[0] == Value::Int(1)));
    }

    #[rstest]
    fn left_row_rejected_by_spec_is_padded() {
        // key matches but the residual rejects every pair: the left row must
        // still appear once
        let spec: RowPredicate = Rc::new(|_row: &[Value]| false);
        let left = stream(&[&[1]], 1);
        let right = stream(&[&[1]], 1);
        let out = collect(qualified_join(
            JoinKind::Left,
            left,
            right,
            Some(spec),
            &[(0, 0)],
        ));
        assert_eq!(out, vec![vec![Value::Int(1), Value::Null]]);
    }

    #[rstest]
    fn merge_output_is_sorted_by_left_keys() {
        let left = stream(&[&[2], &[1]], 1);
        let right = stream(&[&[1], &[2]], 1);
        let out = qualified_join(JoinKind::Inner, left, right, None, &[(0, 0)]);
        assert_eq!(out.sorted_by, vec![0]);
    }
}
