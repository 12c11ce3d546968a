//! Stage executor over JSON rows.

use super::{Accumulator, BucketSpec, FacetSpec, GroupKey, GroupSpec, Row, SortOrder, SortSpec, Stage};
use serde_json::{Map, Number, Value};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

/// Runs `stages` in order over `rows`.
pub fn run(stages: &[Stage], rows: Vec<Row>) -> Vec<Row> {
    stages
        .iter()
        .fold(rows, |rows, stage| run_stage(stage, rows))
}

fn run_stage(stage: &Stage, mut rows: Vec<Row>) -> Vec<Row> {
    match stage {
        Stage::RequirePresent(path) => {
            rows.retain(|row| lookup(row, path).is_some_and(is_present));
            rows
        }
        Stage::Group(spec) => group(spec, rows),
        Stage::Sort(spec) => {
            sort(spec, &mut rows);
            rows
        }
        Stage::Skip(n) => rows.into_iter().skip(*n).collect(),
        Stage::Limit(n) => {
            rows.truncate(*n);
            rows
        }
        Stage::Bucket(spec) => bucket(spec, &rows),
        Stage::Facet(spec) => vec![facet(spec, rows)],
        Stage::Project(fields) => rows
            .iter()
            .map(|row| {
                fields
                    .iter()
                    .map(|(out, path)| {
                        (out.clone(), lookup(row, path).cloned().unwrap_or(Value::Null))
                    })
                    .collect()
            })
            .collect(),
    }
}

/// Reads a dot path (`_id.platform`, `dubbing.hindi`).
pub fn lookup<'a>(row: &'a Row, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = row.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

/// Total order over JSON values: null < bool < number < string < array < object.
pub fn compare(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Object(x), Value::Object(y)) => {
            for ((kx, vx), (ky, vy)) in x.iter().zip(y.iter()) {
                let ord = kx.cmp(ky).then_with(|| compare(vx, vy));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Array(x), Value::Array(y)) => {
            for (vx, vy) in x.iter().zip(y.iter()) {
                let ord = compare(vx, vy);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Rounds to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Whole numbers render as integers, everything else as a float.
pub fn number(value: f64) -> Value {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 9.0e15 {
        Value::from(value as i64)
    } else {
        Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
    }
}

pub fn format_bound(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

fn group_key(key: &GroupKey, row: &Row) -> Value {
    let read = |path: &str| lookup(row, path).cloned().unwrap_or(Value::Null);
    match key {
        GroupKey::Global => Value::Null,
        GroupKey::Single(path) => read(path),
        GroupKey::Composite(named) => Value::Object(
            named
                .iter()
                .map(|(name, path)| (name.clone(), read(path)))
                .collect::<Map<String, Value>>(),
        ),
    }
}

fn group(spec: &GroupSpec, rows: Vec<Row>) -> Vec<Row> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(Value, Vec<Row>)> = Vec::new();

    for row in rows {
        let key = group_key(&spec.key, &row);
        let slot = *index.entry(key.to_string()).or_insert_with(|| {
            groups.push((key.clone(), Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(row);
    }
    groups.sort_by(|a, b| compare(&a.0, &b.0));

    groups
        .into_iter()
        .map(|(key, members)| {
            let mut out = Row::new();
            out.insert("_id".to_string(), key);
            for (name, acc) in &spec.accumulators {
                out.insert(name.clone(), accumulate(acc, &members));
            }
            out
        })
        .collect()
}

fn numbers<'a>(rows: &'a [Row], path: &'a str) -> impl Iterator<Item = f64> + 'a {
    rows.iter()
        .filter_map(move |row| lookup(row, path).and_then(Value::as_f64))
}

fn distinct<'a>(rows: &'a [Row], path: &str) -> Vec<&'a Value> {
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut values: Vec<&Value> = rows
        .iter()
        .filter_map(|row| lookup(row, path))
        .filter(|v| is_present(v))
        .filter(|v| seen.insert(v.to_string()))
        .collect();
    values.sort_by(|a, b| compare(a, b));
    values
}

fn accumulate(acc: &Accumulator, rows: &[Row]) -> Value {
    match acc {
        Accumulator::Count => Value::from(rows.len()),
        Accumulator::Sum(path) => number(round2(numbers(rows, path).sum())),
        Accumulator::Avg(path) => {
            let (sum, n) = numbers(rows, path).fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
            if n == 0 {
                Value::Null
            } else {
                number(round2(sum / n as f64))
            }
        }
        Accumulator::Min(path) => extreme(rows, path, Ordering::Less),
        Accumulator::Max(path) => extreme(rows, path, Ordering::Greater),
        Accumulator::DistinctCount(path) => Value::from(distinct(rows, path).len()),
        Accumulator::DistinctValues(path) => {
            Value::Array(distinct(rows, path).into_iter().cloned().collect())
        }
        Accumulator::CountTrue(path) => Value::from(
            rows.iter()
                .filter(|row| lookup(row, path) == Some(&Value::Bool(true)))
                .count(),
        ),
    }
}

fn extreme(rows: &[Row], path: &str, want: Ordering) -> Value {
    rows.iter()
        .filter_map(|row| lookup(row, path))
        .filter(|v| !v.is_null())
        .fold(None::<&Value>, |best, v| match best {
            Some(b) if compare(v, b) != want => Some(b),
            _ => Some(v),
        })
        .cloned()
        .unwrap_or(Value::Null)
}

fn sort(spec: &SortSpec, rows: &mut [Row]) {
    rows.sort_by(|a, b| {
        for (path, order) in &spec.0 {
            let null = Value::Null;
            let va = lookup(a, path).unwrap_or(&null);
            let vb = lookup(b, path).unwrap_or(&null);
            let ord = compare(va, vb);
            if ord != Ordering::Equal {
                return match order {
                    SortOrder::Asc => ord,
                    SortOrder::Desc => ord.reverse(),
                };
            }
        }
        Ordering::Equal
    });
}

fn bucket(spec: &BucketSpec, rows: &[Row]) -> Vec<Row> {
    let ranges = spec.boundaries.len().saturating_sub(1);
    let mut slots: Vec<Vec<Row>> = vec![Vec::new(); ranges + 1];

    for row in rows {
        let Some(value) = lookup(row, &spec.path).and_then(Value::as_f64) else {
            continue;
        };
        let Some(&first) = spec.boundaries.first() else {
            continue;
        };
        if value < first {
            continue;
        }
        // Index of the last boundary <= value.
        let slot = spec.boundaries.partition_point(|&b| b <= value) - 1;
        if slot < ranges {
            slots[slot].push(row.clone());
        } else if spec.overflow.is_some() {
            slots[ranges].push(row.clone());
        }
    }

    let labels = spec.labels();
    slots
        .into_iter()
        .zip(labels)
        .enumerate()
        .map(|(i, (members, label))| {
            let mut out = Row::new();
            out.insert("_id".to_string(), Value::String(label));
            out.insert("min".to_string(), number(spec.boundaries[i]));
            let max = spec
                .boundaries
                .get(i + 1)
                .map(|&b| number(b))
                .unwrap_or(Value::Null);
            out.insert("max".to_string(), max);
            for (name, acc) in &spec.accumulators {
                out.insert(name.clone(), accumulate(acc, &members));
            }
            out
        })
        .collect()
}

fn facet(spec: &FacetSpec, rows: Vec<Row>) -> Row {
    spec.0
        .iter()
        .map(|(name, stages)| {
            let out = run(stages, rows.clone());
            (name.clone(), Value::Array(out.into_iter().map(Value::Object).collect()))
        })
        .collect()
}
