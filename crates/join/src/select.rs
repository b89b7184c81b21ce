use std::collections::{HashMap, HashSet};

use rowweld_common::{Result, WeldError};
use rowweld_format::Record;
use rowweld_partition::PartitionedDataset;

/// One clause of a SELECT list: `field`, `N.field`, `field as alias`, or
/// `N.field as alias`, where `N` is a zero-based dataset ordinal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectClause {
    pub dataset: Option<usize>,
    pub field: String,
    pub alias: Option<String>,
}

/// Parses a comma-separated SELECT list. The `as` keyword is
/// case-insensitive.
pub fn parse_select(query: &str) -> Result<Vec<SelectClause>> {
    let mut clauses = Vec::new();
    for clause in query.split(',') {
        let words: Vec<&str> = clause.split_whitespace().collect();
        let (compound, alias) = match words.as_slice() {
            [compound] => (*compound, None),
            [compound, kw, alias] if kw.eq_ignore_ascii_case("as") => {
                (*compound, Some(alias.to_string()))
            }
            _ => {
                return Err(WeldError::InvalidConfig(format!(
                    "malformed SELECT clause: '{}'",
                    clause.trim()
                )))
            }
        };
        let (dataset, field) = split_compound(compound)?;
        clauses.push(SelectClause {
            dataset,
            field,
            alias,
        });
    }
    Ok(clauses)
}

fn split_compound(compound: &str) -> Result<(Option<usize>, String)> {
    match compound.split_once('.') {
        None => Ok((None, compound.to_string())),
        Some((ordinal, field)) => {
            let dataset = ordinal.parse::<usize>().map_err(|_| {
                WeldError::InvalidConfig(format!(
                    "'{compound}': dataset qualifier must be a number"
                ))
            })?;
            Ok((Some(dataset), field.to_string()))
        }
    }
}

/// The concatenated schema of a join: every input's fields laid out in
/// dataset order, with enough bookkeeping to resolve selections.
#[derive(Debug, Clone)]
pub struct JoinSchema {
    field_names: Vec<Vec<String>>,
    key_indices: Vec<usize>,
    offsets: Vec<usize>,
}

/// A resolved output column selection over the concatenated join row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    /// Positions into the concatenated row, in output order.
    pub indices: Vec<usize>,
    /// Output field names, parallel to `indices`.
    pub names: Vec<String>,
}

impl Projection {
    /// Applies the selection to one joined row. A row shorter than the
    /// manifest arity promises (a corrupt or foreign shard) is a format
    /// error, not a panic.
    pub fn apply(&self, row: &Record) -> Result<Record> {
        self.indices
            .iter()
            .map(|&i| {
                row.get(i).cloned().ok_or_else(|| {
                    WeldError::Format(format!(
                        "joined row has {} fields, projection expects index {i}",
                        row.len()
                    ))
                })
            })
            .collect()
    }
}

impl JoinSchema {
    pub fn new(datasets: &[PartitionedDataset]) -> Self {
        let mut offsets = Vec::with_capacity(datasets.len());
        let mut total = 0;
        for dataset in datasets {
            offsets.push(total);
            total += dataset.field_names().len();
        }
        Self {
            field_names: datasets.iter().map(|d| d.field_names().to_vec()).collect(),
            key_indices: datasets.iter().map(|d| d.key_index()).collect(),
            offsets,
        }
    }

    /// The default output: every probe-side field, then each build side's
    /// fields minus its join key. The key already appears once via the probe
    /// side; repeating it per input would just echo the equality predicate.
    pub fn default_projection(&self) -> Projection {
        let mut indices = Vec::new();
        let mut names = Vec::new();
        let mut used: HashSet<String> = HashSet::new();
        for (dataset, fields) in self.field_names.iter().enumerate() {
            for (fieldnum, field) in fields.iter().enumerate() {
                if dataset > 0 && fieldnum == self.key_indices[dataset] {
                    continue;
                }
                indices.push(self.offsets[dataset] + fieldnum);
                let name = if used.contains(field) {
                    format!("{field}_{dataset}")
                } else {
                    field.clone()
                };
                used.insert(name.clone());
                names.push(name);
            }
        }
        Projection { indices, names }
    }

    /// Resolves SELECT clauses against the joined schema.
    ///
    /// Resolution rules:
    /// - an unqualified name matching several datasets is ambiguous; the
    ///   error suggests the qualified spellings
    /// - an unknown name fails with [`WeldError::UnknownField`]
    /// - a missing alias defaults to the bare name, or `name_<dataset>` when
    ///   the bare name is already taken
    /// - duplicate explicit aliases are rejected
    pub fn resolve(&self, clauses: &[SelectClause]) -> Result<Projection> {
        let mut lut: HashMap<&str, Vec<usize>> = HashMap::new();
        for (dataset, fields) in self.field_names.iter().enumerate() {
            for field in fields {
                lut.entry(field.as_str()).or_default().push(dataset);
            }
        }

        let mut indices = Vec::with_capacity(clauses.len());
        let mut names = Vec::with_capacity(clauses.len());
        let mut used: HashSet<String> = HashSet::new();

        for clause in clauses {
            let dataset = match clause.dataset {
                Some(d) => {
                    if d >= self.field_names.len() {
                        return Err(WeldError::UnknownField(format!(
                            "'{}.{}': no dataset {} in this join",
                            d, clause.field, d
                        )));
                    }
                    d
                }
                None => {
                    let candidates = lut.get(clause.field.as_str()).ok_or_else(|| {
                        WeldError::UnknownField(format!(
                            "'{}' is not a field of any joined dataset",
                            clause.field
                        ))
                    })?;
                    if candidates.len() > 1 {
                        let alternatives = candidates
                            .iter()
                            .map(|d| format!("{d}.{}", clause.field))
                            .collect::<Vec<_>>()
                            .join(", ");
                        return Err(WeldError::InvalidConfig(format!(
                            "'{}' is ambiguous, qualify it as one of: {alternatives}",
                            clause.field
                        )));
                    }
                    candidates[0]
                }
            };

            let fieldnum = self.field_names[dataset]
                .iter()
                .position(|f| f == &clause.field)
                .ok_or_else(|| {
                    WeldError::UnknownField(format!(
                        "'{}' is not a field of dataset {dataset}",
                        clause.field
                    ))
                })?;

            let alias = match &clause.alias {
                Some(alias) => {
                    if used.contains(alias) {
                        return Err(WeldError::InvalidConfig(format!(
                            "'{alias}' is a non-unique alias"
                        )));
                    }
                    alias.clone()
                }
                None if !used.contains(&clause.field) => clause.field.clone(),
                None => format!("{}_{dataset}", clause.field),
            };

            indices.push(self.offsets[dataset] + fieldnum);
            used.insert(alias.clone());
            names.push(alias);
        }

        Ok(Projection { indices, names })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowweld_format::Value;

    fn clause(dataset: Option<usize>, field: &str, alias: Option<&str>) -> SelectClause {
        SelectClause {
            dataset,
            field: field.to_string(),
            alias: alias.map(str::to_string),
        }
    }

    /// Builds a schema directly, bypassing dataset directories.
    fn schema(headers: &[&[&str]], key_indices: &[usize]) -> JoinSchema {
        let field_names: Vec<Vec<String>> = headers
            .iter()
            .map(|h| h.iter().map(|s| s.to_string()).collect())
            .collect();
        let mut offsets = Vec::new();
        let mut total = 0;
        for fields in &field_names {
            offsets.push(total);
            total += fields.len();
        }
        JoinSchema {
            field_names,
            key_indices: key_indices.to_vec(),
            offsets,
        }
    }

    #[test]
    fn parse_select_simple() {
        let actual = parse_select("foo, bar, baz").unwrap();
        let expected = vec![
            clause(None, "foo", None),
            clause(None, "bar", None),
            clause(None, "baz", None),
        ];
        assert_eq!(actual, expected);
    }

    #[test]
    fn parse_select_qualified() {
        let actual = parse_select("1.foo, 1.bar, 2.baz").unwrap();
        let expected = vec![
            clause(Some(1), "foo", None),
            clause(Some(1), "bar", None),
            clause(Some(2), "baz", None),
        ];
        assert_eq!(actual, expected);
    }

    #[test]
    fn parse_select_aliased() {
        let actual = parse_select("foo as FOO, bar as BAR").unwrap();
        let expected = vec![
            clause(None, "foo", Some("FOO")),
            clause(None, "bar", Some("BAR")),
        ];
        assert_eq!(actual, expected);
    }

    #[test]
    fn parse_select_qualified_aliased_case_insensitive() {
        let actual = parse_select("1.foo as FOO, 1.bar AS BaR, 2.baz aS bAZ").unwrap();
        let expected = vec![
            clause(Some(1), "foo", Some("FOO")),
            clause(Some(1), "bar", Some("BaR")),
            clause(Some(2), "baz", Some("bAZ")),
        ];
        assert_eq!(actual, expected);
    }

    #[test]
    fn parse_select_malformed() {
        assert!(parse_select("foo az fu, bar iz ba").is_err());
    }

    #[test]
    fn resolve_simple() {
        let s = schema(&[&["foo", "bar"], &["baz", "boz"]], &[0, 0]);
        let p = s
            .resolve(&parse_select("foo, boz").unwrap())
            .unwrap();
        assert_eq!(p.indices, vec![0, 3]);
        assert_eq!(p.names, vec!["foo", "boz"]);
    }

    #[test]
    fn resolve_aliased() {
        let s = schema(&[&["foo", "bar"], &["baz", "boz"]], &[0, 0]);
        let p = s
            .resolve(&parse_select("foo as FOO, boz as BoZ").unwrap())
            .unwrap();
        assert_eq!(p.names, vec!["FOO", "BoZ"]);
    }

    #[test]
    fn resolve_ambiguous_name_suggests_qualifiers() {
        let s = schema(&[&["foo", "bar"], &["baz", "foo"]], &[0, 0]);
        let err = s
            .resolve(&parse_select("foo as FOO, baz as BAZ").unwrap())
            .unwrap_err();
        assert!(err.to_string().contains("0.foo"));
        assert!(err.to_string().contains("1.foo"));
    }

    #[test]
    fn resolve_unknown_field() {
        let s = schema(&[&["foo", "bar"], &["baz", "foo"]], &[0, 0]);
        let err = s
            .resolve(&parse_select("foo as FOO, biz").unwrap())
            .unwrap_err();
        assert!(matches!(err, WeldError::UnknownField(_)));
    }

    #[test]
    fn resolve_rejects_duplicate_aliases() {
        let s = schema(&[&["foo", "bar"], &["baz", "foo"]], &[0, 0]);
        assert!(s
            .resolve(&parse_select("0.foo as FOO, 1.foo as FOO").unwrap())
            .is_err());
    }

    #[test]
    fn resolve_auto_aliases_collisions() {
        let s = schema(&[&["foo", "bar"], &["baz", "foo"]], &[0, 0]);
        let p = s
            .resolve(&parse_select("0.foo, 1.foo").unwrap())
            .unwrap();
        assert_eq!(p.names, vec!["foo", "foo_1"]);
        assert_eq!(p.indices, vec![0, 3]);
    }

    #[test]
    fn default_projection_drops_build_side_keys() {
        let s = schema(&[&["iso3", "name"], &["iso3", "currency"]], &[0, 0]);
        let p = s.default_projection();
        assert_eq!(p.indices, vec![0, 1, 3]);
        assert_eq!(p.names, vec!["iso3", "name", "currency"]);
    }

    #[test]
    fn projecting_all_fields_in_order_is_identity() {
        let s = schema(&[&["a", "b"], &["k", "c"]], &[0, 0]);
        let p = s
            .resolve(&parse_select("0.a, 0.b, 1.k, 1.c").unwrap())
            .unwrap();
        let row = vec![
            Value::Int(1),
            Value::Int(2),
            Value::Int(3),
            Value::Int(4),
        ];
        assert_eq!(p.apply(&row).unwrap(), row);
    }

    #[test]
    fn applying_to_a_short_row_is_a_format_error() {
        let s = schema(&[&["iso3", "name"], &["iso3", "currency"]], &[0, 0]);
        let p = s.default_projection();
        // Arity promised by the manifests is 4; this row carries 3.
        let short = vec![
            Value::Str("AND".to_string()),
            Value::Str("AND".to_string()),
            Value::Str("Euro".to_string()),
        ];
        let err = p.apply(&short).unwrap_err();
        assert!(matches!(err, WeldError::Format(_)));
        assert!(err.to_string().contains("3 fields"), "got: {err}");
    }
}
