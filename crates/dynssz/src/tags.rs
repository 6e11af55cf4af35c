//! Tag parsing.
//!
//! Field annotations arrive as the raw tag-string syntax (`ssz-size:"?,32"`)
//! and are parsed into per-nesting-level hint lists. `dynssz-size` and
//! `dynssz-max` entries may be spec expressions; a resolved value overrides
//! the matching literal and marks the hint as spec-driven, an unresolved one
//! falls back to the literal.

use smallvec::SmallVec;

use crate::descriptor::SszType;
use crate::error::SszError;
use crate::specs::SpecResolver;
use crate::typedef::FieldTags;

/// One nesting level of declared size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SizeHint {
    /// The resolved size; meaningless when `dynamic`.
    pub(crate) value: u64,
    /// `?` — the level is variable-length.
    pub(crate) dynamic: bool,
    /// A spec value overrode the literal default.
    pub(crate) from_spec: bool,
    /// The originating spec expression, when one was declared.
    pub(crate) expr: Option<String>,
}

/// One nesting level of declared capacity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MaxHint {
    /// The resolved capacity; meaningless when `unbounded`.
    pub(crate) value: u64,
    /// `?` — no bound at this level.
    pub(crate) unbounded: bool,
    /// A spec value overrode the literal default.
    pub(crate) from_spec: bool,
    /// The originating spec expression, when one was declared.
    pub(crate) expr: Option<String>,
}

pub(crate) type SizeHints = SmallVec<[SizeHint; 4]>;
pub(crate) type MaxHints = SmallVec<[MaxHint; 4]>;
pub(crate) type TypeHints = SmallVec<[Option<SszType>; 4]>;

/// A `dynssz-*` entry before resolution.
enum DynEntry {
    Dynamic,
    Literal(u64),
    Expr(String),
}

fn split_entries(tag: &str) -> impl Iterator<Item = &str> {
    tag.split(',').map(str::trim)
}

fn parse_literal_entries(tag: &str, name: &str) -> Result<Vec<Option<u64>>, SszError> {
    split_entries(tag)
        .map(|entry| {
            if entry == "?" {
                Ok(None)
            } else if entry.is_empty() {
                Err(SszError::TagParse(format!("empty entry in {name}:\"{tag}\"")))
            } else {
                entry
                    .parse::<u64>()
                    .map(Some)
                    .map_err(|_| SszError::TagParse(format!("invalid entry '{entry}' in {name}:\"{tag}\"")))
            }
        })
        .collect()
}

fn parse_dyn_entries(tag: &str, name: &str) -> Result<Vec<DynEntry>, SszError> {
    split_entries(tag)
        .map(|entry| {
            if entry == "?" {
                Ok(DynEntry::Dynamic)
            } else if entry.is_empty() {
                Err(SszError::TagParse(format!("empty entry in {name}:\"{tag}\"")))
            } else if let Ok(v) = entry.parse::<u64>() {
                Ok(DynEntry::Literal(v))
            } else {
                Ok(DynEntry::Expr(entry.to_string()))
            }
        })
        .collect()
}

/// Merge `ssz-size` and `dynssz-size` into per-level size hints.
pub(crate) fn parse_size_hints(
    tags: &FieldTags,
    resolver: &SpecResolver,
) -> Result<SizeHints, SszError> {
    let literals = match &tags.ssz_size {
        Some(tag) => parse_literal_entries(tag, "ssz-size")?,
        None => Vec::new(),
    };
    let dynamics = match &tags.dynssz_size {
        Some(tag) => parse_dyn_entries(tag, "dynssz-size")?,
        None => Vec::new(),
    };

    let levels = literals.len().max(dynamics.len());
    let mut hints = SizeHints::new();
    for level in 0..levels {
        let default = literals.get(level).copied().flatten();
        let hint = match dynamics.get(level) {
            None | Some(DynEntry::Dynamic) if default.is_none() => SizeHint {
                value: 0,
                dynamic: true,
                from_spec: false,
                expr: None,
            },
            // A `?` in dynssz-size declares no override at this level.
            None | Some(DynEntry::Dynamic) => SizeHint {
                value: default.expect("checked above"),
                dynamic: false,
                from_spec: false,
                expr: None,
            },
            Some(DynEntry::Literal(v)) => SizeHint {
                value: *v,
                dynamic: false,
                from_spec: false,
                expr: None,
            },
            Some(DynEntry::Expr(expr)) => match resolver.resolve(expr)? {
                Some(v) => SizeHint {
                    value: v,
                    dynamic: false,
                    from_spec: default != Some(v),
                    expr: Some(expr.clone()),
                },
                None => SizeHint {
                    value: default.unwrap_or(0),
                    dynamic: default.is_none(),
                    from_spec: false,
                    expr: Some(expr.clone()),
                },
            },
        };
        hints.push(hint);
    }
    Ok(hints)
}

/// Merge `ssz-max` and `dynssz-max` into per-level capacity hints.
pub(crate) fn parse_max_hints(
    tags: &FieldTags,
    resolver: &SpecResolver,
) -> Result<MaxHints, SszError> {
    let literals = match &tags.ssz_max {
        Some(tag) => parse_literal_entries(tag, "ssz-max")?,
        None => Vec::new(),
    };
    let dynamics = match &tags.dynssz_max {
        Some(tag) => parse_dyn_entries(tag, "dynssz-max")?,
        None => Vec::new(),
    };

    let levels = literals.len().max(dynamics.len());
    let mut hints = MaxHints::new();
    for level in 0..levels {
        let default = literals.get(level).copied().flatten();
        let hint = match dynamics.get(level) {
            None | Some(DynEntry::Dynamic) if default.is_none() => MaxHint {
                value: 0,
                unbounded: true,
                from_spec: false,
                expr: None,
            },
            // A `?` in dynssz-max declares no override at this level.
            None | Some(DynEntry::Dynamic) => MaxHint {
                value: default.expect("checked above"),
                unbounded: false,
                from_spec: false,
                expr: None,
            },
            Some(DynEntry::Literal(v)) => MaxHint {
                value: *v,
                unbounded: false,
                from_spec: false,
                expr: None,
            },
            Some(DynEntry::Expr(expr)) => match resolver.resolve(expr)? {
                Some(v) => MaxHint {
                    value: v,
                    unbounded: false,
                    from_spec: default != Some(v),
                    expr: Some(expr.clone()),
                },
                None => MaxHint {
                    value: default.unwrap_or(0),
                    unbounded: default.is_none(),
                    from_spec: false,
                    expr: Some(expr.clone()),
                },
            },
        };
        hints.push(hint);
    }
    Ok(hints)
}

/// Parse `ssz-type` into per-level forced kinds; `?` leaves a level inferred.
pub(crate) fn parse_type_hints(tags: &FieldTags) -> Result<TypeHints, SszError> {
    let mut hints = TypeHints::new();
    if let Some(tag) = &tags.ssz_type {
        for entry in split_entries(tag) {
            if entry == "?" {
                hints.push(None);
            } else {
                let ty = SszType::from_name(entry).ok_or_else(|| {
                    SszError::TagParse(format!("unknown ssz-type '{entry}' in \"{tag}\""))
                })?;
                hints.push(Some(ty));
            }
        }
    }
    Ok(hints)
}

/// Parse `ssz-index`.
pub(crate) fn parse_ssz_index(tags: &FieldTags) -> Result<Option<u16>, SszError> {
    match &tags.ssz_index {
        None => Ok(None),
        Some(tag) => tag
            .trim()
            .parse::<u16>()
            .map(Some)
            .map_err(|_| SszError::TagParse(format!("invalid ssz-index \"{tag}\""))),
    }
}

/// Parse `ssz-bitsize`.
pub(crate) fn parse_bitsize(tags: &FieldTags) -> Result<Option<u32>, SszError> {
    match &tags.ssz_bitsize {
        None => Ok(None),
        Some(tag) => tag
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|_| SszError::TagParse(format!("invalid ssz-bitsize \"{tag}\""))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specs::SpecValue;
    use std::collections::HashMap;

    fn resolver() -> SpecResolver {
        let mut values = HashMap::new();
        values.insert("SLOTS_PER_EPOCH".to_string(), SpecValue::U64(8));
        values.insert("NAME".to_string(), SpecValue::from("x"));
        SpecResolver::new(values)
    }

    #[test]
    fn literal_sizes() {
        let tags = FieldTags::new().size("?,32");
        let hints = parse_size_hints(&tags, &resolver()).unwrap();
        assert_eq!(hints.len(), 2);
        assert!(hints[0].dynamic);
        assert_eq!(hints[1].value, 32);
        assert!(!hints[1].from_spec);
    }

    #[test]
    fn spec_expression_overrides_literal() {
        let tags = FieldTags::new().size("32").dyn_size("SLOTS_PER_EPOCH");
        let hints = parse_size_hints(&tags, &resolver()).unwrap();
        assert_eq!(hints[0].value, 8);
        assert!(hints[0].from_spec);
        assert_eq!(hints[0].expr.as_deref(), Some("SLOTS_PER_EPOCH"));
    }

    #[test]
    fn spec_expression_equal_to_literal_is_not_dynamic() {
        let tags = FieldTags::new().size("8").dyn_size("SLOTS_PER_EPOCH");
        let hints = parse_size_hints(&tags, &resolver()).unwrap();
        assert_eq!(hints[0].value, 8);
        assert!(!hints[0].from_spec);
    }

    #[test]
    fn unresolved_expression_falls_back() {
        let tags = FieldTags::new().size("32").dyn_size("UNKNOWN_VALUE");
        let hints = parse_size_hints(&tags, &resolver()).unwrap();
        assert_eq!(hints[0].value, 32);
        assert!(!hints[0].from_spec);
        assert_eq!(hints[0].expr.as_deref(), Some("UNKNOWN_VALUE"));
    }

    #[test]
    fn non_numeric_spec_value_is_tag_error() {
        let tags = FieldTags::new().dyn_size("NAME");
        assert!(matches!(
            parse_size_hints(&tags, &resolver()),
            Err(SszError::TagParse(_))
        ));
    }

    #[test]
    fn malformed_size_entry() {
        let tags = FieldTags::new().size("32,abc");
        assert!(matches!(
            parse_size_hints(&tags, &resolver()),
            Err(SszError::TagParse(_))
        ));
    }

    #[test]
    fn max_hints_merge() {
        let tags = FieldTags::new().max("?,100").dyn_max("?,SLOTS_PER_EPOCH");
        let hints = parse_max_hints(&tags, &resolver()).unwrap();
        assert!(hints[0].unbounded);
        assert_eq!(hints[1].value, 8);
        assert!(hints[1].from_spec);
    }

    #[test]
    fn type_hint_levels() {
        let tags = FieldTags::new().ty("?,bitlist");
        let hints = parse_type_hints(&tags).unwrap();
        assert_eq!(hints.len(), 2);
        assert_eq!(hints[0], None);
        assert_eq!(hints[1], Some(SszType::BitList));
    }

    #[test]
    fn unknown_type_hint_is_tag_error() {
        let tags = FieldTags::new().ty("float64");
        assert!(matches!(
            parse_type_hints(&tags),
            Err(SszError::TagParse(_))
        ));
    }

    #[test]
    fn index_and_bitsize() {
        let tags = FieldTags::new().index(5).bitsize(12);
        assert_eq!(parse_ssz_index(&tags).unwrap(), Some(5));
        assert_eq!(parse_bitsize(&tags).unwrap(), Some(12));
        assert_eq!(parse_ssz_index(&FieldTags::new()).unwrap(), None);
    }
}
