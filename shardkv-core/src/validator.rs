//! # Validator (C1)
//!
//! Purpose: Check `create_table` arguments and normalize them into a
//! canonical `TableDescriptor` (§4.1). Pure and total: the same input always
//! produces the same output or the same error, and validation never
//! mutates state (§7 "Validation errors never mutate state").

use shardkv_common::names::{check_table_name, first_duplicate, is_printable};
use shardkv_common::ShardKvError;

use crate::descriptor::{
    Comparator, DataModel, SizeMargin, TableDescriptor, TableType, TimeMargin, TimeUnit,
    WrapperSpec,
};

const MAX_KEY_LEN: usize = 100;
const MAX_COLUMNS_LEN: usize = 10_000;

/// One `(option, value)` entry as the caller supplies it (§4.1).
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Str(String),
    StrList(Vec<String>),
    UInt(u64),
    Bool(bool),
    Wrapper(WrapperSpec),
}

/// The raw argument sequence `verify_create_table_args` consumes.
pub type CreateTableArgs = Vec<(String, OptionValue)>;

fn invalid(reason: &str, field: &str, value: impl std::fmt::Debug) -> ShardKvError {
    ShardKvError::invalid_argument(reason, field, value)
}

/// Validates and normalizes `create_table` arguments (§4.1).
///
/// `table_exists` plays the role of a dirty read against the hash registry
/// (§4.1 "must not already exist in the hash registry"); the validator
/// itself holds no state. `default_num_shards` is the node's configured
/// `NodeConfig::num_of_local_shards`, used when the caller omits `shards`
/// (§3 "shards: positive integer [node default num_of_local_shards]").
pub fn verify_create_table_args(
    args: &CreateTableArgs,
    table_exists: impl Fn(&str) -> bool,
    default_num_shards: u32,
) -> Result<TableDescriptor, ShardKvError> {
    let mut name: Option<String> = None;
    let mut key: Option<Vec<String>> = None;
    let mut columns: Option<Vec<String>> = None;
    let mut indexes: Vec<String> = Vec::new();
    let mut num_shards: Option<u32> = None;
    let mut distributed: Option<bool> = None;
    let mut replication_factor: u32 = 1;
    let mut table_type = TableType::Ordered;
    let mut data_model = DataModel::Binary;
    let mut comparator = Comparator::Ascending;
    let mut wrapper: Option<WrapperSpec> = None;
    let mut time_series = false;

    for (option, value) in args {
        match option.as_str() {
            "name" => {
                let n = expect_str(option, value)?;
                check_table_name(n).map_err(|reason| invalid(reason, "name", n))?;
                if table_exists(n) {
                    return Err(ShardKvError::conflict("table_exists", n));
                }
                name = Some(n.to_string());
            }
            "key" => {
                let list = expect_str_list(option, value)?;
                validate_key(list)?;
                key = Some(list.clone());
            }
            "columns" => {
                let list = expect_str_list(option, value)?;
                validate_non_empty_field_list(list, "columns", MAX_COLUMNS_LEN, "key_too_long")?;
                columns = Some(list.clone());
            }
            "indexes" => {
                let list = expect_str_list(option, value)?;
                validate_field_list(list, "indexes", MAX_COLUMNS_LEN, "key_too_long")?;
                indexes = list.clone();
            }
            "shards" => {
                let n = expect_uint(option, value)?;
                if n == 0 {
                    return Err(invalid("invalid_option", "shards", n));
                }
                num_shards = Some(n as u32);
            }
            "distributed" => {
                distributed = Some(expect_bool(option, value)?);
            }
            "replication_factor" => {
                let n = expect_uint(option, value)?;
                if n == 0 {
                    return Err(invalid("invalid_option", "replication_factor", n));
                }
                replication_factor = n as u32;
            }
            "type" => {
                table_type = match expect_str(option, value)? {
                    "ordered" => TableType::Ordered,
                    "ordered_wrapped" => TableType::OrderedWrapped,
                    other => return Err(invalid("invalid_option", "type", other)),
                };
            }
            "data_model" => {
                data_model = match expect_str(option, value)? {
                    "binary" => DataModel::Binary,
                    "array" => DataModel::Array,
                    "hash" => DataModel::Hash,
                    other => return Err(invalid("invalid_option", "data_model", other)),
                };
            }
            "comparator" => {
                comparator = match expect_str(option, value)? {
                    "ascending" => Comparator::Ascending,
                    "descending" => Comparator::Descending,
                    other => return Err(invalid("invalid_option", "comparator", other)),
                };
            }
            "wrapper" => {
                let spec = expect_wrapper(option, value)?;
                if spec.num_of_buckets < 3 {
                    return Err(invalid("invalid_option", "wrapper.num_of_buckets", spec.num_of_buckets));
                }
                if spec.time_margin.is_none() && spec.size_margin.is_none() {
                    return Err(invalid("invalid_option", "wrapper", "no_margin"));
                }
                if let Some(margin) = &spec.time_margin {
                    if margin.amount == 0 {
                        return Err(invalid("invalid_option", "wrapper.time_margin.amount", margin.amount));
                    }
                }
                if let Some(margin) = &spec.size_margin {
                    if margin.megabytes == 0 {
                        return Err(invalid("invalid_option", "wrapper.size_margin.megabytes", margin.megabytes));
                    }
                }
                wrapper = Some(spec.clone());
            }
            "time_series" => {
                time_series = expect_bool(option, value)?;
            }
            other => {
                return Err(invalid("invalid_option", other, value));
            }
        }
    }

    let name = name.ok_or_else(|| invalid("invalid_option", "name", "missing"))?;
    let key = key.ok_or_else(|| invalid("no_key_field", "key", "missing"))?;
    let mut columns = columns.ok_or_else(|| invalid("invalid_option", "columns", "missing"))?;

    if table_type == TableType::OrderedWrapped && wrapper.is_none() {
        // §4.4: a wrapped shard constructed with wrapper=undefined degrades
        // to the non-wrapped form.
        table_type = TableType::Ordered;
    }

    // indexes ++ key must contain no duplicates (§4.1).
    let mut combined = indexes.clone();
    combined.extend(key.iter().cloned());
    if let Some(dup) = first_duplicate(&combined) {
        return Err(invalid("duplicate_key", "indexes", dup.to_string()));
    }

    // columns := columns \ key, preserving order.
    columns.retain(|c| !key.contains(c));

    // indexes appended to columns if not already present (§9 Open Question
    // (a): follow the docstring, not the `fasle` typo).
    for index_field in &indexes {
        if !columns.contains(index_field) {
            columns.push(index_field.clone());
        }
    }

    let distributed = distributed.unwrap_or(true);
    let num_shards = num_shards.unwrap_or(default_num_shards);

    Ok(TableDescriptor {
        name,
        key,
        columns,
        indexes,
        num_shards,
        shards: Vec::new(),
        distributed,
        replication_factor,
        table_type,
        data_model,
        comparator,
        wrapper,
        time_series,
    })
}

fn validate_key(key: &[String]) -> Result<(), ShardKvError> {
    if key.is_empty() {
        return Err(invalid("no_key_field", "key", "empty"));
    }
    validate_field_list(key, "key", MAX_KEY_LEN, "key_too_long")
}

/// Like `validate_field_list`, but additionally rejects an empty list (§4.1
/// "columns: non-empty list ... unique").
fn validate_non_empty_field_list(
    list: &[String],
    field: &str,
    max_len: usize,
    too_long_reason: &str,
) -> Result<(), ShardKvError> {
    if list.is_empty() {
        return Err(invalid("invalid_option", field, "empty"));
    }
    validate_field_list(list, field, max_len, too_long_reason)
}

fn validate_field_list(
    list: &[String],
    field: &str,
    max_len: usize,
    too_long_reason: &str,
) -> Result<(), ShardKvError> {
    if list.len() > max_len {
        return Err(invalid(too_long_reason, field, list.len()));
    }
    for item in list {
        if !is_printable(item) {
            return Err(invalid("not_printable", field, item.clone()));
        }
    }
    if let Some(dup) = first_duplicate(list) {
        return Err(invalid("duplicate_key", field, dup.to_string()));
    }
    Ok(())
}

fn expect_str<'a>(option: &str, value: &'a OptionValue) -> Result<&'a str, ShardKvError> {
    match value {
        OptionValue::Str(s) => Ok(s.as_str()),
        other => Err(invalid("invalid_option", option, other)),
    }
}

fn expect_str_list<'a>(
    option: &str,
    value: &'a OptionValue,
) -> Result<&'a Vec<String>, ShardKvError> {
    match value {
        OptionValue::StrList(list) => Ok(list),
        other => Err(invalid("invalid_option", option, other)),
    }
}

fn expect_uint(option: &str, value: &OptionValue) -> Result<u64, ShardKvError> {
    match value {
        OptionValue::UInt(n) => Ok(*n),
        other => Err(invalid("invalid_option", option, other)),
    }
}

fn expect_bool(option: &str, value: &OptionValue) -> Result<bool, ShardKvError> {
    match value {
        OptionValue::Bool(b) => Ok(*b),
        other => Err(invalid("invalid_option", option, other)),
    }
}

fn expect_wrapper<'a>(
    option: &str,
    value: &'a OptionValue,
) -> Result<&'a WrapperSpec, ShardKvError> {
    match value {
        OptionValue::Wrapper(spec) => Ok(spec),
        other => Err(invalid("invalid_option", option, other)),
    }
}

/// Convenience builder for `wrapper` option values in tests and callers
/// constructing `CreateTableArgs` by hand.
pub fn wrapper_spec(
    num_of_buckets: u32,
    time_margin: Option<(TimeUnit, u32)>,
    size_margin_mb: Option<u32>,
) -> WrapperSpec {
    WrapperSpec {
        num_of_buckets,
        time_margin: time_margin.map(|(unit, amount)| TimeMargin { unit, amount }),
        size_margin: size_margin_mb.map(|megabytes| SizeMargin { megabytes }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> CreateTableArgs {
        vec![
            ("name".into(), OptionValue::Str("t1".into())),
            ("key".into(), OptionValue::StrList(vec!["x".into()])),
            (
                "columns".into(),
                OptionValue::StrList(vec!["x".into(), "y".into(), "z".into()]),
            ),
            ("shards".into(), OptionValue::UInt(3)),
            ("distributed".into(), OptionValue::Bool(false)),
        ]
    }

    #[test]
    fn s1_creates_canonical_descriptor() {
        let desc = verify_create_table_args(&base_args(), |_| false, 1).unwrap();
        assert_eq!(desc.columns, vec!["y".to_string(), "z".to_string()]);
        assert_eq!(desc.num_shards, 3);
        assert!(!desc.distributed);
    }

    #[test]
    fn rejects_existing_name() {
        let err = verify_create_table_args(&base_args(), |n| n == "t1", 1).unwrap_err();
        assert_eq!(err.reason(), "table_exists");
    }

    #[test]
    fn rejects_duplicate_key_field() {
        let mut args = base_args();
        args[1] = ("key".into(), OptionValue::StrList(vec!["x".into(), "x".into()]));
        let err = verify_create_table_args(&args, |_| false, 1).unwrap_err();
        assert_eq!(err.reason(), "duplicate_key");
    }

    #[test]
    fn rejects_empty_key() {
        let mut args = base_args();
        args[1] = ("key".into(), OptionValue::StrList(vec![]));
        let err = verify_create_table_args(&args, |_| false, 1).unwrap_err();
        assert_eq!(err.reason(), "no_key_field");
    }

    #[test]
    fn rejects_non_printable_field() {
        let mut args = base_args();
        args[2] = (
            "columns".into(),
            OptionValue::StrList(vec!["x".into(), "bad\0".into()]),
        );
        let err = verify_create_table_args(&args, |_| false, 1).unwrap_err();
        assert_eq!(err.reason(), "not_printable");
    }

    #[test]
    fn rejects_unknown_option() {
        let mut args = base_args();
        args.push(("bogus".into(), OptionValue::Bool(true)));
        let err = verify_create_table_args(&args, |_| false, 1).unwrap_err();
        assert_eq!(err.reason(), "invalid_option");
    }

    #[test]
    fn appends_index_fields_to_columns_when_absent() {
        let mut args = base_args();
        args.push(("indexes".into(), OptionValue::StrList(vec!["w".into()])));
        let desc = verify_create_table_args(&args, |_| false, 1).unwrap();
        assert!(desc.columns.contains(&"w".to_string()));
    }

    #[test]
    fn wrapped_type_without_wrapper_degrades_to_ordered() {
        let mut args = base_args();
        args.push(("type".into(), OptionValue::Str("ordered_wrapped".into())));
        let desc = verify_create_table_args(&args, |_| false, 1).unwrap();
        assert_eq!(desc.table_type, TableType::Ordered);
    }

    #[test]
    fn wrapper_requires_a_margin() {
        let mut args = base_args();
        args.push((
            "wrapper".into(),
            OptionValue::Wrapper(WrapperSpec {
                num_of_buckets: 4,
                time_margin: None,
                size_margin: None,
            }),
        ));
        let err = verify_create_table_args(&args, |_| false, 1).unwrap_err();
        assert_eq!(err.reason(), "invalid_option");
    }

    #[test]
    fn validation_totality_columns_disjoint_from_key() {
        let desc = verify_create_table_args(&base_args(), |_| false, 1).unwrap();
        assert!(desc.columns.iter().all(|c| !desc.key.contains(c)));
    }

    #[test]
    fn shards_falls_back_to_the_node_default_when_omitted() {
        let mut args = base_args();
        args.retain(|(option, _)| option != "shards");
        let desc = verify_create_table_args(&args, |_| false, 5).unwrap();
        assert_eq!(desc.num_shards, 5);
    }

    #[test]
    fn rejects_zero_time_margin_amount() {
        let mut args = base_args();
        args.push((
            "wrapper".into(),
            OptionValue::Wrapper(WrapperSpec {
                num_of_buckets: 4,
                time_margin: Some(TimeMargin {
                    unit: TimeUnit::Hours,
                    amount: 0,
                }),
                size_margin: None,
            }),
        ));
        let err = verify_create_table_args(&args, |_| false, 1).unwrap_err();
        assert_eq!(err.reason(), "invalid_option");
    }

    #[test]
    fn rejects_zero_size_margin_megabytes() {
        let mut args = base_args();
        args.push((
            "wrapper".into(),
            OptionValue::Wrapper(WrapperSpec {
                num_of_buckets: 4,
                time_margin: None,
                size_margin: Some(SizeMargin { megabytes: 0 }),
            }),
        ));
        let err = verify_create_table_args(&args, |_| false, 1).unwrap_err();
        assert_eq!(err.reason(), "invalid_option");
    }

    #[test]
    fn rejects_empty_columns() {
        let mut args = base_args();
        args[2] = ("columns".into(), OptionValue::StrList(vec![]));
        let err = verify_create_table_args(&args, |_| false, 1).unwrap_err();
        assert_eq!(err.reason(), "invalid_option");
    }
}
