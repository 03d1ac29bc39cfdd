//! Record operator property tests: distinct, unique, sample, join, aggregate,
//! transformation and audit over in-memory row streams

use std::collections::HashSet;

use rowpipe::operators::{
    aggregate, aggregate_fields, as_records, basic_audit, compile_transformation, distinct,
    left_inner_join, sample, select, select_from_set, select_records, to_dict, to_dict_composite,
    unique, AggregateFn, Args, FunctionRegistry, Measure, OpError, RowResult, SampleMode,
    TransformEntry, TransformRule,
};
use rowpipe::{row, Field, FieldList, Row, Scalar, StorageType};
use serde_json::json;

fn stream(rows: &[Row]) -> Vec<RowResult> {
    rows.iter().cloned().map(Ok).collect()
}

fn collect<I: Iterator<Item = RowResult>>(iter: I) -> Vec<Row> {
    iter.collect::<Result<_, _>>().expect("stream failed")
}

fn orders() -> (FieldList, Vec<Row>) {
    let fields = FieldList::from_specs([
        ("customer", StorageType::String),
        ("product", StorageType::String),
        ("qty", StorageType::Integer),
    ])
    .unwrap();
    let rows = vec![
        row([Scalar::from("ann"), "nut".into(), 1.into()]),
        row([Scalar::from("bob"), "bolt".into(), 2.into()]),
        row([Scalar::from("ann"), "nut".into(), 3.into()]),
        row([Scalar::from("cid"), "nut".into(), 1.into()]),
        row([Scalar::from("bob"), "bolt".into(), 2.into()]),
        row([Scalar::from("ann"), "washer".into(), 5.into()]),
    ];
    (fields, rows)
}

#[test]
fn test_distinct_is_idempotent() {
    let (fields, rows) = orders();
    for keys in [vec!["customer"], vec!["customer", "product"], vec![]] {
        let once = collect(distinct(stream(&rows), &fields, &keys, false).unwrap());
        let twice = collect(distinct(stream(&once), &fields, &keys, false).unwrap());
        assert_eq!(once, twice, "keys {keys:?}");
    }

    let by_customer = collect(distinct(stream(&rows), &fields, &["customer"], false).unwrap());
    assert_eq!(by_customer, vec![rows[0].clone(), rows[1].clone(), rows[3].clone()]);
}

#[test]
fn test_sorted_distinct_compares_with_previous_key_only() {
    let (fields, mut rows) = orders();
    rows.sort();
    let sorted = collect(distinct(stream(&rows), &fields, &["customer"], true).unwrap());
    let names: Vec<&Scalar> = sorted.iter().map(|r| &r[0]).collect();
    assert_eq!(
        names,
        vec![&Scalar::from("ann"), &Scalar::from("bob"), &Scalar::from("cid")]
    );
}

#[test]
fn test_unique_and_its_discard_partition_the_input() {
    let (fields, rows) = orders();
    let keys = ["customer", "product"];
    let kept = collect(unique(stream(&rows), &fields, &keys, false).unwrap());
    let dropped = collect(unique(stream(&rows), &fields, &keys, true).unwrap());

    assert_eq!(kept.len() + dropped.len(), rows.len());

    let key_of = |r: &Row| (r[0].clone(), r[1].clone());
    let kept_keys: HashSet<_> = kept.iter().map(key_of).collect();
    assert_eq!(kept_keys.len(), kept.len());

    let mut union: Vec<Row> = kept.iter().chain(dropped.iter()).cloned().collect();
    let mut original = rows.clone();
    union.sort();
    original.sort();
    assert_eq!(union, original);
}

#[test]
fn test_sample_first_and_its_complement() {
    let fields = FieldList::from_specs(["n"]).unwrap();
    let rows: Vec<Row> = (0..10).map(|i| row([i])).collect();
    assert_eq!(fields.len(), 1);

    let taken = collect(sample(stream(&rows), 3, false, SampleMode::First).unwrap());
    assert_eq!(taken, rows[..3].to_vec());

    let skipped = collect(sample(stream(&rows), 3, true, SampleMode::First).unwrap());
    assert_eq!(skipped, rows[3..].to_vec());

    let nth = collect(sample(stream(&rows), 4, false, SampleMode::Nth).unwrap());
    assert_eq!(nth, vec![row([0]), row([4]), row([8])]);
}

#[test]
fn test_sample_mode_errors() {
    assert!(matches!(
        sample(Vec::<RowResult>::new(), 3, false, SampleMode::Random),
        Err(OpError::NotImplemented(_))
    ));
    assert!(matches!(
        "reservoir".parse::<SampleMode>(),
        Err(OpError::UnknownMode(m)) if m == "reservoir"
    ));
    assert_eq!("nth".parse::<SampleMode>().unwrap(), SampleMode::Nth);
}

#[test]
fn test_select_filters_by_argument_fields() {
    let (fields, rows) = orders();
    let big = |args: &[Scalar]| -> Result<bool, OpError> {
        Ok(args[0] == Scalar::from("ann") && args[1].as_i64().unwrap_or(0) >= 2)
    };
    let out = collect(select(stream(&rows), &fields, big, &["customer", "qty"], false).unwrap());
    assert_eq!(out, vec![rows[2].clone(), rows[5].clone()]);

    let nuts = select_from_set(
        stream(&rows),
        &fields,
        "product",
        vec!["bolt".into(), "washer".into()],
        true,
    )
    .unwrap();
    assert_eq!(collect(nuts).len(), 3);

    let failing =
        |_: &[Scalar]| -> Result<bool, OpError> { Err(OpError::Exec("predicate failed".into())) };
    let mut out = select(stream(&rows), &fields, failing, &["qty"], false).unwrap();
    assert!(matches!(out.next(), Some(Err(OpError::Exec(_)))));
    assert!(out.next().is_none());
}

#[test]
fn test_select_records_over_record_stream() {
    let (fields, rows) = orders();
    let records = as_records(stream(&rows), &fields);
    let limit = 2;
    let out: Vec<_> = select_records(
        records,
        |r| Ok(r.get("qty").and_then(Scalar::as_i64).unwrap_or(0) > limit),
        false,
    )
    .collect::<Result<_, _>>()
    .unwrap();
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].get("product"), Some(&Scalar::from("nut")));
}

#[test]
fn test_aggregate_sum_and_count_by_region() {
    let fields = FieldList::from_specs([
        ("region", StorageType::String),
        ("amount", StorageType::Integer),
    ])
    .unwrap();
    let rows = vec![
        row([Scalar::from("east"), Scalar::Int(10)]),
        row([Scalar::from("west"), Scalar::Int(5)]),
        row([Scalar::from("east"), Scalar::Int(3)]),
    ];
    let measures = [Measure::new("amount", AggregateFn::Sum)];

    let out_fields = aggregate_fields(&fields, &["region"], &measures, true).unwrap();
    assert_eq!(out_fields.field_names(), vec!["region", "amount", "count"]);

    let mut out = collect(aggregate(stream(&rows), &fields, &["region"], &measures, true).unwrap());
    out.sort();
    assert_eq!(
        out,
        vec![
            row([Scalar::from("east"), Scalar::Int(13), Scalar::Int(2)]),
            row([Scalar::from("west"), Scalar::Int(5), Scalar::Int(1)]),
        ]
    );
}

#[test]
fn test_aggregate_min_max_seed_from_data() {
    let fields = FieldList::from_specs([
        ("g", StorageType::String),
        ("v", StorageType::Integer),
    ])
    .unwrap();
    let rows = vec![
        row([Scalar::from("neg"), Scalar::Int(-4)]),
        row([Scalar::from("neg"), Scalar::Int(-9)]),
        row([Scalar::from("pos"), Scalar::Null]),
        row([Scalar::from("pos"), Scalar::Int(12)]),
        row([Scalar::from("pos"), Scalar::Int(7)]),
    ];
    let measures = [
        Measure::new("v", AggregateFn::Min).with_alias("lo"),
        Measure::new("v", AggregateFn::Max).with_alias("hi"),
        Measure::new("v", AggregateFn::Average).with_alias("avg"),
    ];
    let mut out = collect(aggregate(stream(&rows), &fields, &["g"], &measures, false).unwrap());
    out.sort();
    assert_eq!(
        out,
        vec![
            row([
                Scalar::from("neg"),
                Scalar::Int(-9),
                Scalar::Int(-4),
                Scalar::Float(-6.5)
            ]),
            row([
                Scalar::from("pos"),
                Scalar::Int(7),
                Scalar::Int(12),
                Scalar::Float(9.5)
            ]),
        ]
    );
}

#[test]
fn test_join_omits_master_rows_without_detail_match() {
    let master = vec![
        row([Scalar::Int(1), "ann".into()]),
        row([Scalar::Int(2), "bob".into()]),
        row([Scalar::Int(3), "cid".into()]),
    ];
    let cities = vec![
        row([Scalar::Int(1), "Oslo".into()]),
        row([Scalar::Int(3), "Rome".into()]),
    ];
    let out = collect(left_inner_join(stream(&master), vec![stream(&cities)], &[(0, 0)]).unwrap());
    assert_eq!(
        out,
        vec![
            row([Scalar::Int(1), "ann".into(), Scalar::Int(1), "Oslo".into()]),
            row([Scalar::Int(3), "cid".into(), Scalar::Int(3), "Rome".into()]),
        ]
    );

    let ages = vec![row([Scalar::Int(3), Scalar::Int(41)])];
    let out = collect(
        left_inner_join(
            stream(&master),
            vec![stream(&cities), stream(&ages)],
            &[(0, 0), (0, 0)],
        )
        .unwrap(),
    );
    assert_eq!(out.len(), 1);
    assert_eq!(out[0][0], Scalar::Int(3));
    assert_eq!(out[0].len(), 6);
}

#[test]
fn test_join_count_mismatch_is_argument_error() {
    let err = left_inner_join(Vec::<RowResult>::new(), vec![Vec::<RowResult>::new()], &[])
        .err()
        .unwrap();
    match err {
        OpError::Argument(message) => {
            assert!(message.contains('1'));
            assert!(message.contains('0'));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(matches!(
        left_inner_join(Vec::<RowResult>::new(), Vec::<Vec<RowResult>>::new(), &[]),
        Err(OpError::Argument(_))
    ));
}

#[test]
fn test_to_dict_last_duplicate_wins() {
    let (fields, rows) = orders();
    let by_customer = to_dict(stream(&rows), &fields, None).unwrap();
    assert_eq!(by_customer.len(), 3);
    assert_eq!(by_customer[&Scalar::from("ann")], rows[5]);

    let by_qty = to_dict(stream(&rows), &fields, Some("qty")).unwrap();
    assert_eq!(by_qty[&Scalar::Int(1)], rows[3]);

    let composite = to_dict_composite(stream(&rows), &fields, &["customer", "product"]).unwrap();
    assert_eq!(composite.len(), 4);
    assert_eq!(
        composite[&row([Scalar::from("ann"), "nut".into()])],
        rows[2]
    );
    assert!(to_dict(stream(&rows), &fields, Some("price")).is_err());
}

#[test]
fn test_transformation_copy_and_set() {
    let fields = FieldList::from_specs(["name", "age"]).unwrap();
    let rules: Vec<TransformEntry> = serde_json::from_value(json!([
        ["full_name", {"action": "copy", "source": "name"}],
        ["status", {"action": "set", "value": "active"}]
    ]))
    .unwrap();
    let transformation =
        compile_transformation(&rules, &fields, &FunctionRegistry::with_builtins()).unwrap();
    assert_eq!(
        transformation.output_fields().field_names(),
        vec!["full_name", "status"]
    );
    assert_eq!(
        transformation.apply(&row([Scalar::from("Alice"), Scalar::Int(30)])).unwrap(),
        row([Scalar::from("Alice"), Scalar::from("active")])
    );
}

#[test]
fn test_transformation_functions_and_missing_values() {
    let fields = FieldList::from_specs([
        Field::typed("first", StorageType::String),
        Field::typed("last", StorageType::String),
        Field::typed("code", StorageType::Integer),
    ])
    .unwrap();
    let rules = vec![
        TransformEntry::new(
            "name",
            TransformRule::callable(
                |values: &[Scalar], _: &Args| {
                    let parts: Vec<&str> = values.iter().filter_map(Scalar::as_str).collect();
                    Ok(Scalar::from(parts.join(" ")))
                },
                ["first", "last"],
            ),
        ),
        TransformEntry::new(
            "shout",
            TransformRule::function("upper", "last").with_missing_value("?"),
        ),
        TransformEntry::new(
            "code",
            TransformRule::copy().with_missing_value(0),
        ),
    ];
    let transformation =
        compile_transformation(&rules, &fields, &FunctionRegistry::with_builtins()).unwrap();
    assert_eq!(
        transformation.output_fields().field("code").unwrap().storage_type,
        StorageType::Integer
    );

    let out = collect(transformation.into_stream(vec![
        Ok(row([Scalar::from("Ada"), "Lovelace".into(), Scalar::Int(7)])),
        Ok(row([Scalar::from("Alan"), Scalar::Null, Scalar::Null])),
    ]));
    assert_eq!(
        out,
        vec![
            row([Scalar::from("Ada Lovelace"), "LOVELACE".into(), Scalar::Int(7)]),
            row([Scalar::from("Alan"), "?".into(), Scalar::Int(0)]),
        ]
    );
}

#[test]
fn test_transformation_rejects_unknown_names_at_compile_time() {
    let fields = FieldList::from_specs(["name"]).unwrap();
    let registry = FunctionRegistry::with_builtins();
    let missing_source = vec![TransformEntry::new("x", TransformRule::copy_from("email"))];
    assert!(compile_transformation(&missing_source, &fields, &registry).is_err());

    let missing_function = vec![TransformEntry::new("x", TransformRule::function("explode", "name"))];
    assert!(compile_transformation(&missing_function, &fields, &registry).is_err());
}

#[test]
fn test_audit_of_all_null_field() {
    let fields = FieldList::from_specs([
        ("id", StorageType::Integer),
        ("note", StorageType::String),
    ])
    .unwrap();
    let rows: Vec<Row> = (0..4).map(|i| row([Scalar::Int(i), Scalar::Null])).collect();
    let audits = basic_audit(stream(&rows), &fields, 100).unwrap();

    let note = &audits[1];
    assert_eq!(note.field_name, "note");
    assert_eq!(note.record_count, 4);
    assert_eq!(note.null_count, note.record_count);
    assert_eq!(note.null_record_ratio, 1.0);
    assert_eq!(note.empty_string_count, Some(0));

    let id = &audits[0];
    assert_eq!(id.null_count, 0);
    assert_eq!(id.distinct_count, Some(4));
    assert_eq!(id.empty_string_count, None);

    let capped = basic_audit(stream(&rows), &fields, 2).unwrap();
    assert_eq!(capped[0].distinct_count, None);
}

#[test]
fn test_audit_of_empty_stream() {
    let fields = FieldList::from_specs(["a"]).unwrap();
    let audits = basic_audit(Vec::<RowResult>::new(), &fields, 10).unwrap();
    assert_eq!(audits[0].record_count, 0);
    assert_eq!(audits[0].null_record_ratio, 0.0);
    assert!(basic_audit(Vec::<RowResult>::new(), &FieldList::new(), 10).is_err());
}
