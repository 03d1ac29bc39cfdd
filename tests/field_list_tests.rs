//! FieldList, FieldMap and record conversion tests

use rowpipe::core::record::{collapse_record, expand_record};
use rowpipe::{
    record_to_row, row, row_to_record, AnalyticalType, Error, Field, FieldList, FieldMap, Scalar,
    StorageType,
};
use serde_json::json;

fn people() -> FieldList {
    FieldList::from_specs([
        ("id", StorageType::Integer),
        ("name", StorageType::String),
        ("score", StorageType::Float),
        ("joined", StorageType::Date),
    ])
    .unwrap()
}

#[test]
fn test_index_of_every_name_is_its_position() {
    let fields = people();
    let names = fields.names(None).unwrap();
    assert_eq!(names.len(), fields.len());
    for (i, name) in names.iter().enumerate() {
        assert_eq!(fields.index(name).unwrap(), i);
    }
}

#[test]
fn test_duplicate_append_leaves_list_unchanged() {
    let mut fields = people();
    let before = fields.clone();

    let err = fields.append("name").unwrap_err();
    assert_eq!(err, Error::DuplicateField("name".into()));
    assert_eq!(fields, before);

    // extend is all-or-nothing: the new field before the duplicate is not kept
    assert!(fields.extend(["city", "id"]).is_err());
    assert_eq!(fields, before);
    assert!(!fields.contains("city"));
}

#[test]
fn test_lookup_errors_carry_context() {
    let fields = people();
    assert_eq!(
        fields.index("email").unwrap_err(),
        Error::UnknownField("email".into())
    );
    assert_eq!(
        fields.names(Some(&[0, 9][..])).unwrap_err(),
        Error::IndexOutOfRange { index: 9, len: 4 }
    );
    assert!(fields.mask(["id", "email"]).is_err());
}

#[test]
fn test_mask_and_subset_copy() {
    let fields = people();
    assert_eq!(
        fields.mask(["score", "id"]).unwrap(),
        vec![true, false, true, false]
    );
    let subset = fields.copy(Some(&["score", "id"][..])).unwrap();
    assert_eq!(subset.field_names(), vec!["score", "id"]);
    assert_eq!(subset.field("score").unwrap(), fields.field("score").unwrap());
}

#[test]
fn test_default_analytical_types() {
    let fields = people();
    assert_eq!(
        fields.field("id").unwrap().analytical_type,
        AnalyticalType::Discrete
    );
    assert_eq!(
        fields.field("score").unwrap().analytical_type,
        AnalyticalType::Range
    );
    assert_eq!(
        fields.field("name").unwrap().analytical_type,
        AnalyticalType::Typeless
    );
}

#[test]
fn test_set_and_remove_keep_index_consistent() {
    let mut fields = people();
    fields.set(1, Field::typed("full_name", StorageType::Text)).unwrap();
    assert_eq!(fields.index("full_name").unwrap(), 1);
    assert!(!fields.contains("name"));

    // renaming onto another position's name collides
    assert!(matches!(
        fields.set(0, Field::new("score")),
        Err(Error::DuplicateField(_))
    ));

    let removed = fields.remove(0).unwrap();
    assert_eq!(removed.name, "id");
    assert_eq!(fields.index("score").unwrap(), 1);
    assert_eq!(fields.index("joined").unwrap(), 2);
}

#[test]
fn test_field_specs_from_config_documents() {
    let fields: FieldList = serde_json::from_value(json!([
        "id",
        ["amount", "integer"],
        ["flag", "boolean", "flag"],
        {"name": "when", "storage_type": "date", "missing_values": ["0000-00-00"]}
    ]))
    .unwrap();
    assert_eq!(fields.field_names(), vec!["id", "amount", "flag", "when"]);
    assert_eq!(fields.field("amount").unwrap().storage_type, StorageType::Integer);
    assert_eq!(
        fields.field("flag").unwrap().analytical_type,
        AnalyticalType::Flag
    );
    assert!(fields
        .field("when")
        .unwrap()
        .is_missing(&Scalar::from("0000-00-00")));

    let bad: Result<FieldList, _> = serde_json::from_value(json!([["x", "bignum"]]));
    assert!(bad.is_err());
}

#[test]
fn test_field_map_rename_drop_and_row_filter() {
    let fields = people();
    let map = FieldMap::new()
        .rename("name", "full_name")
        .drop("joined")
        .rename("score", "rating")
        .drop("score");

    let mapped = map.map(&fields).unwrap();
    assert_eq!(mapped.field_names(), vec!["id", "full_name"]);

    let filter = map.row_filter(&fields);
    let values = row([Scalar::Int(7), "Ada".into(), Scalar::Float(9.5), "2020-01-01".into()]);
    assert_eq!(filter.filter(&values).unwrap(), row([Scalar::Int(7), "Ada".into()]));

    let keep = FieldMap::keep_only(["score", "id"]);
    assert_eq!(keep.map(&fields).unwrap().field_names(), vec!["id", "score"]);
}

#[test]
fn test_row_record_conversion() {
    let fields = FieldList::from_specs(["name", "age"]).unwrap();
    let record = row_to_record(&fields, &row([Scalar::from("Alice"), Scalar::Int(30)]));
    assert_eq!(record.get("age"), Some(&Scalar::Int(30)));

    let mut partial = record.clone();
    partial.remove("age");
    assert_eq!(
        record_to_row(&fields, &partial),
        row([Scalar::from("Alice"), Scalar::Null])
    );
}

#[test]
fn test_expand_and_collapse_records() {
    let flat = json!({"product.code": 10, "product.name": "nut", "qty": 2});
    let flat = flat.as_object().unwrap();
    let nested = expand_record(flat, ".").unwrap();
    assert_eq!(
        serde_json::Value::Object(nested.clone()),
        json!({"product": {"code": 10, "name": "nut"}, "qty": 2})
    );
    assert_eq!(&collapse_record(&nested, "."), flat);
}
