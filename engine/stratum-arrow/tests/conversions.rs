use std::sync::Arc;

use arrow::array::{
    Array, Decimal128Array, FixedSizeBinaryArray, Int8Array, ListArray, StringArray,
    StructArray, TimestampMicrosecondArray, UnionArray,
};
use arrow::datatypes::{DataType, TimeUnit};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use stratum::{
    Decimal, EnumMember, Field, IdentifierKind, ModelSchema, SerdeModel, TypeDescriptor,
    UnionVariant, Value,
};
use stratum_arrow::{
    from_arrow, from_arrow_untyped, from_arrow_values, schema_for, to_arrow, to_arrow_values,
    BatchBuilder, ConversionConfig, DateTimePolicy, Error, RowEncoder, UnionEncoding,
    INSTANT_FIELD, OFFSET_FIELD,
};
use ulid::Ulid;
use uuid::{NoContext, Timestamp, Uuid};

fn round_trip(model: &ModelSchema, rows: &[Value], config: &ConversionConfig) -> Vec<Value> {
    let schema = schema_for(model, config).expect("schema");
    let batch = to_arrow_values(rows, &schema, config).expect("encode");
    from_arrow_values(&batch, model, true, config).expect("decode")
}

fn events() -> ModelSchema {
    ModelSchema::record(
        "test.Event",
        vec![
            Field::new("at", TypeDescriptor::timestamp(true)),
            Field::new(
                "local",
                TypeDescriptor::optional(TypeDescriptor::timestamp(false)),
            ),
        ],
    )
}

fn event_row() -> Value {
    let at = DateTime::parse_from_rfc3339("2024-05-01T12:00:00+02:00").expect("rfc3339");
    let local = NaiveDate::from_ymd_opt(2024, 5, 1)
        .and_then(|day| day.and_hms_micro_opt(8, 30, 0, 250))
        .expect("naive");
    Value::record([
        ("at", Value::Timestamp(at)),
        ("local", Value::NaiveTimestamp(local)),
    ])
}

fn offset_of(value: Option<&Value>) -> i32 {
    match value {
        Some(Value::Timestamp(ts)) => ts.offset().local_minus_utc(),
        other => panic!("expected aware timestamp, got {other:?}"),
    }
}

#[test]
fn normalize_utc_stores_instants_in_utc() {
    let config = ConversionConfig::default();
    let schema = schema_for(&events(), &config).expect("schema");
    let batch = to_arrow_values(&[event_row()], &schema, &config).expect("encode");
    assert_eq!(
        batch.schema().field(0).data_type(),
        &DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()))
    );
    let at = batch
        .column(0)
        .as_any()
        .downcast_ref::<TimestampMicrosecondArray>()
        .expect("timestamp column");
    let Some(Value::Timestamp(original)) = event_row().get("at").cloned() else {
        panic!("fixture");
    };
    assert_eq!(at.value(0), original.timestamp_micros());

    let rows = from_arrow_values(&batch, &events(), true, &config).expect("decode");
    assert_eq!(rows[0].get("at"), Some(&Value::Timestamp(original)));
    assert_eq!(offset_of(rows[0].get("at")), 0);
    assert_eq!(rows[0].get("local"), event_row().get("local"));
}

#[test]
fn preserve_tz_keeps_the_original_offset() {
    let config = ConversionConfig::default().with_datetime_policy(DateTimePolicy::PreserveTz);
    let schema = schema_for(&events(), &config).expect("schema");
    let batch = to_arrow_values(&[event_row()], &schema, &config).expect("encode");
    assert!(matches!(
        batch.schema().field(0).data_type(),
        DataType::Struct(_)
    ));

    let rows = from_arrow_values(&batch, &events(), true, &config).expect("decode");
    assert_eq!(offset_of(rows[0].get("at")), 7200);
    assert_eq!(rows[0].get("local"), event_row().get("local"));

    // A target built under another policy still reads the offset layout.
    let plain = from_arrow_values(&batch, &events(), true, &ConversionConfig::default())
        .expect("cross-policy decode");
    assert_eq!(offset_of(plain[0].get("at")), 7200);
}

#[test]
fn error_on_naive_rejects_naive_input() {
    let config = ConversionConfig::default().with_datetime_policy(DateTimePolicy::ErrorOnNaive);
    let schema = schema_for(&events(), &config).expect("schema");
    let err = to_arrow_values(&[event_row()], &schema, &config).expect_err("naive local");
    match err {
        Error::Encode { path, .. } => assert_eq!(path, "local"),
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn preserve_tz_stores_naive_timestamps_without_an_offset() {
    let config = ConversionConfig::default().with_datetime_policy(DateTimePolicy::PreserveTz);
    let schema = schema_for(&events(), &config).expect("schema");
    let Some(Value::Timestamp(at)) = event_row().get("at").cloned() else {
        panic!("aware fixture");
    };
    let Some(Value::NaiveTimestamp(wall)) = event_row().get("local").cloned() else {
        panic!("naive fixture");
    };
    let rows = vec![
        event_row(),
        Value::record([("at", Value::Timestamp(at)), ("local", Value::Null)]),
    ];
    let batch = to_arrow_values(&rows, &schema, &config).expect("encode");

    let local = batch
        .column(1)
        .as_any()
        .downcast_ref::<StructArray>()
        .expect("offset struct layout");
    let instants = local
        .column_by_name(INSTANT_FIELD)
        .and_then(|column| column.as_any().downcast_ref::<TimestampMicrosecondArray>())
        .expect("instant child");
    let offsets = local.column_by_name(OFFSET_FIELD).expect("offset child");
    assert_eq!(instants.value(0), wall.and_utc().timestamp_micros());
    assert!(offsets.is_null(0));
    assert!(local.is_null(1));

    let decoded = from_arrow_values(&batch, &events(), true, &config).expect("decode");
    assert_eq!(decoded, rows);
    let untyped = from_arrow_untyped(&batch).expect("untyped");
    assert_eq!(untyped[0].get("local"), Some(&Value::NaiveTimestamp(wall)));
    assert_eq!(untyped[1].get("local"), Some(&Value::Null));
}

fn shapes() -> ModelSchema {
    ModelSchema::record(
        "test.Shapes",
        vec![Field::new(
            "shape",
            TypeDescriptor::union(vec![
                UnionVariant::new("circle", TypeDescriptor::float64()),
                UnionVariant::new("label", TypeDescriptor::string()),
                UnionVariant::unit("empty"),
            ]),
        )],
    )
}

fn shape_rows() -> Vec<Value> {
    vec![
        Value::record([("shape", Value::tagged("circle", Value::from(2.5)))]),
        Value::record([("shape", Value::tagged("label", Value::from("x")))]),
        Value::record([("shape", Value::tagged("empty", Value::Null))]),
    ]
}

#[test]
fn tagged_struct_unions_populate_exactly_one_payload() {
    let config = ConversionConfig::default();
    let schema = schema_for(&shapes(), &config).expect("schema");
    let batch = to_arrow_values(&shape_rows(), &schema, &config).expect("encode");
    let shape = batch
        .column(0)
        .as_any()
        .downcast_ref::<StructArray>()
        .expect("struct");
    let tags = shape
        .column_by_name("tag")
        .and_then(|tags| tags.as_any().downcast_ref::<StringArray>())
        .expect("tag column");
    assert_eq!(
        tags.iter().flatten().collect::<Vec<_>>(),
        vec!["circle", "label", "empty"]
    );
    let circle = shape.column_by_name("circle").expect("circle payload");
    assert!(circle.is_valid(0));
    assert!(circle.is_null(1));
    assert!(circle.is_null(2));

    assert_eq!(round_trip(&shapes(), &shape_rows(), &config), shape_rows());
}

#[test]
fn dense_unions_round_trip_and_read_back_under_either_mode() {
    let config = ConversionConfig::default().with_union_encoding(UnionEncoding::DenseUnion);
    let schema = schema_for(&shapes(), &config).expect("schema");
    let batch = to_arrow_values(&shape_rows(), &schema, &config).expect("encode");
    let union = batch
        .column(0)
        .as_any()
        .downcast_ref::<UnionArray>()
        .expect("dense union");
    assert_eq!(union.type_ids().to_vec(), vec![0, 1, 2]);

    assert_eq!(round_trip(&shapes(), &shape_rows(), &config), shape_rows());
    let tagged_target =
        from_arrow_values(&batch, &shapes(), true, &ConversionConfig::default()).expect("decode");
    assert_eq!(tagged_target, shape_rows());
}

fn canvas() -> ModelSchema {
    let shape = TypeDescriptor::union(vec![
        UnionVariant::new("circle", TypeDescriptor::float64()),
        UnionVariant::new("note", TypeDescriptor::optional(TypeDescriptor::string())),
        UnionVariant::unit("empty"),
    ]);
    ModelSchema::record(
        "test.Canvas",
        vec![
            Field::new("layers", TypeDescriptor::list(shape.clone())),
            Field::new(
                "frame",
                TypeDescriptor::record(vec![Field::new("shape", shape)]),
            ),
        ],
    )
}

fn canvas_rows() -> Vec<Value> {
    let frame = |shape| Value::record([("shape", shape)]);
    vec![
        Value::record([
            (
                "layers",
                Value::List(vec![
                    Value::tagged("circle", Value::from(1.0)),
                    Value::tagged("empty", Value::Null),
                    Value::tagged("note", Value::Null),
                ]),
            ),
            ("frame", frame(Value::tagged("empty", Value::Null))),
        ]),
        Value::record([
            ("layers", Value::List(Vec::new())),
            ("frame", frame(Value::tagged("note", Value::from("x")))),
        ]),
        Value::record([
            (
                "layers",
                Value::List(vec![
                    Value::tagged("note", Value::from("y")),
                    Value::tagged("empty", Value::Null),
                ]),
            ),
            ("frame", frame(Value::tagged("circle", Value::from(3.0)))),
        ]),
    ]
}

#[test]
fn unions_nested_in_lists_and_records_round_trip_under_both_encodings() {
    for encoding in [UnionEncoding::TaggedStruct, UnionEncoding::DenseUnion] {
        let config = ConversionConfig::default().with_union_encoding(encoding);
        assert_eq!(
            round_trip(&canvas(), &canvas_rows(), &config),
            canvas_rows(),
            "{encoding:?}"
        );
    }

    let config = ConversionConfig::default().with_union_encoding(UnionEncoding::DenseUnion);
    let schema = schema_for(&canvas(), &config).expect("schema");
    let batch = to_arrow_values(&canvas_rows(), &schema, &config).expect("encode");
    let frame = batch
        .column(1)
        .as_any()
        .downcast_ref::<StructArray>()
        .expect("frame struct");
    let shape = frame
        .column(0)
        .as_any()
        .downcast_ref::<UnionArray>()
        .expect("dense union");
    assert_eq!(shape.type_ids().to_vec(), vec![2, 1, 0]);
    assert_eq!(shape.child(2).data_type(), &DataType::Boolean);
    assert_eq!(shape.logical_null_count(), 0);

    let layers = batch
        .column(0)
        .as_any()
        .downcast_ref::<ListArray>()
        .expect("list");
    let items = layers
        .values()
        .as_any()
        .downcast_ref::<UnionArray>()
        .expect("dense items");
    assert_eq!(items.type_ids().to_vec(), vec![0, 2, 1, 1, 2]);
    assert_eq!(items.logical_null_count(), 1);
}

#[test]
fn unknown_variant_is_a_schema_mismatch() {
    let config = ConversionConfig::default();
    let schema = schema_for(&shapes(), &config).expect("schema");
    let mut encoder = RowEncoder::new(schema, config);
    let err = encoder
        .append(&Value::record([(
            "shape",
            Value::tagged("square", Value::from(1.0)),
        )]))
        .expect_err("no such variant");
    match err {
        Error::SchemaMismatch {
            path,
            expected,
            found,
        } => {
            assert_eq!(path, "shape");
            assert_eq!(expected, "one of variants [circle, label, empty]");
            assert_eq!(found, "variant 'square'");
        }
        other => panic!("unexpected error {other}"),
    }
    assert!(encoder.is_empty());
}

#[test]
fn int_enums_use_the_smallest_width_and_check_membership() {
    let model = ModelSchema::record(
        "test.Priority",
        vec![Field::new(
            "level",
            TypeDescriptor::enumeration(vec![EnumMember::int("low", 1), EnumMember::int("high", 2)]),
        )],
    );
    let config = ConversionConfig::default();
    let schema = schema_for(&model, &config).expect("schema");
    let rows = vec![Value::record([("level", Value::from(2))])];
    let batch = to_arrow_values(&rows, &schema, &config).expect("encode");
    let levels = batch
        .column(0)
        .as_any()
        .downcast_ref::<Int8Array>()
        .expect("int8 enum");
    assert_eq!(levels.value(0), 2);
    assert_eq!(
        from_arrow_values(&batch, &model, true, &config).expect("decode"),
        rows
    );

    let mut encoder = RowEncoder::new(schema, config);
    let err = encoder
        .append(&Value::record([("level", Value::from(5))]))
        .expect_err("not a member");
    assert!(matches!(err, Error::SchemaMismatch { .. }), "{err}");
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Level {
    Low,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Alert {
    source: String,
    level: Level,
}

impl SerdeModel for Alert {
    fn model_schema() -> ModelSchema {
        ModelSchema::record(
            "test.Alert",
            vec![
                Field::new("source", TypeDescriptor::string()),
                Field::new(
                    "level",
                    TypeDescriptor::enumeration(vec![
                        EnumMember::int("low", 1),
                        EnumMember::int("high", 2),
                    ]),
                ),
            ],
        )
    }
}

#[test]
fn serde_unit_enums_fill_int_enum_columns_by_member_name() {
    let alerts = vec![
        Alert {
            source: "disk".into(),
            level: Level::High,
        },
        Alert {
            source: "fan".into(),
            level: Level::Low,
        },
    ];
    let config = ConversionConfig::default();
    let batch = to_arrow(&alerts, None, &config).expect("typed encode");
    let levels = batch
        .column(1)
        .as_any()
        .downcast_ref::<Int8Array>()
        .expect("int8 enum");
    assert_eq!(levels.values().to_vec(), vec![2, 1]);

    let raw: Vec<Value> = alerts
        .iter()
        .map(|alert| stratum::to_value(alert).expect("serialize"))
        .collect();
    assert_eq!(raw[0].get("level"), Some(&Value::tagged("high", Value::Null)));
    let schema = schema_for(&Alert::model_schema(), &config).expect("schema");
    let dynamic = to_arrow_values(&raw, &schema, &config).expect("dynamic encode");
    assert_eq!(dynamic.column(1).as_ref(), batch.column(1).as_ref());

    let decoded = from_arrow_values(&batch, &Alert::model_schema(), true, &config).expect("decode");
    assert_eq!(decoded[0].get("level"), Some(&Value::Int(2)));
}

fn amounts() -> ModelSchema {
    ModelSchema::record(
        "test.Amounts",
        vec![Field::new("amount", TypeDescriptor::Decimal)],
    )
}

fn amount(text: &str) -> Value {
    Value::record([("amount", Value::Decimal(text.parse().expect("decimal")))])
}

#[test]
fn decimals_are_rescaled_but_never_truncated() {
    let config = ConversionConfig::default().with_decimal(5, 2);
    let schema = schema_for(&amounts(), &config).expect("schema");

    let batch = to_arrow_values(&[amount("123.45"), amount("7")], &schema, &config)
        .expect("fits in (5,2)");
    assert_eq!(batch.schema().field(0).data_type(), &DataType::Decimal128(5, 2));
    let stored = batch
        .column(0)
        .as_any()
        .downcast_ref::<Decimal128Array>()
        .expect("decimal128");
    assert_eq!(stored.value(0), 12_345);
    assert_eq!(stored.value(1), 700);
    let rows = from_arrow_values(&batch, &amounts(), true, &config).expect("decode");
    assert_eq!(rows[0].get("amount"), Some(&Value::Decimal(Decimal::new(12_345, 2))));

    for overflowing in ["1234.5", "1.234"] {
        let err = to_arrow_values(&[amount(overflowing)], &schema, &config)
            .expect_err("does not fit");
        assert!(matches!(err, Error::Encode { .. }), "{overflowing}: {err}");
    }
}

fn identifiers() -> ModelSchema {
    ModelSchema::record(
        "test.Identifiers",
        vec![
            Field::new("id", TypeDescriptor::uuid(Some(7))),
            Field::new("ulid", TypeDescriptor::Identifier(IdentifierKind::Ulid)),
        ],
    )
}

fn is_strictly_increasing(array: &FixedSizeBinaryArray) -> bool {
    (1..array.len()).all(|i| array.value(i - 1) < array.value(i))
}

#[test]
fn time_ordered_identifiers_keep_their_order_in_bytes() {
    let rows: Vec<Value> = (0..6u64)
        .map(|i| {
            let uuid = Uuid::new_v7(Timestamp::from_unix(NoContext, 1_700_000_000 + i, 0));
            let ulid = Ulid::from_parts(1_700_000_000_000 + i, u128::from(6 - i));
            Value::record([("id", Value::Uuid(uuid)), ("ulid", Value::Ulid(ulid))])
        })
        .collect();
    let config = ConversionConfig::default();
    let schema = schema_for(&identifiers(), &config).expect("schema");
    let batch = to_arrow_values(&rows, &schema, &config).expect("encode");

    for column in batch.columns() {
        let bytes = column
            .as_any()
            .downcast_ref::<FixedSizeBinaryArray>()
            .expect("16-byte identifiers");
        assert_eq!(bytes.value_length(), 16);
        assert!(is_strictly_increasing(bytes));
    }
    let field = batch.schema().field(0).clone();
    assert_eq!(
        field.metadata().get("stratum:uuid.version").map(String::as_str),
        Some("7")
    );
    assert_eq!(
        from_arrow_values(&batch, &identifiers(), true, &config).expect("decode"),
        rows
    );
}

#[test]
fn uuid_versions_are_checked_unless_on_the_fast_path() {
    let row = Value::record([
        ("id", Value::Uuid(Uuid::new_v4())),
        ("ulid", Value::Ulid(Ulid::from_parts(1, 1))),
    ]);
    let config = ConversionConfig::default();
    let schema = schema_for(&identifiers(), &config).expect("schema");
    assert!(to_arrow_values(std::slice::from_ref(&row), &schema, &config).is_err());

    let fast = config.with_fast_path(true);
    let schema = schema_for(&identifiers(), &fast).expect("fast schema");
    let batch = to_arrow_values(&[row], &schema, &fast).expect("trusted input");
    assert_eq!(batch.num_rows(), 1);
}

#[test]
fn binary_and_map_columns_round_trip() {
    let model = ModelSchema::record(
        "test.Blobs",
        vec![
            Field::new("payload", TypeDescriptor::Binary),
            Field::new("weights", TypeDescriptor::map(TypeDescriptor::float64())),
        ],
    );
    let rows = vec![
        Value::record([
            ("payload", Value::bytes(vec![7u8; 4096])),
            (
                "weights",
                Value::Map(vec![
                    (Value::from("a"), Value::from(1.5)),
                    (Value::from("b"), Value::from(-2.0)),
                ]),
            ),
        ]),
        Value::record([
            ("payload", Value::bytes(vec![1u8, 2, 3])),
            ("weights", Value::Map(Vec::new())),
        ]),
    ];
    assert_eq!(
        round_trip(&model, &rows, &ConversionConfig::default()),
        rows
    );
}

#[test]
fn optional_nulls_set_only_their_validity_bit() {
    let model = ModelSchema::record(
        "test.Sparse",
        vec![
            Field::new("a", TypeDescriptor::optional(TypeDescriptor::int64())),
            Field::new("b", TypeDescriptor::optional(TypeDescriptor::string())),
        ],
    );
    let rows = vec![
        Value::record([("a", Value::from(1)), ("b", Value::Null)]),
        Value::record([("a", Value::Null), ("b", Value::from("y"))]),
    ];
    let config = ConversionConfig::default();
    let schema = schema_for(&model, &config).expect("schema");
    let batch = to_arrow_values(&rows, &schema, &config).expect("encode");
    assert_eq!(batch.column(0).null_count(), 1);
    assert!(batch.column(0).is_null(1));
    assert_eq!(batch.column(1).null_count(), 1);
    assert!(batch.column(1).is_null(0));
    assert_eq!(
        from_arrow_values(&batch, &model, true, &config).expect("decode"),
        rows
    );
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Tick {
    symbol: String,
    price: f64,
}

impl SerdeModel for Tick {
    fn model_schema() -> ModelSchema {
        ModelSchema::record(
            "test.Tick",
            vec![
                Field::new("symbol", TypeDescriptor::string()),
                Field::new("price", TypeDescriptor::float64()),
            ],
        )
    }
}

#[test]
fn batch_builder_preserves_append_order_across_snapshots() {
    let ticks: Vec<Tick> = ["AAA", "BBB", "CCC"]
        .iter()
        .enumerate()
        .map(|(i, symbol)| Tick {
            symbol: (*symbol).to_string(),
            price: i as f64 + 0.5,
        })
        .collect();
    let config = ConversionConfig::default();
    let mut builder = BatchBuilder::new(config.clone()).with_batch_size(2);
    builder.append(&ticks[0]).expect("first");
    let early = builder.to_record_batch().expect("snapshot");
    builder.append(&ticks[1]).expect("second");
    builder.append(&ticks[2]).expect("third");
    let full = builder.to_record_batch().expect("full");

    assert_eq!(early.num_rows(), 1);
    assert_eq!(full.num_rows(), 3);
    let decoded: Vec<Tick> = from_arrow(&full, true, &config).expect("decode");
    assert_eq!(decoded, ticks);

    let schema = Arc::clone(builder.schema().expect("schema established"));
    builder.clear();
    assert!(builder.is_empty());
    assert!(Arc::ptr_eq(builder.schema().expect("kept"), &schema));
}

#[test]
fn append_value_rejects_a_mistyped_row_and_keeps_earlier_rows() {
    let config = ConversionConfig::default();
    let mut builder = BatchBuilder::for_model::<Tick>(config.clone()).expect("builder");
    builder
        .append_value(&Value::record([
            ("symbol", Value::from("AAA")),
            ("price", Value::from(1.5)),
        ]))
        .expect("valid row");
    let err = builder
        .append_value(&Value::record([
            ("symbol", Value::from("BBB")),
            ("price", Value::from("cheap")),
        ]))
        .expect_err("price is text");
    assert!(matches!(err, Error::SchemaMismatch { .. }), "{err}");
    assert_eq!(builder.len(), 1);

    builder
        .append_value(&Value::record([
            ("symbol", Value::from("CCC")),
            ("price", Value::from(2.5)),
        ]))
        .expect("builder still usable");
    let decoded: Vec<Tick> =
        from_arrow(&builder.to_record_batch().expect("batch"), true, &config).expect("decode");
    assert_eq!(
        decoded,
        vec![
            Tick {
                symbol: "AAA".into(),
                price: 1.5,
            },
            Tick {
                symbol: "CCC".into(),
                price: 2.5,
            },
        ]
    );
}

fn orders() -> ModelSchema {
    ModelSchema::record(
        "test.Order",
        vec![
            Field::new("id", TypeDescriptor::int64()),
            Field::new("items", TypeDescriptor::list(TypeDescriptor::string())),
            Field::new(
                "meta",
                TypeDescriptor::record(vec![
                    Field::new("note", TypeDescriptor::optional(TypeDescriptor::string())),
                    Field::new("tags", TypeDescriptor::list(TypeDescriptor::string())),
                ]),
            ),
            Field::new("total", TypeDescriptor::Decimal),
        ],
    )
}

fn order(id: i64, items: &[&str], total: &str) -> Value {
    let strings = |values: &[&str]| Value::List(values.iter().copied().map(Value::from).collect());
    Value::record([
        ("id", Value::from(id)),
        ("items", strings(items)),
        (
            "meta",
            Value::record([("note", Value::from("n")), ("tags", strings(items))]),
        ),
        ("total", Value::Decimal(total.parse().expect("decimal"))),
    ])
}

#[test]
fn failed_row_rolls_back_every_column() {
    let config = ConversionConfig::default().with_decimal(5, 2);
    let schema = schema_for(&orders(), &config).expect("schema");
    let mut encoder = RowEncoder::new(schema, config.clone());
    encoder.append(&order(1, &["a"], "1.50")).expect("first");
    let err = encoder
        .append(&order(2, &["b", "c", "d"], "99999.99"))
        .expect_err("total overflows after the other columns were written");
    assert!(matches!(err, Error::Encode { .. }), "{err}");
    assert_eq!(encoder.len(), 1);

    encoder.append(&order(3, &["e"], "2.25")).expect("third");
    let batch = encoder.finish().expect("aligned columns");
    assert_eq!(batch.num_rows(), 2);
    let items = batch
        .column(1)
        .as_any()
        .downcast_ref::<ListArray>()
        .expect("list");
    assert_eq!(items.values().len(), 2);
    assert_eq!(
        from_arrow_values(&batch, &orders(), true, &config).expect("decode"),
        vec![order(1, &["a"], "1.50"), order(3, &["e"], "2.25")]
    );
}
