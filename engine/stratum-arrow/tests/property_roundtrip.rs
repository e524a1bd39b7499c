use proptest::prelude::*;
use stratum::{Decimal, Field, ModelSchema, TypeDescriptor, Value};
use stratum_arrow::{
    from_arrow_values, to_arrow_values, ConversionConfig, SchemaBuilder, UnionEncoding,
};

fn ledger() -> ModelSchema {
    ModelSchema::record(
        "prop.Ledger",
        vec![
            Field::new("id", TypeDescriptor::int64()),
            Field::new("name", TypeDescriptor::string()),
            Field::new("score", TypeDescriptor::optional(TypeDescriptor::float64())),
            Field::new("tags", TypeDescriptor::list(TypeDescriptor::string())),
            Field::new("amount", TypeDescriptor::Decimal),
            Field::new(
                "meta",
                TypeDescriptor::optional(TypeDescriptor::record(vec![
                    Field::new("flag", TypeDescriptor::bool()),
                    Field::new("note", TypeDescriptor::optional(TypeDescriptor::string())),
                ])),
            ),
        ],
    )
}

fn meta_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        (any::<bool>(), proptest::option::of("[a-z]{0,6}")).prop_map(|(flag, note)| {
            Value::record([
                ("flag", Value::Bool(flag)),
                ("note", note.map_or(Value::Null, Value::from)),
            ])
        }),
    ]
}

fn row_strategy() -> impl Strategy<Value = Value> {
    (
        any::<i64>(),
        "\\PC{0,12}",
        proptest::option::of(-1.0e9f64..1.0e9),
        proptest::collection::vec("[a-z]{1,5}", 0..4),
        (any::<i64>(), 0i8..=9),
        meta_strategy(),
    )
        .prop_map(|(id, name, score, tags, (unscaled, scale), meta)| {
            Value::record([
                ("id", Value::from(id)),
                ("name", Value::from(name)),
                ("score", score.map_or(Value::Null, Value::from)),
                ("tags", Value::List(tags.into_iter().map(Value::from).collect())),
                ("amount", Value::Decimal(Decimal::new(unscaled.into(), scale))),
                ("meta", meta),
            ])
        })
}

proptest! {
    #[test]
    fn rows_survive_encode_then_validated_decode(
        rows in proptest::collection::vec(row_strategy(), 0..16),
    ) {
        let config = ConversionConfig::default();
        let schema = SchemaBuilder::new(config.clone()).build(&ledger()).expect("schema");
        let batch = to_arrow_values(&rows, &schema, &config).expect("encode");
        prop_assert_eq!(batch.num_rows(), rows.len());
        let decoded = from_arrow_values(&batch, &ledger(), true, &config).expect("decode");
        prop_assert_eq!(decoded, rows);
    }

    #[test]
    fn schema_building_is_deterministic(
        precision in 1u8..=38,
        scale_seed in 0u8..=38,
        dense in any::<bool>(),
    ) {
        let scale = i8::try_from(scale_seed % (precision + 1)).expect("scale fits");
        let encoding = if dense { UnionEncoding::DenseUnion } else { UnionEncoding::TaggedStruct };
        let config = ConversionConfig::default()
            .with_decimal(precision, scale)
            .with_union_encoding(encoding);
        let first = SchemaBuilder::new(config.clone()).build(&ledger()).expect("first");
        let second = SchemaBuilder::new(config).build(&ledger()).expect("second");
        prop_assert_eq!(first.schema_hash(), second.schema_hash());
        prop_assert_eq!(first.arrow_schema(), second.arrow_schema());
        prop_assert!(first.is_compatible_with(&second));

        let other_scale = if scale == 0 { 1 } else { scale - 1 };
        let shifted = ConversionConfig::default().with_decimal(precision, other_scale);
        let third = SchemaBuilder::new(shifted).build(&ledger()).expect("third");
        prop_assert_ne!(first.schema_hash(), third.schema_hash());
    }
}
