use graphdef_convert::proto::attr_value::{ListValue, Value};
use graphdef_convert::proto::function_def::ArgAttrs;
use graphdef_convert::proto::op_def::ArgDef;
use graphdef_convert::proto::tensor_shape_proto::Dim;
use graphdef_convert::proto::{
    AttrValue, FunctionDef, FunctionDefLibrary, GradientDef, GraphDef, NameAttrList, NodeDef,
    OpDef, RegisteredGradient, TensorProto, TensorShapeProto, VersionDef,
};
use graphdef_convert::{ConvertError, GraphConverter, OutputFormat, parse_text, serialize_text};
use pretty_assertions::assert_eq;
use proptest::collection::{btree_map, vec};
use proptest::prelude::*;
use prost::Message;
use std::collections::BTreeMap;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

const SINGLE_CONST: &str = r#"
node {
  name: "Const"
  op: "Const"
  attr {
    key: "dtype"
    value { type: DT_INT32 }
  }
  attr {
    key: "value"
    value {
      tensor {
        dtype: DT_INT32
        tensor_shape {}
        int_val: 42
      }
    }
  }
}
versions { producer: 1087 }
"#;

#[test]
fn single_const_node_converts_to_binary() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("graph.pbtxt");
    let output = dir.path().join("graph.pb");
    fs::write(&input, SINGLE_CONST).unwrap();

    GraphConverter::new()
        .convert(&input, &output, OutputFormat::Binary)
        .unwrap();

    let bytes = fs::read(&output).unwrap();
    let graph = GraphDef::decode(bytes.as_slice()).unwrap();
    assert_eq!(graph.node.len(), 1);
    assert_eq!(graph.node[0].name, "Const");
    assert_eq!(graph, parse_text::<GraphDef>(SINGLE_CONST).unwrap());
}

#[test]
fn unknown_field_fails_without_output() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("graph.pbtxt");
    let output = dir.path().join("graph.pb");
    fs::write(&input, "node { name: \"a\" colour: \"red\" }").unwrap();

    let err = GraphConverter::new()
        .convert(&input, &output, OutputFormat::Binary)
        .unwrap_err();
    let ConvertError::Parse(parse) = err else {
        panic!("expected parse error, got {err}");
    };
    assert_eq!((parse.line, parse.column), (1, 18));
    assert!(!output.exists());
}

#[test]
fn cli_convert_then_dump() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("graph.pbtxt");
    let output = dir.path().join("graph.pb");
    fs::write(&input, SINGLE_CONST).unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_graphdef-convert"))
        .arg("convert")
        .arg("-i")
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .status()
        .unwrap();
    assert!(status.success());

    let dumped = Command::new(env!("CARGO_BIN_EXE_graphdef-convert"))
        .arg("dump")
        .arg("-i")
        .arg(&output)
        .output()
        .unwrap();
    assert!(dumped.status.success());
    let text = String::from_utf8(dumped.stdout).unwrap();
    assert_eq!(
        parse_text::<GraphDef>(&text).unwrap(),
        parse_text::<GraphDef>(SINGLE_CONST).unwrap()
    );
}

#[test]
fn cli_fails_on_malformed_input() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("graph.pbtxt");
    let output = dir.path().join("graph.pb");
    fs::write(&input, "node {").unwrap();

    let result = Command::new(env!("CARGO_BIN_EXE_graphdef-convert"))
        .arg("convert")
        .arg("--input")
        .arg(&input)
        .arg("--out")
        .arg(&output)
        .output()
        .unwrap();
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("convert"));
    assert!(!output.exists());
}

fn finite_f32() -> impl Strategy<Value = f32> {
    any::<f32>().prop_filter("nan never compares equal", |f| !f.is_nan())
}

fn finite_f64() -> impl Strategy<Value = f64> {
    any::<f64>().prop_filter("nan never compares equal", |f| !f.is_nan())
}

fn dtype() -> impl Strategy<Value = i32> {
    prop_oneof![0i32..=32, 101i32..=132]
}

fn shape() -> impl Strategy<Value = TensorShapeProto> {
    (vec((-1i64..1 << 40, "[a-z]{0,3}"), 0..4), any::<bool>()).prop_map(|(dims, unknown_rank)| {
        TensorShapeProto {
            dim: dims.into_iter().map(|(size, name)| Dim { size, name }).collect(),
            unknown_rank,
        }
    })
}

fn tensor() -> impl Strategy<Value = TensorProto> {
    (
        (dtype(), proptest::option::of(shape()), any::<i32>()),
        (vec(finite_f32(), 0..4), vec(finite_f64(), 0..3)),
        (vec(any::<i32>(), 0..4), vec(any::<i64>(), 0..4), vec(any::<u64>(), 0..3)),
        (vec(vec(any::<u8>(), 0..6), 0..3), vec(any::<bool>(), 0..3)),
        (vec(any::<u8>(), 0..8), vec(any::<u8>(), 0..4)),
    )
        .prop_map(
            |(
                (dtype, tensor_shape, version_number),
                (float_val, double_val),
                (int_val, int64_val, uint64_val),
                (string_val, bool_val),
                (tensor_content, float8_val),
            )| TensorProto {
                dtype,
                tensor_shape,
                version_number,
                tensor_content,
                float_val,
                double_val,
                int_val,
                string_val,
                int64_val,
                bool_val,
                uint64_val,
                float8_val,
                ..Default::default()
            },
        )
}

fn attr_value() -> impl Strategy<Value = AttrValue> {
    let value = prop_oneof![
        any::<i64>().prop_map(Value::I),
        finite_f32().prop_map(Value::F),
        any::<bool>().prop_map(Value::B),
        vec(any::<u8>(), 0..8).prop_map(Value::S),
        dtype().prop_map(Value::Type),
        "\\PC{0,8}".prop_map(Value::Placeholder),
        shape().prop_map(|s| Value::Shape(s.into())),
        tensor().prop_map(|t| Value::Tensor(t.into())),
        "[A-Za-z]{1,8}".prop_map(|name| Value::Func(NameAttrList {
            name,
            ..Default::default()
        }
        .into())),
        (
            vec(any::<i64>(), 0..4),
            vec(finite_f32(), 0..4),
            vec(any::<bool>(), 0..4),
            vec(dtype(), 0..3),
            vec(shape(), 0..2),
        )
            .prop_map(|(i, f, b, r#type, shape)| {
                Value::List(
                    ListValue {
                        i,
                        f,
                        b,
                        r#type,
                        shape,
                        ..Default::default()
                    }
                    .into(),
                )
            }),
    ];
    proptest::option::of(value).prop_map(|value| AttrValue { value })
}

fn attrs() -> impl Strategy<Value = BTreeMap<String, AttrValue>> {
    btree_map("[a-z_]{0,5}", attr_value(), 0..4)
}

fn node() -> impl Strategy<Value = NodeDef> {
    (
        "[A-Za-z][A-Za-z0-9_/]{0,10}",
        "[A-Z][A-Za-z]{0,8}",
        vec("\\^?[a-z]{1,6}(:[0-9])?", 0..3),
        "\\PC{0,6}",
        attrs(),
    )
        .prop_map(|(name, op, input, device, attr)| NodeDef {
            name,
            op,
            input,
            device,
            attr,
            ..Default::default()
        })
}

fn arg() -> impl Strategy<Value = ArgDef> {
    ("[a-z][a-z0-9_]{0,6}", dtype(), "[A-Z]?", any::<bool>()).prop_map(
        |(name, r#type, type_attr, is_ref)| ArgDef {
            name,
            r#type,
            type_attr,
            is_ref,
            ..Default::default()
        },
    )
}

fn function() -> impl Strategy<Value = FunctionDef> {
    (
        ("[A-Za-z_][A-Za-z0-9_]{0,12}", vec(arg(), 0..3), vec(arg(), 0..2), any::<bool>()),
        vec(node(), 0..3),
        btree_map("[a-z]{1,4}", "[a-z]{1,4}:[a-z]{1,4}:[0-9]", 0..3),
        attrs(),
        btree_map(any::<u32>(), attrs(), 0..3),
        btree_map(any::<u32>(), any::<u32>(), 0..3),
    )
        .prop_map(
            |((name, input_arg, output_arg, is_stateful), node_def, ret, attr, arg_attr, ids)| {
                FunctionDef {
                    signature: Some(OpDef {
                        name,
                        input_arg,
                        output_arg,
                        is_stateful,
                        ..Default::default()
                    }),
                    node_def,
                    ret,
                    attr,
                    arg_attr: arg_attr
                        .into_iter()
                        .map(|(index, attr)| (index, ArgAttrs { attr }))
                        .collect(),
                    resource_arg_unique_id: ids,
                    ..Default::default()
                }
            },
        )
}

fn library() -> impl Strategy<Value = FunctionDefLibrary> {
    (
        vec(function(), 0..3),
        vec(("[a-z]{1,6}", "[a-z]{1,6}"), 0..2),
        vec(("[a-z]{1,6}", "[A-Z][a-z]{0,6}"), 0..2),
    )
        .prop_map(|(function, gradient, registered)| FunctionDefLibrary {
            function,
            gradient: gradient
                .into_iter()
                .map(|(function_name, gradient_func)| GradientDef {
                    function_name,
                    gradient_func,
                })
                .collect(),
            registered_gradients: registered
                .into_iter()
                .map(|(gradient_func, registered_op_type)| RegisteredGradient {
                    gradient_func,
                    registered_op_type,
                })
                .collect(),
        })
}

fn graph() -> impl Strategy<Value = GraphDef> {
    (
        vec(node(), 0..5),
        proptest::option::of(library()),
        proptest::option::of((any::<i32>(), any::<i32>(), vec(any::<i32>(), 0..2))),
    )
        .prop_map(|(node, library, versions)| GraphDef {
            node,
            library,
            versions: versions.map(|(producer, min_consumer, bad_consumers)| VersionDef {
                producer,
                min_consumer,
                bad_consumers,
            }),
            ..Default::default()
        })
}

proptest! {
    #[test]
    fn text_round_trip(graph in graph()) {
        let text = serialize_text(&graph);
        let reparsed: GraphDef = parse_text(&text).unwrap();
        prop_assert_eq!(reparsed, graph);
    }

    #[test]
    fn binary_output_matches_parsed_text(graph in graph()) {
        let dir = tempdir().unwrap();
        let output = dir.path().join("graph.pb");
        let converter = GraphConverter::new();

        let parsed = converter.parse_text(&serialize_text(&graph)).unwrap();
        converter.write_binary(&parsed, &output).unwrap();
        prop_assert_eq!(converter.read_binary(&output).unwrap(), parsed);
    }
}
