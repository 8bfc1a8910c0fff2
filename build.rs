//! Compiles the vendored TensorFlow protos with protox and writes two files to
//! `OUT_DIR`: the prost message types (`tensorflow.rs`) and their text-format
//! bindings (`tensorflow.text.rs`), both included from `src/proto/mod.rs`.

use heck::{ToSnakeCase, ToUpperCamelCase};
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{DescriptorProto, EnumDescriptorProto, FieldDescriptorProto, FileDescriptorSet};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::Write;
use std::path::PathBuf;
use std::{env, fs};

const PROTOS: &[&str] = &[
    "proto/tensorflow/core/framework/attr_value.proto",
    "proto/tensorflow/core/framework/full_type.proto",
    "proto/tensorflow/core/framework/function.proto",
    "proto/tensorflow/core/framework/graph.proto",
    "proto/tensorflow/core/framework/graph_debug_info.proto",
    "proto/tensorflow/core/framework/node_def.proto",
    "proto/tensorflow/core/framework/op_def.proto",
    "proto/tensorflow/core/framework/resource_handle.proto",
    "proto/tensorflow/core/framework/tensor.proto",
    "proto/tensorflow/core/framework/tensor_shape.proto",
    "proto/tensorflow/core/framework/types.proto",
    "proto/tensorflow/core/framework/versions.proto",
];

type BuildResult<T> = Result<T, Box<dyn Error>>;

fn main() -> BuildResult<()> {
    for proto in PROTOS {
        println!("cargo:rerun-if-changed={proto}");
    }

    let fds = protox::compile(PROTOS, ["proto"])?;

    let out_dir = PathBuf::from(env::var("OUT_DIR")?);
    let bindings = Schema::collect(&fds).text_bindings()?;
    fs::write(out_dir.join("tensorflow.text.rs"), bindings)?;

    // BTreeMap keeps map entries in key order, so the same input always
    // encodes to the same bytes.
    prost_build::Config::new()
        .btree_map(["."])
        .disable_comments(["."])
        .compile_fds(fds)?;
    Ok(())
}

/// A message type together with the Rust names prost-build gives it.
struct Message<'a> {
    proto_name: String,
    rust_path: String,
    /// Module holding the message's nested types and oneof enums.
    module: String,
    proto2: bool,
    desc: &'a DescriptorProto,
}

#[derive(Default)]
struct Schema<'a> {
    messages: Vec<Message<'a>>,
    /// `(proto name, rust path)` for every enum.
    enums: Vec<(String, String)>,
    /// Fully qualified type name (leading dot) to rust path.
    paths: HashMap<String, String>,
    map_entries: HashMap<String, &'a DescriptorProto>,
}

#[derive(Clone, Copy)]
enum Kind<'s> {
    Scalar,
    Enum(&'s str),
    Message(&'s str),
    Map,
}

impl<'a> Schema<'a> {
    fn collect(fds: &'a FileDescriptorSet) -> Self {
        let mut schema = Self::default();
        for file in &fds.file {
            let package = file.package();
            let root = format!("crate::proto::{}", package.replace('.', "::"));
            let proto2 = file.syntax() != "proto3";
            for desc in &file.message_type {
                schema.add_message(desc, package, &root, proto2);
            }
            for desc in &file.enum_type {
                schema.add_enum(desc, package, &root);
            }
        }
        schema
    }

    fn add_message(&mut self, desc: &'a DescriptorProto, scope: &str, module: &str, proto2: bool) {
        let proto_name = format!("{scope}.{}", desc.name());
        if desc.options.as_ref().is_some_and(|o| o.map_entry()) {
            self.map_entries.insert(format!(".{proto_name}"), desc);
            return;
        }

        let rust_path = format!("{module}::{}", desc.name().to_upper_camel_case());
        let nested = format!("{module}::{}", rust_ident(desc.name()));
        self.paths.insert(format!(".{proto_name}"), rust_path.clone());
        for child in &desc.nested_type {
            self.add_message(child, &proto_name, &nested, proto2);
        }
        for child in &desc.enum_type {
            self.add_enum(child, &proto_name, &nested);
        }
        self.messages.push(Message {
            proto_name,
            rust_path,
            module: nested,
            proto2,
            desc,
        });
    }

    fn add_enum(&mut self, desc: &EnumDescriptorProto, scope: &str, module: &str) {
        let proto_name = format!("{scope}.{}", desc.name());
        let rust_path = format!("{module}::{}", desc.name().to_upper_camel_case());
        self.paths.insert(format!(".{proto_name}"), rust_path.clone());
        self.enums.push((proto_name, rust_path));
    }

    fn path(&self, type_name: &str) -> BuildResult<&str> {
        self.paths
            .get(type_name)
            .map(String::as_str)
            .ok_or_else(|| format!("unresolved type {type_name}").into())
    }

    fn text_bindings(&self) -> BuildResult<String> {
        let mut out = String::new();
        writeln!(out, "// @generated by build.rs from the vendored TensorFlow protos.")?;
        writeln!(out)?;
        writeln!(
            out,
            "use crate::text::{{Field, MapValue, ParseError, Printer, TextEnum, TextFormat}};"
        )?;

        for (proto_name, rust_path) in &self.enums {
            writeln!(out)?;
            write_enum(&mut out, proto_name, rust_path)?;
        }
        for msg in &self.messages {
            writeln!(out)?;
            self.write_message(&mut out, msg)?;
        }
        Ok(out)
    }

    fn write_message(&self, out: &mut String, msg: &Message<'_>) -> BuildResult<()> {
        let mut fields: Vec<&FieldDescriptorProto> = msg.desc.field.iter().collect();
        fields.sort_by_key(|f| f.number());

        for (index, oneof) in msg.desc.oneof_decl.iter().enumerate() {
            let members: Vec<_> = fields
                .iter()
                .filter(|f| oneof_index(f) == Some(index))
                .collect();
            if members.is_empty() {
                continue;
            }
            writeln!(out, "impl {}::{} {{", msg.module, oneof.name().to_upper_camel_case())?;
            writeln!(out, "    fn field_name(&self) -> &'static str {{")?;
            writeln!(out, "        match self {{")?;
            for f in members {
                writeln!(
                    out,
                    "            Self::{}(_) => \"{}\",",
                    f.name().to_upper_camel_case(),
                    f.name()
                )?;
            }
            writeln!(out, "        }}")?;
            writeln!(out, "    }}")?;
            writeln!(out, "}}")?;
            writeln!(out)?;
        }

        let mut merge = String::new();
        let mut print = String::new();
        for field in &fields {
            self.write_field(msg, field, &mut merge, &mut print)?;
        }

        writeln!(out, "impl TextFormat for {} {{", msg.rust_path)?;
        writeln!(out, "    const TYPE_NAME: &'static str = \"{}\";", msg.proto_name)?;
        writeln!(out)?;
        if fields.is_empty() {
            writeln!(
                out,
                "    fn merge_field(&mut self, _field: &mut Field<'_, '_>) -> Result<bool, ParseError> {{"
            )?;
            writeln!(out, "        Ok(false)")?;
            writeln!(out, "    }}")?;
            writeln!(out)?;
            writeln!(out, "    fn print_fields(&self, _out: &mut Printer) {{}}")?;
        } else {
            writeln!(
                out,
                "    fn merge_field(&mut self, field: &mut Field<'_, '_>) -> Result<bool, ParseError> {{"
            )?;
            writeln!(out, "        match field.name() {{")?;
            out.push_str(&merge);
            writeln!(out, "            _ => return Ok(false),")?;
            writeln!(out, "        }}")?;
            writeln!(out, "        Ok(true)")?;
            writeln!(out, "    }}")?;
            writeln!(out)?;
            writeln!(out, "    fn print_fields(&self, out: &mut Printer) {{")?;
            out.push_str(&print);
            writeln!(out, "    }}")?;
        }
        writeln!(out, "}}")?;
        writeln!(out)?;

        writeln!(out, "impl MapValue for {} {{", msg.rust_path)?;
        writeln!(
            out,
            "    fn merge_value(field: &mut Field<'_, '_>, slot: &mut Option<Self>) -> Result<(), ParseError> {{"
        )?;
        writeln!(
            out,
            "        field.merge_message::<Self, _>(slot.get_or_insert_with(Default::default))"
        )?;
        writeln!(out, "    }}")?;
        writeln!(out)?;
        writeln!(out, "    fn print_value(&self, out: &mut Printer) {{")?;
        writeln!(out, "        out.message(\"value\", self);")?;
        writeln!(out, "    }}")?;
        writeln!(out, "}}")?;
        Ok(())
    }

    fn kind(&self, msg: &Message<'_>, field: &FieldDescriptorProto) -> BuildResult<Kind<'_>> {
        Ok(match field.r#type() {
            Type::Group => {
                return Err(
                    format!("{}.{}: groups are not supported", msg.proto_name, field.name()).into(),
                );
            }
            Type::Enum => Kind::Enum(self.path(field.type_name())?),
            Type::Message => match self.map_entries.get(field.type_name()) {
                Some(entry) => {
                    let value = entry.field.iter().find(|f| f.number() == 2);
                    if value.is_some_and(|v| v.r#type() == Type::Enum) {
                        return Err(format!(
                            "{}.{}: enum-valued maps are not supported",
                            msg.proto_name,
                            field.name()
                        )
                        .into());
                    }
                    Kind::Map
                }
                None => Kind::Message(self.path(field.type_name())?),
            },
            _ => Kind::Scalar,
        })
    }

    fn write_field(
        &self,
        msg: &Message<'_>,
        field: &FieldDescriptorProto,
        merge: &mut String,
        print: &mut String,
    ) -> BuildResult<()> {
        let name = field.name();
        let ident = rust_ident(name);
        let kind = self.kind(msg, field)?;

        if let Some(index) = oneof_index(field) {
            let oneof = msg.desc.oneof_decl[index].name();
            let slot = rust_ident(oneof);
            let enum_path = format!("{}::{}", msg.module, oneof.to_upper_camel_case());
            let variant = format!("{enum_path}::{}", name.to_upper_camel_case());

            writeln!(merge, "            \"{name}\" => {{")?;
            writeln!(
                merge,
                "                field.oneof(\"{oneof}\", self.{slot}.as_ref().map({enum_path}::field_name))?;"
            )?;
            match kind {
                Kind::Scalar => writeln!(
                    merge,
                    "                self.{slot} = Some({variant}(field.scalar()?));"
                )?,
                Kind::Enum(e) => writeln!(
                    merge,
                    "                self.{slot} = Some({variant}(field.enumeration::<{e}>()?));"
                )?,
                Kind::Message(m) => {
                    writeln!(merge, "                let mut msg = match self.{slot}.take() {{")?;
                    writeln!(merge, "                    Some({variant}(msg)) => msg,")?;
                    writeln!(merge, "                    _ => Default::default(),")?;
                    writeln!(merge, "                }};")?;
                    writeln!(merge, "                field.merge_message::<{m}, _>(&mut msg)?;")?;
                    writeln!(merge, "                self.{slot} = Some({variant}(msg));")?;
                }
                Kind::Map => {
                    return Err(format!("{}.{name}: map inside oneof", msg.proto_name).into());
                }
            }
            writeln!(merge, "            }}")?;

            let emit = match kind {
                Kind::Enum(e) => format!("out.enumeration::<{e}>(\"{name}\", *v)"),
                Kind::Message(m) => format!("out.message::<{m}>(\"{name}\", v)"),
                _ => format!("out.field(\"{name}\", v)"),
            };
            writeln!(print, "        if let Some({variant}(v)) = &self.{slot} {{")?;
            writeln!(print, "            {emit};")?;
            writeln!(print, "        }}")?;
            return Ok(());
        }

        let repeated = field.label() == Label::Repeated;
        let explicit = field.proto3_optional() || (msg.proto2 && field.label() == Label::Optional);
        let (merge_expr, print_stmt) = match (kind, repeated) {
            (Kind::Map, _) => (
                format!("field.map(&mut self.{ident})?"),
                format!("out.map(\"{name}\", &self.{ident});"),
            ),
            (Kind::Scalar, true) => (
                format!("field.repeated(&mut self.{ident})?"),
                format!("out.repeated(\"{name}\", &self.{ident});"),
            ),
            (Kind::Enum(e), true) => (
                format!("field.repeated_enumeration::<{e}>(&mut self.{ident})?"),
                format!("out.repeated_enumeration::<{e}>(\"{name}\", &self.{ident});"),
            ),
            (Kind::Message(_), true) => (
                format!("field.repeated_message(&mut self.{ident})?"),
                format!("out.repeated_message(\"{name}\", &self.{ident});"),
            ),
            (Kind::Message(m), false) => (
                format!(
                    "field.merge_message::<{m}, _>(self.{ident}.get_or_insert_with(Default::default))?"
                ),
                format!(
                    "if let Some(v) = &self.{ident} {{\n            out.message::<{m}>(\"{name}\", v);\n        }}"
                ),
            ),
            (Kind::Scalar, false) if explicit => (
                format!("self.{ident} = Some(field.scalar()?)"),
                format!("out.optional(\"{name}\", &self.{ident});"),
            ),
            (Kind::Enum(e), false) if explicit => (
                format!("self.{ident} = Some(field.enumeration::<{e}>()?)"),
                format!("out.optional_enumeration::<{e}>(\"{name}\", self.{ident});"),
            ),
            (Kind::Scalar, false) => (
                format!("self.{ident} = field.scalar()?"),
                format!("out.non_default(\"{name}\", &self.{ident});"),
            ),
            (Kind::Enum(e), false) => (
                format!("self.{ident} = field.enumeration::<{e}>()?"),
                format!("out.non_default_enumeration::<{e}>(\"{name}\", self.{ident});"),
            ),
        };
        writeln!(merge, "            \"{name}\" => {merge_expr},")?;
        writeln!(print, "        {print_stmt}")?;
        Ok(())
    }
}

fn write_enum(out: &mut String, proto_name: &str, rust_path: &str) -> BuildResult<()> {
    writeln!(out, "impl TextEnum for {rust_path} {{")?;
    writeln!(out, "    const TYPE_NAME: &'static str = \"{proto_name}\";")?;
    writeln!(out)?;
    writeln!(out, "    fn from_name(name: &str) -> Option<i32> {{")?;
    writeln!(out, "        Self::from_str_name(name).map(|v| v as i32)")?;
    writeln!(out, "    }}")?;
    writeln!(out)?;
    writeln!(out, "    fn name(value: i32) -> Option<&'static str> {{")?;
    writeln!(out, "        Self::try_from(value).ok().map(|v| v.as_str_name())")?;
    writeln!(out, "    }}")?;
    writeln!(out, "}}")?;
    Ok(())
}

/// Index of the real oneof a field belongs to. proto3 `optional` fields sit in
/// a synthetic oneof that prost-build turns into a plain `Option`.
fn oneof_index(field: &FieldDescriptorProto) -> Option<usize> {
    if field.proto3_optional() {
        return None;
    }
    field.oneof_index.and_then(|i| usize::try_from(i).ok())
}

/// Field and module names as prost-build spells them.
fn rust_ident(name: &str) -> String {
    let ident = name.to_snake_case();
    match ident.as_str() {
        "self" | "super" | "extern" | "crate" => format!("{ident}_"),
        "as" | "async" | "await" | "break" | "const" | "continue" | "dyn" | "else" | "enum"
        | "false" | "fn" | "for" | "if" | "impl" | "in" | "let" | "loop" | "match" | "mod"
        | "move" | "mut" | "pub" | "ref" | "return" | "static" | "struct" | "trait" | "true"
        | "type" | "unsafe" | "use" | "where" | "while" | "abstract" | "become" | "box" | "do"
        | "final" | "gen" | "macro" | "override" | "priv" | "try" | "typeof" | "unsized"
        | "virtual" | "yield" => format!("r#{ident}"),
        _ => ident,
    }
}
