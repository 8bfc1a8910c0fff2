use crate::text::{MapValue, Scalar, TextEnum, TextFormat};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Writes fields one per line, nesting messages in `{ }` with two-space
/// indentation.
#[derive(Debug, Default)]
pub struct Printer {
    out: String,
    indent: usize,
}

impl Printer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(self) -> String {
        self.out
    }

    fn start_line(&mut self, name: &str) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
        self.out.push_str(name);
    }

    pub fn field<T: Scalar>(&mut self, name: &str, value: &T) {
        self.start_line(name);
        self.out.push_str(": ");
        value.write(&mut self.out);
        self.out.push('\n');
    }

    /// Proto3 scalars are only printed when they differ from the default.
    pub fn non_default<T: Scalar + Default + PartialEq>(&mut self, name: &str, value: &T) {
        if *value != T::default() {
            self.field(name, value);
        }
    }

    /// Fields with explicit presence are printed whenever they are set.
    pub fn optional<T: Scalar>(&mut self, name: &str, value: &Option<T>) {
        if let Some(value) = value {
            self.field(name, value);
        }
    }

    pub fn repeated<T: Scalar>(&mut self, name: &str, values: &[T]) {
        for value in values {
            self.field(name, value);
        }
    }

    pub fn enumeration<E: TextEnum>(&mut self, name: &str, value: i32) {
        self.start_line(name);
        self.out.push_str(": ");
        match E::name(value) {
            Some(label) => self.out.push_str(label),
            None => {
                let _ = write!(self.out, "{}", value);
            }
        }
        self.out.push('\n');
    }

    pub fn non_default_enumeration<E: TextEnum>(&mut self, name: &str, value: i32) {
        if value != 0 {
            self.enumeration::<E>(name, value);
        }
    }

    pub fn optional_enumeration<E: TextEnum>(&mut self, name: &str, value: Option<i32>) {
        if let Some(value) = value {
            self.enumeration::<E>(name, value);
        }
    }

    pub fn repeated_enumeration<E: TextEnum>(&mut self, name: &str, values: &[i32]) {
        for &value in values {
            self.enumeration::<E>(name, value);
        }
    }

    pub fn message<M: TextFormat>(&mut self, name: &str, msg: &M) {
        self.start_line(name);
        self.out.push_str(" {\n");
        self.indent += 1;
        msg.print_fields(self);
        self.indent -= 1;
        self.start_line("}\n");
    }

    pub fn repeated_message<M: TextFormat>(&mut self, name: &str, msgs: &[M]) {
        for msg in msgs {
            self.message(name, msg);
        }
    }

    /// Map entries come out in key order.
    pub fn map<K: Scalar, V: MapValue>(&mut self, name: &str, map: &BTreeMap<K, V>) {
        for (key, value) in map {
            self.start_line(name);
            self.out.push_str(" {\n");
            self.indent += 1;
            self.field("key", key);
            value.print_value(self);
            self.indent -= 1;
            self.start_line("}\n");
        }
    }
}
