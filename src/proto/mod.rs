//! GraphDef schema: prost message types and their text-format bindings, both
//! generated by `build.rs` from the protos vendored under `proto/`.

pub mod tensorflow {
    include!(concat!(env!("OUT_DIR"), "/tensorflow.rs"));
}

mod bindings {
    include!(concat!(env!("OUT_DIR"), "/tensorflow.text.rs"));
}

pub use tensorflow::*;
