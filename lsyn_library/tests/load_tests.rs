#![allow(missing_docs)]
#![allow(clippy::missing_docs_in_private_items)]

use std::io::Write;
use std::path::Path;

use lsyn_library::{CellLibrary, DelayModel, LibraryError};
use lsyn_netlist::NodeKind;

const SMALL: &str = r#"{
  "name": "small",
  "cells": [
    { "name": "NAND2_X1", "function": "NAND(A,B)",
      "pins": [{"name": "A", "direction": "input"}, {"name": "B", "direction": "input"},
               {"name": "Y", "direction": "output"}],
      "area": 1.0, "delay": {"A": 0.8, "B": 0.9} },
    { "name": "INV_X1", "function": "NOT(A)",
      "pins": [{"name": "A", "direction": "input"}, {"name": "Y", "direction": "output"}],
      "area": 0.5, "delay": 0.3 }
  ]
}"#;

#[test]
fn load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(SMALL.as_bytes()).unwrap();
    let lib = CellLibrary::load(file.path()).unwrap();
    assert_eq!(lib.name(), "small");
    assert_eq!(lib.cells().len(), 2);
    assert_eq!(lib.delay("NAND2_X1", "B"), Some(0.9));
    assert_eq!(lib.delay("INV_X1", "A"), Some(0.3));
    assert!(matches!(lib.cell("INV_X1").unwrap().delay_model(), DelayModel::Scalar(_)));
    assert_eq!(lib.lookup(&NodeKind::Nand).len(), 1);
    assert!(lib.lookup(&NodeKind::Mul).is_empty());
}

#[test]
fn missing_file() {
    let err = CellLibrary::load(Path::new("/definitely/not/here.json")).unwrap_err();
    assert!(matches!(err, LibraryError::Io { .. }));
}

#[test]
fn malformed_json() {
    assert!(matches!(CellLibrary::from_json("{\"name\": 3}"), Err(LibraryError::Json(_))));
}

#[test]
fn generic_library_round_trips_through_json() {
    let lib = CellLibrary::generic();
    let text = serde_json::to_string(&lib.to_record()).unwrap();
    let back = CellLibrary::from_json(&text).unwrap();
    assert_eq!(back.to_record(), lib.to_record());
}

#[test]
fn black_box_macro_cells() {
    let text = r#"{"name": "m", "cells": [
        {"name": "RAM_MACRO", "function": "MODULE:ram(A,D)",
         "pins": [{"name": "A", "direction": "input"}, {"name": "D", "direction": "input"},
                  {"name": "Q", "direction": "output"}],
         "area": 50.0, "delay": 3.0}]}"#;
    let lib = CellLibrary::from_json(text).unwrap();
    assert_eq!(lib.lookup(&NodeKind::Module("ram".into())).len(), 1);
    assert!(lib.lookup(&NodeKind::Module("rom".into())).is_empty());
}
