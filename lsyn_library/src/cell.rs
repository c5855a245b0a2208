//! Library cell records.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{LibraryError, Pattern};

/// Signal direction of a cell pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinDirection {
    /// Driven by the netlist.
    Input,
    /// Driven by the cell.
    Output,
}

/// A named cell pin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pin {
    /// Pin name as used in the function pattern.
    pub name: String,
    /// Signal direction.
    pub direction: PinDirection,
}

impl Pin {
    /// An input pin.
    pub fn input(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction: PinDirection::Input,
        }
    }

    /// An output pin.
    pub fn output(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction: PinDirection::Output,
        }
    }
}

/// Pin-to-output propagation delay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DelayModel {
    /// Same delay from every input pin.
    Scalar(f64),
    /// Delay per input pin.
    PerPin(IndexMap<String, f64>),
}

/// Serialized form of a cell, as found in library files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellRecord {
    /// Cell name; becomes the node type tag after mapping.
    pub name: String,
    /// Function pattern text.
    pub function: String,
    /// Input and output pins.
    pub pins: Vec<Pin>,
    /// Cell area.
    pub area: f64,
    /// Propagation delay.
    pub delay: DelayModel,
}

/// Serialized form of a library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryRecord {
    /// Library name.
    pub name: String,
    /// Cell definitions in priority order.
    pub cells: Vec<CellRecord>,
}

/// A validated library cell.
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryCell {
    name: String,
    function: Pattern,
    inputs: Vec<String>,
    output: String,
    area: f64,
    delay: DelayModel,
}

impl LibraryCell {
    /// Validate a cell record.
    ///
    /// # Errors
    ///
    /// [`LibraryError::Pattern`] when the function does not parse, and
    /// [`LibraryError::InvalidCell`] for pin, area or delay problems.
    pub fn from_record(record: CellRecord) -> Result<Self, LibraryError> {
        let CellRecord {
            name,
            function,
            pins,
            area,
            delay,
        } = record;
        let pattern = Pattern::parse(&function).map_err(|e| LibraryError::Pattern {
            cell: name.clone(),
            pattern: function.clone(),
            message: e.to_string(),
        })?;
        if pattern.root_key().is_none() {
            return Err(LibraryError::invalid(&name, "function must contain an operator"));
        }

        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        for pin in pins {
            if inputs.contains(&pin.name) || outputs.contains(&pin.name) {
                return Err(LibraryError::invalid(&name, format!("pin '{}' declared twice", pin.name)));
            }
            match pin.direction {
                PinDirection::Input => inputs.push(pin.name),
                PinDirection::Output => outputs.push(pin.name),
            }
        }
        let [output] = <[String; 1]>::try_from(outputs)
            .map_err(|o| LibraryError::invalid(&name, format!("expected one output pin, found {}", o.len())))?;

        let used = pattern.pins();
        if let Some(pin) = used.iter().find(|p| !inputs.iter().any(|i| i == *p)) {
            return Err(LibraryError::invalid(&name, format!("pattern pin '{pin}' is not an input pin")));
        }
        if let Some(pin) = inputs.iter().find(|i| !used.contains(&i.as_str())) {
            return Err(LibraryError::invalid(&name, format!("input pin '{pin}' is unused by the function")));
        }

        if !(area.is_finite() && area > 0.0) {
            return Err(LibraryError::invalid(&name, format!("area must be positive, got {area}")));
        }
        match &delay {
            DelayModel::Scalar(d) => check_delay(&name, "*", *d)?,
            DelayModel::PerPin(table) => {
                for pin in &inputs {
                    let d = table
                        .get(pin)
                        .ok_or_else(|| LibraryError::invalid(&name, format!("no delay for input pin '{pin}'")))?;
                    check_delay(&name, pin, *d)?;
                }
                if let Some(extra) = table.keys().find(|k| !inputs.contains(k)) {
                    return Err(LibraryError::invalid(&name, format!("delay given for unknown pin '{extra}'")));
                }
            }
        }

        Ok(Self {
            name,
            function: pattern,
            inputs,
            output,
            area,
            delay,
        })
    }

    /// Cell name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Function pattern.
    #[must_use]
    pub const fn function(&self) -> &Pattern {
        &self.function
    }

    /// Input pins in declaration order; mapped instances list their fanins in
    /// this order.
    #[must_use]
    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    /// The output pin.
    #[must_use]
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Cell area.
    #[must_use]
    pub const fn area(&self) -> f64 {
        self.area
    }

    /// Delay from `pin` to the output; `None` for an unknown pin.
    #[must_use]
    pub fn delay(&self, pin: &str) -> Option<f64> {
        if !self.inputs.iter().any(|i| i == pin) {
            return None;
        }
        match &self.delay {
            DelayModel::Scalar(d) => Some(*d),
            DelayModel::PerPin(table) => table.get(pin).copied(),
        }
    }

    /// Delay model as declared.
    #[must_use]
    pub const fn delay_model(&self) -> &DelayModel {
        &self.delay
    }

    /// Back to the serialized form.
    #[must_use]
    pub fn to_record(&self) -> CellRecord {
        let pins = self
            .inputs
            .iter()
            .map(Pin::input)
            .chain(std::iter::once(Pin::output(self.output.clone())))
            .collect();
        CellRecord {
            name: self.name.clone(),
            function: self.function.to_string(),
            pins,
            area: self.area,
            delay: self.delay.clone(),
        }
    }
}

fn check_delay(cell: &str, pin: &str, delay: f64) -> Result<(), LibraryError> {
    if delay.is_finite() && delay >= 0.0 {
        Ok(())
    } else {
        Err(LibraryError::invalid(cell, format!("delay of pin '{pin}' must be non-negative, got {delay}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nand2() -> CellRecord {
        CellRecord {
            name: "NAND2_X1".into(),
            function: "NAND(A,B)".into(),
            pins: vec![Pin::input("A"), Pin::input("B"), Pin::output("Y")],
            area: 1.0,
            delay: DelayModel::PerPin(IndexMap::from([("A".to_string(), 0.8), ("B".to_string(), 0.9)])),
        }
    }

    #[test]
    fn valid_cell() {
        let cell = LibraryCell::from_record(nand2()).unwrap();
        assert_eq!(cell.inputs(), ["A", "B"]);
        assert_eq!(cell.output(), "Y");
        assert_eq!(cell.delay("B"), Some(0.9));
        assert_eq!(cell.delay("Y"), None);
        assert_eq!(cell.to_record(), nand2());
    }

    #[test]
    fn invalid_cells() {
        let mut r = nand2();
        r.pins.push(Pin::output("Z"));
        assert!(matches!(LibraryCell::from_record(r), Err(LibraryError::InvalidCell { .. })));

        let mut r = nand2();
        r.area = 0.0;
        assert!(LibraryCell::from_record(r).is_err());

        let mut r = nand2();
        r.delay = DelayModel::PerPin(IndexMap::from([("A".to_string(), 0.8)]));
        assert!(LibraryCell::from_record(r).is_err());

        let mut r = nand2();
        r.function = "NAND(A,C)".into();
        assert!(LibraryCell::from_record(r).is_err());

        let mut r = nand2();
        r.function = "NAND(A".into();
        assert!(matches!(LibraryCell::from_record(r), Err(LibraryError::Pattern { .. })));

        let mut r = nand2();
        r.function = "A".into();
        r.pins = vec![Pin::input("A"), Pin::output("Y")];
        assert!(LibraryCell::from_record(r).is_err());
    }
}
