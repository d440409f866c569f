use std::fmt;

use crate::storage::{
    page_id::HeapPageID,
    schema::{Schema, Type},
};

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Bool(bool),
    Int64(i64),
    Float64(f64),
}

impl Cell {
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Cell::Bool(v) => vec![*v as u8],
            Cell::Int64(v) => v.to_be_bytes().to_vec(),
            Cell::Float64(v) => v.to_be_bytes().to_vec(),
        }
    }
}

#[derive(Clone, PartialEq)]
pub struct Tuple {
    cells: Vec<Cell>,
}

impl Tuple {
    pub fn new_from_cells(cells: &[Cell]) -> Self {
        Self {
            cells: cells.to_vec(),
        }
    }

    /// Decode one tuple from its fixed-size on-disk image. The slice must
    /// be exactly `schema.get_tuple_size()` bytes.
    pub fn from_bytes(bytes: &[u8], schema: &Schema) -> Self {
        let mut cells = Vec::new();
        let mut start = 0;
        for field in &schema.fields {
            let end = start + field.t.get_disk_size();
            let raw = &bytes[start..end];
            match field.t {
                Type::Bool => {
                    cells.push(Cell::Bool(raw[0] != 0));
                }
                Type::Int64 => {
                    let mut buf = [0u8; 8];
                    buf.copy_from_slice(raw);
                    cells.push(Cell::Int64(i64::from_be_bytes(buf)));
                }
                Type::Float64 => {
                    let mut buf = [0u8; 8];
                    buf.copy_from_slice(raw);
                    cells.push(Cell::Float64(f64::from_be_bytes(buf)));
                }
            }
            start = end;
        }
        Tuple { cells }
    }

    pub fn new_int_tuple(value: i64, width: usize) -> Self {
        let mut cells = Vec::new();
        for _ in 0..width {
            cells.push(Cell::Int64(value));
        }
        Tuple { cells }
    }

    pub fn get_cell(&self, i: usize) -> Cell {
        self.cells[i].clone()
    }

    pub fn get_cells(&self) -> Vec<Cell> {
        self.cells.clone()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        for cell in &self.cells {
            bytes.append(&mut cell.to_bytes());
        }
        bytes
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut content: String = "{".to_owned();
        for cell in &self.cells {
            content.push_str(&format!("{:?}, ", cell));
        }
        content.push('}');
        write!(f, "{}", content)
    }
}

impl fmt::Debug for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

/// A tuple together with the page and slot it lives in.
#[derive(Clone, PartialEq)]
pub struct WrappedTuple {
    internal: Tuple,
    slot_number: usize,
    pid: HeapPageID,
}

impl std::ops::Deref for WrappedTuple {
    type Target = Tuple;
    fn deref(&self) -> &Self::Target {
        &self.internal
    }
}

impl std::ops::DerefMut for WrappedTuple {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.internal
    }
}

impl WrappedTuple {
    pub fn new(internal: Tuple, slot_number: usize, pid: HeapPageID) -> WrappedTuple {
        WrappedTuple {
            internal,
            slot_number,
            pid,
        }
    }

    pub fn get_slot_number(&self) -> usize {
        self.slot_number
    }

    pub fn get_pid(&self) -> HeapPageID {
        self.pid
    }
}

impl fmt::Display for WrappedTuple {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} @ {}/{}", self.internal, self.pid, self.slot_number)
    }
}

impl fmt::Debug for WrappedTuple {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}
