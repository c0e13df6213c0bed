//! Record types shared by the integration tests

#![allow(dead_code)]

use graph_archive::{ArchiveReader, ArchiveWriter, ObjectHandle, Record, Result, TypeRegistry};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

/// Singly linked node; `next` may point anywhere, including back at itself
#[derive(Debug, Default)]
pub struct Node {
    pub label: String,
    pub next: Option<Rc<RefCell<Node>>>,
}

impl Node {
    pub fn shared(label: &str) -> Rc<RefCell<Node>> {
        Rc::new(RefCell::new(Node {
            label: label.to_string(),
            next: None,
        }))
    }
}

impl Record for Node {
    fn type_name(&self) -> &'static str {
        "test.node"
    }

    fn encode(&self, w: &mut ArchiveWriter) -> Result<()> {
        w.write_str(&self.label)?;
        w.write(&self.next)
    }

    fn decode(&mut self, r: &mut ArchiveReader) -> Result<()> {
        self.label = r.read_string()?;
        self.next = r.read()?;
        Ok(())
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct Circle {
    pub radius: f64,
}

impl Record for Circle {
    fn type_name(&self) -> &'static str {
        "shape.circle"
    }

    fn encode(&self, w: &mut ArchiveWriter) -> Result<()> {
        w.write_f64(self.radius)
    }

    fn decode(&mut self, r: &mut ArchiveReader) -> Result<()> {
        self.radius = r.read_f64()?;
        Ok(())
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct Square {
    pub side: u32,
    pub label: String,
}

impl Record for Square {
    fn type_name(&self) -> &'static str {
        "shape.square"
    }

    fn encode(&self, w: &mut ArchiveWriter) -> Result<()> {
        w.write_u32(self.side)?;
        w.write_str(&self.label)
    }

    fn decode(&mut self, r: &mut ArchiveReader) -> Result<()> {
        self.side = r.read_u32()?;
        self.label = r.read_string()?;
        Ok(())
    }
}

/// Holds base-typed slots only
#[derive(Default)]
pub struct Canvas {
    pub shapes: Vec<ObjectHandle>,
    pub focus: Option<ObjectHandle>,
}

impl Record for Canvas {
    fn type_name(&self) -> &'static str {
        "shape.canvas"
    }

    fn encode(&self, w: &mut ArchiveWriter) -> Result<()> {
        w.write(&self.shapes)?;
        w.write(&self.focus)
    }

    fn decode(&mut self, r: &mut ArchiveReader) -> Result<()> {
        self.shapes = r.read()?;
        self.focus = r.read()?;
        Ok(())
    }
}

pub fn shape_registry() -> Arc<TypeRegistry> {
    let mut registry = TypeRegistry::new();
    registry.register::<Circle>().expect("circle");
    registry.register::<Square>().expect("square");
    registry.register::<Canvas>().expect("canvas");
    registry.into_shared()
}

pub fn empty_registry() -> Arc<TypeRegistry> {
    TypeRegistry::new().into_shared()
}

/// Break `next` links so reference cycles built by a test are freed
pub fn unlink(nodes: &[Rc<RefCell<Node>>]) {
    for node in nodes {
        node.borrow_mut().next = None;
    }
}
