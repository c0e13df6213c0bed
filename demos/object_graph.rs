//! Example: Archiving an Object Graph
//!
//! Builds a small org chart with shared managers, a reporting cycle and a base-typed slot,
//! writes it to an archive, and reads it back.
//!
//! Run with: `cargo run --example object_graph`

#![allow(clippy::uninlined_format_args)]

use graph_archive::config::LoggingConfig;
use graph_archive::utils::{global_metrics, init_logging};
use graph_archive::{
    decode, encode, ArchiveReader, ArchiveWriter, ObjectHandle, Record, Result, TypeRegistry,
};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Default)]
struct Employee {
    name: String,
    manager: Option<Rc<RefCell<Employee>>>,
    badge: Option<ObjectHandle>,
}

impl Record for Employee {
    fn type_name(&self) -> &'static str {
        "demo.employee"
    }

    fn encode(&self, w: &mut ArchiveWriter) -> Result<()> {
        w.write_str(&self.name)?;
        w.write(&self.manager)?;
        w.write(&self.badge)
    }

    fn decode(&mut self, r: &mut ArchiveReader) -> Result<()> {
        self.name = r.read_string()?;
        self.manager = r.read()?;
        self.badge = r.read()?;
        Ok(())
    }
}

#[derive(Default)]
struct KeyCard {
    floor: u8,
}

impl Record for KeyCard {
    fn type_name(&self) -> &'static str {
        "demo.keycard"
    }

    fn encode(&self, w: &mut ArchiveWriter) -> Result<()> {
        w.write_u8(self.floor)
    }

    fn decode(&mut self, r: &mut ArchiveReader) -> Result<()> {
        self.floor = r.read_u8()?;
        Ok(())
    }
}

fn employee(name: &str, manager: Option<&Rc<RefCell<Employee>>>) -> Rc<RefCell<Employee>> {
    Rc::new(RefCell::new(Employee {
        name: name.to_string(),
        manager: manager.cloned(),
        badge: None,
    }))
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    init_logging(&LoggingConfig::default())?;

    println!("=== Object Graph Archive Demo ===\n");

    let mut registry = TypeRegistry::new();
    registry.register::<Employee>()?;
    registry.register::<KeyCard>()?;
    let registry = registry.into_shared();

    let ceo = employee("ceo", None);
    // the CEO reports to themself
    ceo.borrow_mut().manager = Some(ceo.clone());
    ceo.borrow_mut().badge = Some(ObjectHandle::new(KeyCard { floor: 9 }));
    let staff = vec![
        ceo.clone(),
        employee("ana", Some(&ceo)),
        employee("ben", Some(&ceo)),
    ];

    let bytes = encode(&registry, &staff)?;
    println!("Archive size: {} bytes", bytes.len());
    println!("Hex (first 24): {:02X?}\n", &bytes[..bytes.len().min(24)]);

    let back: Vec<Rc<RefCell<Employee>>> = decode(&registry, bytes)?;
    for person in &back {
        let person = person.borrow();
        let manager = person
            .manager
            .as_ref()
            .map(|m| m.borrow().name.clone())
            .unwrap_or_default();
        println!("{:>4} reports to {}", person.name, manager);
    }

    let ana_manager = back[1].borrow().manager.clone();
    let shared = ana_manager.is_some_and(|m| Rc::ptr_eq(&m, &back[0]));
    println!("\nShared manager preserved: {}", if shared { "✓" } else { "✗" });

    let badge = back[0].borrow().badge.clone();
    if let Some(card) = badge.and_then(|b| b.downcast::<KeyCard>()) {
        println!("CEO key card floor: {}", card.borrow().floor);
    }

    // Break the reporting cycles so the graphs are freed
    ceo.borrow_mut().manager = None;
    back[0].borrow_mut().manager = None;

    global_metrics().log_metrics();
    Ok(())
}
