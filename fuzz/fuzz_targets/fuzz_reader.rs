#![no_main]

use graph_archive::{ArchiveReader, ObjectHandle, Record, TypeRegistry};
use libfuzzer_sys::fuzz_target;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Default)]
struct Node {
    value: i64,
    children: Vec<Rc<RefCell<Node>>>,
    peer: Option<ObjectHandle>,
}

impl Record for Node {
    fn type_name(&self) -> &'static str {
        "fuzz.node"
    }

    fn encode(&self, w: &mut graph_archive::ArchiveWriter) -> graph_archive::Result<()> {
        w.write_i64(self.value)?;
        w.write(&self.children)?;
        w.write(&self.peer)
    }

    fn decode(&mut self, r: &mut ArchiveReader) -> graph_archive::Result<()> {
        self.value = r.read_i64()?;
        self.children = r.read()?;
        self.peer = r.read()?;
        Ok(())
    }
}

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must produce an error, never a panic or a hang
    let mut registry = TypeRegistry::new();
    if registry.register::<Node>().is_err() || registry.register::<String>().is_err() {
        return;
    }
    let registry = registry.into_shared();

    if let Ok(mut reader) = ArchiveReader::open(data.to_vec(), registry) {
        let _ = reader.read_optional_object::<Node>();
        let _ = reader.read_identity::<Node>(0);
    }
});
