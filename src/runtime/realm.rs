//! Intrinsic objects of the single realm

use crate::gc::{Heap, ObjectRef};
use crate::runtime::object::JsObject;
use crate::vm::ErrorKind;

/// Prototypes and the global object
///
/// Allocated empty here; `builtins::install` fills them in.
#[derive(Debug, Clone, Copy)]
pub struct Realm {
    pub global: ObjectRef,
    pub object_proto: ObjectRef,
    pub function_proto: ObjectRef,
    pub array_proto: ObjectRef,
    pub string_proto: ObjectRef,
    pub number_proto: ObjectRef,
    pub boolean_proto: ObjectRef,
    pub regexp_proto: ObjectRef,
    pub error_proto: ObjectRef,
    pub type_error_proto: ObjectRef,
    pub reference_error_proto: ObjectRef,
    pub syntax_error_proto: ObjectRef,
    pub range_error_proto: ObjectRef,
}

impl Realm {
    pub fn new(heap: &mut Heap) -> Self {
        let object_proto = heap.alloc(JsObject::ordinary(None));
        let mut derived = || heap.alloc(JsObject::ordinary(Some(object_proto)));
        let global = derived();
        let function_proto = derived();
        let array_proto = derived();
        let string_proto = derived();
        let number_proto = derived();
        let boolean_proto = derived();
        let regexp_proto = derived();
        let error_proto = derived();
        let mut error_subclass = || heap.alloc(JsObject::ordinary(Some(error_proto)));
        let realm = Realm {
            global,
            object_proto,
            function_proto,
            array_proto,
            string_proto,
            number_proto,
            boolean_proto,
            regexp_proto,
            error_proto,
            type_error_proto: error_subclass(),
            reference_error_proto: error_subclass(),
            syntax_error_proto: error_subclass(),
            range_error_proto: error_subclass(),
        };
        heap.set_roots(realm.roots());
        realm
    }

    pub fn error_proto(&self, kind: ErrorKind) -> ObjectRef {
        match kind {
            ErrorKind::Error => self.error_proto,
            ErrorKind::TypeError => self.type_error_proto,
            ErrorKind::ReferenceError => self.reference_error_proto,
            ErrorKind::SyntaxError => self.syntax_error_proto,
            ErrorKind::RangeError => self.range_error_proto,
        }
    }

    /// Everything reachable from script without a handle
    pub fn roots(&self) -> Vec<ObjectRef> {
        vec![
            self.global,
            self.object_proto,
            self.function_proto,
            self.array_proto,
            self.string_proto,
            self.number_proto,
            self.boolean_proto,
            self.regexp_proto,
            self.error_proto,
            self.type_error_proto,
            self.reference_error_proto,
            self.syntax_error_proto,
            self.range_error_proto,
        ]
    }
}
