//! Batched page copy from one source document.
//!
//! Copying a page means copying its dictionary and everything it reaches:
//! content streams, resources, fonts, annotations. Object ids are remapped
//! into a range reserved by the caller so that batches for different source
//! files can run concurrently and still be merged without collisions.
//!
//! The walk never climbs the source page tree. `/Parent` of a copied page is
//! dropped (the assembler re-parents it) and references to page objects that
//! are not part of the batch, or to page tree nodes, become `null`.
//! References between pages of the same batch, such as link annotations
//! targeting another copied page, are remapped and keep working.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::{Result, SessionError};

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against malformed, cyclic page trees.
const MAX_TREE_DEPTH: usize = 64;

/// Objects produced by one batch.
#[derive(Debug, Clone, Default)]
pub struct CopiedPages {
    /// Copied objects under their new ids.
    pub objects: BTreeMap<ObjectId, Object>,

    /// New page object ids, index-aligned with the requested page indices.
    pub page_ids: Vec<ObjectId>,
}

impl CopiedPages {
    /// Highest object number used by this batch.
    pub fn max_object_number(&self) -> u32 {
        self.objects.keys().map(|(number, _)| *number).max().unwrap_or(0)
    }
}

/// Copies pages out of a source document.
pub struct PageCopier;

impl PageCopier {
    /// Number of object ids a batch from `source` may consume at most.
    pub fn id_budget(source: &Document) -> u32 {
        u32::try_from(source.objects.len()).unwrap_or(u32::MAX)
    }

    /// Copy the pages at `page_indices` (zero-based) out of `source`.
    ///
    /// New object numbers start at `first_id` and stay below
    /// `first_id + PageCopier::id_budget(source)`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Assembly`] if an index does not exist or a
    /// page object is missing or malformed.
    pub fn copy_pages(
        source: &Document,
        page_indices: &[usize],
        first_id: u32,
    ) -> Result<CopiedPages> {
        let all_pages: Vec<ObjectId> = source.get_pages().into_values().collect();

        let requested = page_indices
            .iter()
            .map(|&index| {
                all_pages.get(index).copied().ok_or_else(|| {
                    SessionError::assembly(format!(
                        "Page index {index} does not exist (document has {} page(s))",
                        all_pages.len()
                    ))
                })
            })
            .collect::<Result<Vec<ObjectId>>>()?;

        let mut walk = CopyWalk::new(source, &requested, first_id);
        for &page_id in &requested {
            walk.allocate(page_id);
        }
        walk.run()?;

        let page_ids = requested
            .iter()
            .map(|old| {
                walk.id_map
                    .get(old)
                    .copied()
                    .ok_or_else(|| SessionError::assembly(format!("Page {old:?} was not copied")))
            })
            .collect::<Result<Vec<ObjectId>>>()?;

        Ok(CopiedPages {
            objects: walk.copied,
            page_ids,
        })
    }
}

struct CopyWalk<'a> {
    source: &'a Document,
    pages: HashSet<ObjectId>,
    id_map: HashMap<ObjectId, ObjectId>,
    queue: VecDeque<ObjectId>,
    copied: BTreeMap<ObjectId, Object>,
    next_id: u32,
}

impl<'a> CopyWalk<'a> {
    fn new(source: &'a Document, pages: &[ObjectId], first_id: u32) -> Self {
        Self {
            source,
            pages: pages.iter().copied().collect(),
            id_map: HashMap::new(),
            queue: VecDeque::new(),
            copied: BTreeMap::new(),
            next_id: first_id,
        }
    }

    fn allocate(&mut self, old: ObjectId) -> ObjectId {
        if let Some(&new) = self.id_map.get(&old) {
            return new;
        }
        let new = (self.next_id, 0);
        self.next_id += 1;
        self.id_map.insert(old, new);
        self.queue.push_back(old);
        new
    }

    fn run(&mut self) -> Result<()> {
        while let Some(old) = self.queue.pop_front() {
            let mut object = self
                .source
                .get_object(old)
                .map_err(|e| SessionError::assembly(format!("Object {old:?} unreadable: {e}")))?
                .clone();

            if self.pages.contains(&old) {
                let Object::Dictionary(page) = &mut object else {
                    return Err(SessionError::assembly(format!(
                        "Page object {old:?} is not a dictionary"
                    )));
                };
                self.materialize_inherited(page);
                page.remove(b"Parent");
            }

            let mut references = Vec::new();
            collect_references(&object, &mut references);
            for reference in references {
                if self.should_follow(reference) {
                    self.allocate(reference);
                }
            }

            remap_references(&mut object, &self.id_map);
            self.copied.insert(self.id_map[&old], object);
        }

        Ok(())
    }

    fn should_follow(&self, reference: ObjectId) -> bool {
        if self.id_map.contains_key(&reference) {
            return false;
        }
        match self.source.get_object(reference) {
            Ok(object) => match object_type(object) {
                Some(b"Page") => self.pages.contains(&reference),
                Some(b"Pages") => false,
                _ => true,
            },
            Err(_) => false,
        }
    }

    fn materialize_inherited(&self, page: &mut Dictionary) {
        let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
        let mut depth = 0;

        while let Some(parent_id) = parent {
            if depth >= MAX_TREE_DEPTH {
                break;
            }
            depth += 1;

            let Ok(node) = self.source.get_dictionary(parent_id) else {
                break;
            };

            for key in INHERITABLE_KEYS {
                if !page.has(key)
                    && let Ok(value) = node.get(key)
                {
                    page.set(key.to_vec(), value.clone());
                }
            }

            parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        }
    }
}

/// The `/Type` name of a dictionary or stream, if any.
pub(crate) fn object_type(object: &Object) -> Option<&[u8]> {
    let dict = match object {
        Object::Dictionary(dict) => dict,
        Object::Stream(stream) => &stream.dict,
        _ => return None,
    };
    dict.get(b"Type").and_then(Object::as_name).ok()
}

fn collect_references(object: &Object, out: &mut Vec<ObjectId>) {
    match object {
        Object::Reference(id) => out.push(*id),
        Object::Array(items) => items.iter().for_each(|item| collect_references(item, out)),
        Object::Dictionary(dict) => dict
            .iter()
            .for_each(|(_, value)| collect_references(value, out)),
        Object::Stream(stream) => stream
            .dict
            .iter()
            .for_each(|(_, value)| collect_references(value, out)),
        _ => {}
    }
}

fn remap_references(object: &mut Object, id_map: &HashMap<ObjectId, ObjectId>) {
    match object {
        Object::Reference(id) => {
            *object = match id_map.get(id) {
                Some(&new) => Object::Reference(new),
                None => Object::Null,
            };
        }
        Object::Array(items) => items
            .iter_mut()
            .for_each(|item| remap_references(item, id_map)),
        Object::Dictionary(dict) => dict
            .iter_mut()
            .for_each(|(_, value)| remap_references(value, id_map)),
        Object::Stream(stream) => stream
            .dict
            .iter_mut()
            .for_each(|(_, value)| remap_references(value, id_map)),
        _ => {}
    }
}
