//! Arena of type-tagged memory cells.
//!
//! Every string, array and record lives in exactly one cell and is owned by
//! exactly one slot: a variable, an array element or a record member. Plain
//! ints are stored inline and never get a cell. Handle `0` is the null
//! pointer; handles are handed out in increasing order and never reused.

use std::collections::BTreeMap;

use super::error::RuntimeError;
use crate::program::{Program, Type};

/// Cell handle as stored in int slots
pub type Ptr = i32;

pub const NULL: Ptr = 0;

#[derive(Debug, Clone, PartialEq)]
pub enum PageData {
    Text(String),
    Slots(Vec<i32>), // ints by value, everything else by handle
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemPage {
    pub ty: Type,
    pub data: PageData,
}

pub struct Heap<'p> {
    program: &'p Program,
    pages: BTreeMap<Ptr, MemPage>,
    next: Ptr,
    max_cells: usize,
}

impl<'p> Heap<'p> {
    pub fn new(program: &'p Program, max_cells: usize) -> Self {
        Self {
            program,
            pages: BTreeMap::new(),
            next: 1,
            max_cells,
        }
    }

    /// Number of live cells
    pub fn live(&self) -> usize {
        self.pages.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Ptr, &MemPage)> {
        self.pages.iter().map(|(ptr, page)| (*ptr, page))
    }

    // Children are allocated before their parent, so a refused parent
    // releases them here.
    fn alloc(&mut self, ty: Type, data: PageData) -> Result<Ptr, RuntimeError> {
        if self.pages.len() >= self.max_cells || self.next == Ptr::MAX {
            if let PageData::Slots(slots) = &data {
                let owned = self.owned_flags(&ty, slots.len());
                self.discard(slots, &owned);
            }
            return Err(RuntimeError::HeapLimitExceeded(self.max_cells));
        }
        let ptr = self.next;
        self.next += 1;
        log::trace!("alloc cell {} ({} live)", ptr, self.pages.len() + 1);
        self.pages.insert(ptr, MemPage { ty, data });
        Ok(ptr)
    }

    pub fn page(&self, ptr: Ptr, op: &'static str) -> Result<&MemPage, RuntimeError> {
        if ptr == NULL {
            return Err(RuntimeError::NullPointer { op });
        }
        self.pages
            .get(&ptr)
            .ok_or(RuntimeError::InvalidPointer { ptr, op })
    }

    fn page_mut(&mut self, ptr: Ptr, op: &'static str) -> Result<&mut MemPage, RuntimeError> {
        if ptr == NULL {
            return Err(RuntimeError::NullPointer { op });
        }
        self.pages
            .get_mut(&ptr)
            .ok_or(RuntimeError::InvalidPointer { ptr, op })
    }

    pub fn text(&self, ptr: Ptr) -> Result<&str, RuntimeError> {
        match &self.page(ptr, "text")?.data {
            PageData::Text(s) => Ok(s),
            PageData::Slots(_) => Err(RuntimeError::TypeMismatch { ptr, op: "text" }),
        }
    }

    pub fn slots(&self, ptr: Ptr) -> Result<&[i32], RuntimeError> {
        match &self.page(ptr, "slots")?.data {
            PageData::Slots(slots) => Ok(slots),
            PageData::Text(_) => Err(RuntimeError::TypeMismatch { ptr, op: "slots" }),
        }
    }

    pub fn slots_mut(&mut self, ptr: Ptr) -> Result<&mut Vec<i32>, RuntimeError> {
        match &mut self.page_mut(ptr, "slots")?.data {
            PageData::Slots(slots) => Ok(slots),
            PageData::Text(_) => Err(RuntimeError::TypeMismatch { ptr, op: "slots" }),
        }
    }

    /// Default-construct a value. Ints have no cell and yield `0`.
    pub fn make(&mut self, ty: &Type) -> Result<Ptr, RuntimeError> {
        match ty {
            Type::Int => Ok(NULL),
            _ => {
                let data = self.default_data(ty)?;
                self.alloc(ty.clone(), data)
            }
        }
    }

    fn default_data(&mut self, ty: &Type) -> Result<PageData, RuntimeError> {
        let program = self.program;
        Ok(match ty {
            Type::String => PageData::Text(String::new()),
            Type::Record(id) => {
                let members = &program.record(*id).members;
                let mut slots = Vec::with_capacity(members.len());
                for member in members {
                    match self.make(&member.ty) {
                        Ok(ptr) => slots.push(ptr),
                        Err(e) => {
                            let owned = vec![true; slots.len()];
                            self.discard(&slots, &owned);
                            return Err(e);
                        }
                    }
                }
                PageData::Slots(slots)
            }
            Type::Int | Type::Array(_) => PageData::Slots(Vec::new()),
        })
    }

    pub fn make_str(&mut self, value: String) -> Result<Ptr, RuntimeError> {
        self.alloc(Type::String, PageData::Text(value))
    }

    /// Deep copy into a fresh cell
    pub fn clone(&mut self, src: Ptr) -> Result<Ptr, RuntimeError> {
        let ty = self.page(src, "clone")?.ty.clone();
        let data = crate::grow(|| self.copy_data(src))?;
        self.alloc(ty, data)
    }

    /// Deep copy into an existing cell, keeping its handle. The copy is taken
    /// before the old children are released, so `src` may live below `dst`.
    pub fn cloneto(&mut self, src: Ptr, dst: Ptr) -> Result<(), RuntimeError> {
        if src == dst {
            return Ok(());
        }
        let data = self.copy_data(src)?;
        self.unmake(dst)?;
        self.page_mut(dst, "cloneto")?.data = data;
        Ok(())
    }

    /// Replace the bytes of a string cell
    pub fn clonestr(&mut self, value: String, dst: Ptr) -> Result<(), RuntimeError> {
        let page = self.page_mut(dst, "clonestr")?;
        match page.data {
            PageData::Text(_) => {
                page.data = PageData::Text(value);
                Ok(())
            }
            PageData::Slots(_) => Err(RuntimeError::TypeMismatch {
                ptr: dst,
                op: "clonestr",
            }),
        }
    }

    fn copy_data(&mut self, src: Ptr) -> Result<PageData, RuntimeError> {
        let page = self.page(src, "clone")?;
        let data = page.data.clone();
        let ty = page.ty.clone();

        match data {
            PageData::Text(s) => Ok(PageData::Text(s)),
            PageData::Slots(mut slots) => {
                let owned = self.owned_flags(&ty, slots.len());
                for i in 0..slots.len() {
                    if !owned[i] {
                        continue;
                    }
                    match self.clone(slots[i]) {
                        Ok(copy) => slots[i] = copy,
                        Err(e) => {
                            self.discard(&slots[..i], &owned[..i]);
                            return Err(e);
                        }
                    }
                }
                Ok(PageData::Slots(slots))
            }
        }
    }

    // Best effort: the allocation error is what gets reported
    fn discard(&mut self, slots: &[i32], owned: &[bool]) {
        for (&slot, &owns) in slots.iter().zip(owned) {
            if owns && slot != NULL {
                let _ = self.destroy(slot);
            }
        }
    }

    /// Which slots of a cell of type `ty` hold owned child handles
    fn owned_flags(&self, ty: &Type, len: usize) -> Vec<bool> {
        match ty {
            Type::Array(elem) => vec![elem.is_heap(); len],
            Type::Record(id) => self
                .program
                .record(*id)
                .members
                .iter()
                .map(|m| m.ty.is_heap())
                .collect(),
            Type::Int | Type::String => vec![false; len],
        }
    }

    /// Handles directly owned by a cell
    pub fn children(&self, ptr: Ptr) -> Result<Vec<Ptr>, RuntimeError> {
        let page = self.page(ptr, "children")?;
        Ok(match &page.data {
            PageData::Slots(slots) => slots
                .iter()
                .zip(self.owned_flags(&page.ty, slots.len()))
                .filter(|(slot, owns)| *owns && **slot != NULL)
                .map(|(slot, _)| *slot)
                .collect(),
            PageData::Text(_) => Vec::new(),
        })
    }

    /// Destroy every owned child and leave the cell empty
    pub fn unmake(&mut self, ptr: Ptr) -> Result<(), RuntimeError> {
        for child in self.children(ptr)? {
            self.destroy(child)?;
        }
        let page = self.page_mut(ptr, "unmake")?;
        page.data = match page.data {
            PageData::Text(_) => PageData::Text(String::new()),
            PageData::Slots(_) => PageData::Slots(Vec::new()),
        };
        Ok(())
    }

    pub fn destroy(&mut self, ptr: Ptr) -> Result<(), RuntimeError> {
        crate::grow(|| self.unmake(ptr))?;
        self.pages.remove(&ptr);
        log::trace!("free cell {}", ptr);
        Ok(())
    }

    /// Reset a cell to the default value of its type, keeping its handle
    pub fn unmake_default(&mut self, ptr: Ptr) -> Result<(), RuntimeError> {
        self.unmake(ptr)?;
        let ty = self.page(ptr, "default")?.ty.clone();
        let data = self.default_data(&ty)?;
        self.page_mut(ptr, "default")?.data = data;
        Ok(())
    }
}
