// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason

//! Structured type layouts mirroring C structs and unions, and views over
//! native memory described by them.
//!
//! Field order and types must match the native declaration exactly. A layout
//! that disagrees with the library cannot be detected here; it silently reads
//! the wrong bytes.

use std::ffi::c_void;
use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;

use crate::abi::{AbiType, Value};
use crate::error::{Error, Mismatch, Result};
use crate::typed::TypedPointer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutKind {
	Struct,
	Union,
}

/// The type of one field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
	Scalar(AbiType),
	/// Another layout stored inline.
	Nested(Arc<StructLayout>),
	/// An address wrapped into a record of the target layout when read.
	TypedPointer(TypedPointer),
}

impl FieldType {
	pub fn size(&self) -> usize {
		match self {
			Self::Scalar(ty) => ty.size(),
			Self::Nested(layout) => layout.size(),
			Self::TypedPointer(_) => AbiType::Pointer.size(),
		}
	}

	pub fn align(&self) -> usize {
		match self {
			Self::Scalar(ty) => ty.align(),
			Self::Nested(layout) => layout.align(),
			Self::TypedPointer(_) => AbiType::Pointer.align(),
		}
	}

	fn describe(&self) -> String {
		match self {
			Self::Scalar(ty) => ty.to_string(),
			Self::Nested(layout) => format!("record `{}`", layout.name()),
			Self::TypedPointer(typed) => format!("pointer to `{}`", typed.target().name()),
		}
	}
}

impl From<AbiType> for FieldType {
	fn from(value: AbiType) -> Self {
		Self::Scalar(value)
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
	name: String,
	ty: FieldType,
	count: Option<usize>,
	offset: usize,
}

impl Field {
	#[inline]
	pub fn name(&self) -> &str {
		&self.name
	}

	#[inline]
	pub fn ty(&self) -> &FieldType {
		&self.ty
	}

	/// The fixed repetition count of an array field.
	#[inline]
	pub fn count(&self) -> Option<usize> {
		self.count
	}

	/// Byte offset from the start of the record.
	#[inline]
	pub fn offset(&self) -> usize {
		self.offset
	}

	#[inline]
	pub fn size(&self) -> usize {
		self.ty.size() * self.count.unwrap_or(1)
	}
}

/// A fixed-size memory layout of named, typed fields.
#[derive(Debug, Clone, PartialEq)]
pub struct StructLayout {
	name: String,
	kind: LayoutKind,
	fields: Vec<Field>,
	size: usize,
	align: usize,
}

impl StructLayout {
	/// Starts a C `struct` layout.
	///
	/// # Examples
	///
	/// ```rust
	/// use nicelink::{AbiType, StructLayout};
	///
	/// let version = StructLayout::build("Version")
	///     .field("major", AbiType::U8)
	///     .field("minor", AbiType::U8)
	///     .field("patch", AbiType::U8)
	///     .finish();
	/// assert_eq!(version.size(), 3);
	/// ```
	pub fn build(name: impl Into<String>) -> LayoutBuilder {
		LayoutBuilder::new(name.into(), LayoutKind::Struct)
	}

	/// Starts a C `union` layout; every field starts at offset zero.
	pub fn union(name: impl Into<String>) -> LayoutBuilder {
		LayoutBuilder::new(name.into(), LayoutKind::Union)
	}

	#[inline]
	pub fn name(&self) -> &str {
		&self.name
	}

	#[inline]
	pub fn kind(&self) -> LayoutKind {
		self.kind
	}

	#[inline]
	pub fn size(&self) -> usize {
		self.size
	}

	#[inline]
	pub fn align(&self) -> usize {
		self.align
	}

	#[inline]
	pub fn fields(&self) -> &[Field] {
		&self.fields
	}

	pub fn field(&self, name: &str) -> Option<&Field> {
		self.fields.iter().find(|field| field.name == name)
	}

	pub fn offset_of(&self, name: &str) -> Option<usize> {
		self.field(name).map(Field::offset)
	}

	fn require(&self, name: &str) -> Result<&Field> {
		self.field(name).ok_or_else(|| Error::UnknownField {
			layout: self.name.clone(),
			field: name.to_owned(),
		})
	}
}

/// Builds a [`StructLayout`] field by field, in declaration order.
#[derive(Debug)]
#[must_use]
pub struct LayoutBuilder {
	name: String,
	kind: LayoutKind,
	fields: Vec<(String, FieldType, Option<usize>)>,
}

impl LayoutBuilder {
	fn new(name: String, kind: LayoutKind) -> Self {
		Self {
			name,
			kind,
			fields: Vec::new(),
		}
	}

	pub fn field(mut self, name: impl Into<String>, ty: impl Into<FieldType>) -> Self {
		self.fields.push((name.into(), ty.into(), None));
		self
	}

	/// A fixed-size array of `count` elements.
	pub fn array(mut self, name: impl Into<String>, ty: impl Into<FieldType>, count: usize) -> Self {
		self.fields.push((name.into(), ty.into(), Some(count)));
		self
	}

	pub fn nested(self, name: impl Into<String>, layout: &Arc<StructLayout>) -> Self {
		self.field(name, FieldType::Nested(Arc::clone(layout)))
	}

	pub fn nested_array(self, name: impl Into<String>, layout: &Arc<StructLayout>, count: usize) -> Self {
		self.array(name, FieldType::Nested(Arc::clone(layout)), count)
	}

	pub fn typed_pointer(self, name: impl Into<String>, typed: TypedPointer) -> Self {
		self.field(name, FieldType::TypedPointer(typed))
	}

	/// Computes C offsets, alignment and size.
	pub fn finish(self) -> Arc<StructLayout> {
		let mut fields = Vec::with_capacity(self.fields.len());
		let mut end = 0;
		let mut align = 1;
		for (name, ty, count) in self.fields {
			let field_align = ty.align();
			let offset = match self.kind {
				LayoutKind::Struct => align_up(end, field_align),
				LayoutKind::Union => 0,
			};
			let field = Field {
				name,
				ty,
				count,
				offset,
			};
			end = end.max(offset + field.size());
			align = align.max(field_align);
			fields.push(field);
		}
		Arc::new(StructLayout {
			name: self.name,
			kind: self.kind,
			fields,
			size: align_up(end, align),
			align,
		})
	}
}

#[inline]
const fn align_up(offset: usize, align: usize) -> usize {
	(offset + align - 1) / align * align
}

/// A view of native memory through a [`StructLayout`].
///
/// A `Record` does not own the memory it reads; it is only as valid as the
/// address it was built from.
#[derive(Clone, PartialEq)]
pub struct Record {
	layout: Arc<StructLayout>,
	base: NonNull<u8>,
}

impl Record {
	/// Interprets `addr` as the base of a record with `layout`.
	///
	/// # Safety
	/// `addr` must point to memory laid out as `layout` that outlives every
	/// read or write through this record and its clones.
	#[inline]
	pub unsafe fn from_raw(layout: Arc<StructLayout>, addr: NonNull<c_void>) -> Self {
		Self {
			layout,
			base: addr.cast(),
		}
	}

	#[inline]
	pub fn layout(&self) -> &Arc<StructLayout> {
		&self.layout
	}

	#[inline]
	pub fn as_ptr(&self) -> *mut c_void {
		self.base.as_ptr().cast()
	}

	/// Reads `name`.
	///
	/// Nested layouts come back as [`Value::Record`] views into the same memory,
	/// arrays as [`Value::Array`], typed pointers wrapped per their rule.
	pub fn get(&self, name: &str) -> Result<Value> {
		let field = self.layout.require(name)?;
		unsafe { read_field(field, self.base.as_ptr().add(field.offset)) }
	}

	/// Reads every field, in declaration order.
	pub fn values(&self) -> Result<Vec<(String, Value)>> {
		self.layout
			.fields
			.iter()
			.map(|field| {
				let value = unsafe { read_field(field, self.base.as_ptr().add(field.offset))? };
				Ok((field.name.clone(), value))
			})
			.collect()
	}

	/// Writes a scalar field, or every element of a scalar array field.
	///
	/// # Errors
	/// [`Error::UnknownField`], or [`Error::TypeMismatch`] if `value` doesn't
	/// fit the field. Strings can't be stored; pass a [`Value::Pointer`] that
	/// outlives the record instead.
	pub fn set(&mut self, name: &str, value: &Value) -> Result<()> {
		let field = self.layout.require(name)?;
		let mismatch = || {
			Error::mismatch(
				self.layout.name(),
				Mismatch::Field {
					field: field.name.clone(),
					expected: field.ty.describe(),
					found: value.kind(),
				},
			)
		};
		let FieldType::Scalar(ty) = field.ty else {
			return Err(mismatch());
		};
		let addr = unsafe { self.base.as_ptr().add(field.offset) };
		match (field.count, value) {
			(None, value) => {
				if !unsafe { write_scalar(ty, addr, value) } {
					return Err(mismatch());
				}
			}
			(Some(count), Value::Array(items)) if items.len() == count => {
				if !items.iter().all(|item| storable(ty, item)) {
					return Err(mismatch());
				}
				for (index, item) in items.iter().enumerate() {
					unsafe { write_scalar(ty, addr.add(index * ty.size()), item) };
				}
			}
			_ => return Err(mismatch()),
		}
		Ok(())
	}
}

impl fmt::Debug for Record {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Record")
			.field("layout", &self.layout.name)
			.field("base", &self.base)
			.finish()
	}
}

unsafe fn read_field(field: &Field, addr: *mut u8) -> Result<Value> {
	match field.count {
		None => read_one(&field.ty, &field.name, addr),
		Some(count) => (0..count)
			.map(|index| read_one(&field.ty, &field.name, addr.add(index * field.ty.size())))
			.collect::<Result<Vec<_>>>()
			.map(Value::Array),
	}
}

unsafe fn read_one(ty: &FieldType, name: &str, addr: *mut u8) -> Result<Value> {
	match ty {
		FieldType::Scalar(ty) => Ok(ty.read(addr)),
		FieldType::Nested(layout) => Ok(Value::Record(Record {
			layout: Arc::clone(layout),
			base: NonNull::new_unchecked(addr),
		})),
		FieldType::TypedPointer(typed) => {
			let target = addr.cast::<*mut c_void>().read_unaligned();
			typed.wrap(target, name)
		}
	}
}

// Strings have no address that outlives the call, so only pointers go into `CStr` fields.
fn storable(ty: AbiType, value: &Value) -> bool {
	match value {
		Value::Pointer(_) => matches!(ty, AbiType::Pointer | AbiType::CStr),
		Value::Void | Value::Str(_) => false,
		value => value.abi_type() == Some(ty),
	}
}

// Returns `false` without writing if `value` isn't storable as a `ty`.
unsafe fn write_scalar(ty: AbiType, addr: *mut u8, value: &Value) -> bool {
	if !storable(ty, value) {
		return false;
	}
	match (ty, value) {
		(AbiType::I8, Value::I8(v)) => addr.cast::<i8>().write_unaligned(*v),
		(AbiType::U8, Value::U8(v)) => addr.write_unaligned(*v),
		(AbiType::I16, Value::I16(v)) => addr.cast::<i16>().write_unaligned(*v),
		(AbiType::U16, Value::U16(v)) => addr.cast::<u16>().write_unaligned(*v),
		(AbiType::I32, Value::I32(v)) => addr.cast::<i32>().write_unaligned(*v),
		(AbiType::U32, Value::U32(v)) => addr.cast::<u32>().write_unaligned(*v),
		(AbiType::I64, Value::I64(v)) => addr.cast::<i64>().write_unaligned(*v),
		(AbiType::U64, Value::U64(v)) => addr.cast::<u64>().write_unaligned(*v),
		(AbiType::F32, Value::F32(v)) => addr.cast::<f32>().write_unaligned(*v),
		(AbiType::F64, Value::F64(v)) => addr.cast::<f64>().write_unaligned(*v),
		(AbiType::Pointer | AbiType::CStr, Value::Pointer(v)) => {
			addr.cast::<*mut c_void>().write_unaligned(*v)
		}
		_ => return false,
	}
	true
}

/// Zeroed, owned memory for one record, e.g. an out-parameter.
#[derive(Debug)]
pub struct RecordBuf {
	layout: Arc<StructLayout>,
	// `u64` words keep every scalar type aligned.
	storage: NonNull<[u64]>,
}

impl RecordBuf {
	pub fn new(layout: Arc<StructLayout>) -> Self {
		let words = layout.size().div_ceil(8).max(1);
		let storage = Box::into_raw(vec![0u64; words].into_boxed_slice());
		Self {
			layout,
			// `Box::into_raw` never returns null.
			storage: unsafe { NonNull::new_unchecked(storage) },
		}
	}

	#[inline]
	pub fn layout(&self) -> &Arc<StructLayout> {
		&self.layout
	}

	/// The buffer's address, to hand to a native call.
	#[inline]
	pub fn as_ptr(&self) -> *mut c_void {
		self.storage.as_ptr().cast()
	}

	/// A view over this buffer.
	///
	/// # Safety
	/// The record must not be used after the buffer is dropped.
	#[inline]
	pub unsafe fn record(&self) -> Record {
		Record::from_raw(Arc::clone(&self.layout), self.storage.cast())
	}

	pub fn get(&self, name: &str) -> Result<Value> {
		unsafe { self.record() }.get(name)
	}

	pub fn set(&mut self, name: &str, value: &Value) -> Result<()> {
		unsafe { self.record() }.set(name, value)
	}
}

impl Drop for RecordBuf {
	fn drop(&mut self) {
		unsafe { drop(Box::from_raw(self.storage.as_ptr())) }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[allow(dead_code)]
	#[repr(C)]
	struct Rect {
		x: i16,
		y: i16,
		w: u16,
		h: u16,
	}

	#[allow(dead_code)]
	#[repr(C)]
	struct Cursor {
		area: Rect,
		hot_x: i16,
		hot_y: i16,
		data: *mut u8,
		mask: *mut u8,
		save: [*mut u8; 2],
		wm_cursor: *mut c_void,
	}

	fn rect() -> Arc<StructLayout> {
		StructLayout::build("Rect")
			.field("x", AbiType::I16)
			.field("y", AbiType::I16)
			.field("w", AbiType::U16)
			.field("h", AbiType::U16)
			.finish()
	}

	#[test]
	fn offsets_match_repr_c() {
		let cursor = StructLayout::build("Cursor")
			.nested("area", &rect())
			.field("hot_x", AbiType::I16)
			.field("hot_y", AbiType::I16)
			.field("data", AbiType::Pointer)
			.field("mask", AbiType::Pointer)
			.array("save", AbiType::Pointer, 2)
			.field("wm_cursor", AbiType::Pointer)
			.finish();
		assert_eq!(cursor.size(), std::mem::size_of::<Cursor>());
		assert_eq!(cursor.align(), std::mem::align_of::<Cursor>());
		assert_eq!(cursor.offset_of("hot_y"), Some(std::mem::offset_of!(Cursor, hot_y)));
		assert_eq!(cursor.offset_of("data"), Some(std::mem::offset_of!(Cursor, data)));
		assert_eq!(cursor.offset_of("save"), Some(std::mem::offset_of!(Cursor, save)));
		assert_eq!(
			cursor.offset_of("wm_cursor"),
			Some(std::mem::offset_of!(Cursor, wm_cursor))
		);
	}

	#[test]
	fn unions_overlap() {
		let event = StructLayout::union("Event")
			.field("type", AbiType::U8)
			.nested("rect", &rect())
			.field("wide", AbiType::U64)
			.finish();
		assert!(event.fields().iter().all(|field| field.offset() == 0));
		assert_eq!(event.size(), 8);
		assert_eq!(event.kind(), LayoutKind::Union);
	}

	#[test]
	fn trailing_padding() {
		let layout = StructLayout::build("Padded")
			.field("wide", AbiType::U32)
			.field("narrow", AbiType::U8)
			.finish();
		assert_eq!(layout.size(), 8);
	}

	#[test]
	fn empty_layout() {
		let layout = StructLayout::build("Empty").finish();
		assert_eq!(layout.size(), 0);
		assert_eq!(layout.align(), 1);
		let buf = RecordBuf::new(layout);
		assert!(!buf.as_ptr().is_null());
	}
}
