// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason

//! ABI types, dynamically typed values, and the function pointer signatures
//! the dispatch table can call.

use std::ffi::{c_char, c_long, c_ulong, c_void, CStr, CString};
use std::{fmt, mem, ptr};

use crate::error::Mismatch;
use crate::layout::Record;
use crate::Symbol;

/// A primitive C ABI type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbiType {
	Void,
	I8,
	U8,
	I16,
	U16,
	I32,
	U32,
	I64,
	U64,
	F32,
	F64,
	Pointer,
	/// A nul-terminated string, `const char *`.
	CStr,
}

impl AbiType {
	/// C `long`, 32 or 64 bits depending on the target.
	pub const LONG: Self = Self::signed(mem::size_of::<c_long>());
	/// C `unsigned long`.
	pub const ULONG: Self = Self::unsigned(mem::size_of::<c_ulong>());
	/// C `size_t`.
	pub const SIZE: Self = Self::unsigned(mem::size_of::<usize>());
	/// C `ssize_t` and `ptrdiff_t`.
	pub const SSIZE: Self = Self::signed(mem::size_of::<isize>());

	const fn signed(width: usize) -> Self {
		match width {
			1 => Self::I8,
			2 => Self::I16,
			4 => Self::I32,
			_ => Self::I64,
		}
	}

	const fn unsigned(width: usize) -> Self {
		match width {
			1 => Self::U8,
			2 => Self::U16,
			4 => Self::U32,
			_ => Self::U64,
		}
	}

	/// Size in bytes on the target.
	pub const fn size(self) -> usize {
		match self {
			Self::Void => 0,
			Self::I8 | Self::U8 => 1,
			Self::I16 | Self::U16 => 2,
			Self::I32 | Self::U32 | Self::F32 => 4,
			Self::I64 | Self::U64 | Self::F64 => 8,
			Self::Pointer | Self::CStr => mem::size_of::<*const c_void>(),
		}
	}

	/// Alignment in bytes on the target.
	pub const fn align(self) -> usize {
		match self {
			Self::Void | Self::I8 | Self::U8 => 1,
			Self::I16 | Self::U16 => mem::align_of::<u16>(),
			Self::I32 | Self::U32 => mem::align_of::<u32>(),
			Self::F32 => mem::align_of::<f32>(),
			Self::I64 | Self::U64 => mem::align_of::<u64>(),
			Self::F64 => mem::align_of::<f64>(),
			Self::Pointer | Self::CStr => mem::align_of::<*const c_void>(),
		}
	}

	/// Reads a value of this type from `addr`.
	///
	/// # Safety
	/// `addr` must point to `self.size()` readable bytes holding a value of this type.
	/// A `CStr` must be null or point to a nul-terminated string.
	pub(crate) unsafe fn read(self, addr: *const u8) -> Value {
		match self {
			Self::Void => Value::Void,
			Self::I8 => Value::I8(addr.cast::<i8>().read_unaligned()),
			Self::U8 => Value::U8(addr.read_unaligned()),
			Self::I16 => Value::I16(addr.cast::<i16>().read_unaligned()),
			Self::U16 => Value::U16(addr.cast::<u16>().read_unaligned()),
			Self::I32 => Value::I32(addr.cast::<i32>().read_unaligned()),
			Self::U32 => Value::U32(addr.cast::<u32>().read_unaligned()),
			Self::I64 => Value::I64(addr.cast::<i64>().read_unaligned()),
			Self::U64 => Value::U64(addr.cast::<u64>().read_unaligned()),
			Self::F32 => Value::F32(addr.cast::<f32>().read_unaligned()),
			Self::F64 => Value::F64(addr.cast::<f64>().read_unaligned()),
			Self::Pointer => Value::Pointer(addr.cast::<*mut c_void>().read_unaligned()),
			Self::CStr => read_c_str(addr.cast::<*const c_char>().read_unaligned()),
		}
	}
}

impl fmt::Display for AbiType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Self::Void => "void",
			Self::I8 => "int8",
			Self::U8 => "uint8",
			Self::I16 => "int16",
			Self::U16 => "uint16",
			Self::I32 => "int32",
			Self::U32 => "uint32",
			Self::I64 => "int64",
			Self::U64 => "uint64",
			Self::F32 => "float",
			Self::F64 => "double",
			Self::Pointer => "pointer",
			Self::CStr => "string",
		};
		f.write_str(name)
	}
}

/// A dynamically typed value passed to or returned from the dispatch table.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
	Void,
	I8(i8),
	U8(u8),
	I16(i16),
	U16(u16),
	I32(i32),
	U32(u32),
	I64(i64),
	U64(u64),
	F32(f32),
	F64(f64),
	Pointer(*mut c_void),
	/// An owned copy of a C string.
	Str(CString),
	/// A structured view produced by a typed pointer or a nested field.
	Record(Record),
	Array(Vec<Value>),
	/// The designated empty result of a nullable typed pointer or string.
	Absent,
}

impl Value {
	/// The ABI type this value is passed as, if it is a scalar.
	pub fn abi_type(&self) -> Option<AbiType> {
		Some(match self {
			Self::Void => AbiType::Void,
			Self::I8(_) => AbiType::I8,
			Self::U8(_) => AbiType::U8,
			Self::I16(_) => AbiType::I16,
			Self::U16(_) => AbiType::U16,
			Self::I32(_) => AbiType::I32,
			Self::U32(_) => AbiType::U32,
			Self::I64(_) => AbiType::I64,
			Self::U64(_) => AbiType::U64,
			Self::F32(_) => AbiType::F32,
			Self::F64(_) => AbiType::F64,
			Self::Pointer(_) => AbiType::Pointer,
			Self::Str(_) => AbiType::CStr,
			Self::Record(_) | Self::Array(_) | Self::Absent => return None,
		})
	}

	/// Short description used in mismatch reports.
	pub fn kind(&self) -> String {
		match self {
			Self::Record(record) => format!("record `{}`", record.layout().name()),
			Self::Array(items) => format!("array of {}", items.len()),
			Self::Absent => "absent".to_owned(),
			scalar => scalar.abi_type().map(|ty| ty.to_string()).unwrap_or_default(),
		}
	}

	/// Returns `true` if this value can be passed where `ty` is expected.
	///
	/// Records and strings decay to their address.
	pub fn fits(&self, ty: AbiType) -> bool {
		match (self, ty) {
			(Self::Record(_), AbiType::Pointer) => true,
			(Self::Pointer(_), AbiType::CStr) => true,
			(value, ty) => value.abi_type() == Some(ty),
		}
	}

	#[inline]
	pub fn is_absent(&self) -> bool {
		matches!(self, Self::Absent)
	}

	#[inline]
	pub fn as_record(&self) -> Option<&Record> {
		match self {
			Self::Record(record) => Some(record),
			_ => None,
		}
	}
}

unsafe fn read_c_str(addr: *const c_char) -> Value {
	if addr.is_null() {
		Value::Absent
	} else {
		Value::Str(CStr::from_ptr(addr).to_owned())
	}
}

/// A Rust type with a fixed C ABI representation.
///
/// # Safety
/// `ABI` must describe the type's real C representation.
pub unsafe trait NativeType: Sized {
	const ABI: AbiType;
	/// Borrows a native argument out of `value`, if it fits.
	///
	/// Pointers produced from a [`Value::Str`] or [`Value::Record`] stay valid
	/// for as long as `value` does.
	fn from_value(value: &Value) -> Option<Self>;
	/// Converts a native return value.
	///
	/// # Safety
	/// A `CStr` return must be null or nul-terminated.
	unsafe fn into_value(self) -> Value;
}

macro_rules! impl_native_scalar {
	($($ty:ty => $variant:ident),* $(,)?) => {$(
		unsafe impl NativeType for $ty {
			const ABI: AbiType = AbiType::$variant;
			#[inline]
			fn from_value(value: &Value) -> Option<Self> {
				match value {
					Value::$variant(inner) => Some(*inner),
					_ => None,
				}
			}
			#[inline]
			unsafe fn into_value(self) -> Value {
				Value::$variant(self)
			}
		}
	)*};
}

impl_native_scalar! {
	i8 => I8,
	u8 => U8,
	i16 => I16,
	u16 => U16,
	i32 => I32,
	u32 => U32,
	i64 => I64,
	u64 => U64,
	f32 => F32,
	f64 => F64,
}

// Pointer-sized integers travel as the fixed-width value of the same size.
macro_rules! impl_native_word {
	($($ty:ty => $abi:ident),* $(,)?) => {$(
		unsafe impl NativeType for $ty {
			const ABI: AbiType = AbiType::$abi;
			fn from_value(value: &Value) -> Option<Self> {
				match (Self::ABI, value) {
					(AbiType::I32, Value::I32(v)) => <$ty>::try_from(*v).ok(),
					(AbiType::I64, Value::I64(v)) => <$ty>::try_from(*v).ok(),
					(AbiType::U32, Value::U32(v)) => <$ty>::try_from(*v).ok(),
					(AbiType::U64, Value::U64(v)) => <$ty>::try_from(*v).ok(),
					_ => None,
				}
			}
			#[allow(clippy::unnecessary_cast)]
			unsafe fn into_value(self) -> Value {
				match Self::ABI {
					AbiType::I32 => Value::I32(self as i32),
					AbiType::U32 => Value::U32(self as u32),
					AbiType::U64 => Value::U64(self as u64),
					_ => Value::I64(self as i64),
				}
			}
		}
	)*};
}

impl_native_word! {
	usize => SIZE,
	isize => SSIZE,
}

unsafe impl NativeType for () {
	const ABI: AbiType = AbiType::Void;
	#[inline]
	fn from_value(value: &Value) -> Option<Self> {
		matches!(value, Value::Void).then_some(())
	}
	#[inline]
	unsafe fn into_value(self) -> Value {
		Value::Void
	}
}

unsafe impl NativeType for *mut c_void {
	const ABI: AbiType = AbiType::Pointer;
	fn from_value(value: &Value) -> Option<Self> {
		match value {
			Value::Pointer(addr) => Some(*addr),
			Value::Record(record) => Some(record.as_ptr()),
			_ => None,
		}
	}
	#[inline]
	unsafe fn into_value(self) -> Value {
		Value::Pointer(self)
	}
}

unsafe impl NativeType for *const c_void {
	const ABI: AbiType = AbiType::Pointer;
	#[inline]
	fn from_value(value: &Value) -> Option<Self> {
		<*mut c_void>::from_value(value).map(<*mut c_void>::cast_const)
	}
	#[inline]
	unsafe fn into_value(self) -> Value {
		Value::Pointer(self.cast_mut())
	}
}

unsafe impl NativeType for *const c_char {
	const ABI: AbiType = AbiType::CStr;
	fn from_value(value: &Value) -> Option<Self> {
		match value {
			Value::Str(string) => Some(string.as_ptr()),
			Value::Pointer(addr) => Some(addr.cast_const().cast()),
			_ => None,
		}
	}
	#[inline]
	unsafe fn into_value(self) -> Value {
		read_c_str(self)
	}
}

/// Calls a native function through its address with dynamically typed arguments.
pub type Invoker = unsafe fn(Symbol, &[Value]) -> Result<Value, Mismatch>;

/// A C function pointer type the dispatch table knows how to call.
///
/// Implemented for `unsafe extern "C" fn` pointers of up to eight
/// [`NativeType`] parameters.
///
/// # Safety
/// `Self` must be a function pointer type.
pub unsafe trait Signature: Copy + Send + Sync + 'static {
	fn params() -> Vec<AbiType>;
	fn returns() -> AbiType;
	/// Casts `symbol` to this function pointer type.
	///
	/// # Safety
	/// `symbol` must be the address of a function with exactly this signature.
	unsafe fn from_symbol(symbol: Symbol) -> Self;
	/// Unpacks `args`, calls the function at `symbol` and packs the result.
	///
	/// # Safety
	/// Same as [`from_symbol`](Self::from_symbol), plus whatever the native function requires.
	unsafe fn invoke(symbol: Symbol, args: &[Value]) -> Result<Value, Mismatch>;
}

trait AssertSize<T, U> {
	const ASSERT_SIZE: () = assert!(mem::size_of::<T>() == mem::size_of::<U>());
}
impl<F> AssertSize<F, *const c_void> for Symbol {}

/// Reinterprets a symbol address as the function pointer type `F`.
///
/// # Safety
/// `F` must be a function pointer type matching the symbol's signature.
#[inline]
pub(crate) unsafe fn cast_symbol<F: Copy>(symbol: Symbol) -> F {
	// `AssertSize` asserts sizeof(F) = sizeof(*const c_void), so `transmute_copy` is sound.
	#[allow(clippy::let_unit_value)]
	let _ = <Symbol as AssertSize<F, *const c_void>>::ASSERT_SIZE;
	let addr: *const c_void = symbol.as_ptr();
	mem::transmute_copy::<*const c_void, F>(&addr)
}

macro_rules! impl_signature {
	($($arg:ident $value:ident),*) => {
		unsafe impl<R: NativeType + 'static, $($arg: NativeType + 'static),*> Signature
			for unsafe extern "C" fn($($arg),*) -> R
		{
			fn params() -> Vec<AbiType> {
				vec![$($arg::ABI),*]
			}

			fn returns() -> AbiType {
				R::ABI
			}

			#[inline]
			unsafe fn from_symbol(symbol: Symbol) -> Self {
				cast_symbol(symbol)
			}

			#[allow(unused_mut, unused_variables, unused_assignments)]
			unsafe fn invoke(symbol: Symbol, args: &[Value]) -> Result<Value, Mismatch> {
				let expected = Self::params().len();
				if args.len() != expected {
					return Err(Mismatch::Arity { expected, found: args.len() });
				}
				let mut index = 0;
				let mut values = args.iter();
				$(
					let value = values.next().unwrap_or(&Value::Void);
					let Some($value) = $arg::from_value(value) else {
						return Err(Mismatch::Argument {
							index,
							expected: $arg::ABI,
							found: value.kind(),
						});
					};
					index += 1;
				)*
				let function = Self::from_symbol(symbol);
				Ok(function($($value),*).into_value())
			}
		}
	};
}

impl_signature!();
impl_signature!(A1 a1);
impl_signature!(A1 a1, A2 a2);
impl_signature!(A1 a1, A2 a2, A3 a3);
impl_signature!(A1 a1, A2 a2, A3 a3, A4 a4);
impl_signature!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5);
impl_signature!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6);
impl_signature!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6, A7 a7);
impl_signature!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6, A7 a7, A8 a8);

/// The null address, for readability at call sites.
#[inline]
pub const fn null() -> Value {
	Value::Pointer(ptr::null_mut())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn platform_widths_follow_the_target() {
		assert_eq!(AbiType::LONG.size(), mem::size_of::<c_long>());
		assert_eq!(AbiType::ULONG.size(), mem::size_of::<c_ulong>());
		assert_eq!(AbiType::SIZE.size(), mem::size_of::<usize>());
		assert_eq!(AbiType::SSIZE.align(), mem::align_of::<isize>());
		assert_eq!(<c_long as NativeType>::ABI, AbiType::LONG);
	}

	#[test]
	fn words_convert_through_their_width() {
		let len = unsafe { 42usize.into_value() };
		assert_eq!(len.abi_type(), Some(AbiType::SIZE));
		assert_eq!(usize::from_value(&len), Some(42));
		assert_eq!(isize::from_value(&unsafe { (-3isize).into_value() }), Some(-3));
		// the other width is never accepted.
		let wrong = if AbiType::SIZE == AbiType::U64 {
			Value::U32(42)
		} else {
			Value::U64(42)
		};
		assert_eq!(usize::from_value(&wrong), None);
	}
}
