// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason

// Names follow the windows API headers.
#![allow(clippy::upper_case_acronyms)]
#![allow(non_snake_case)]

use super::Handle;
use std::os::windows::ffi::OsStrExt;
use std::{ffi, io, ptr};

type HMODULE = Handle;
type PCSTR = *const ffi::c_char;
type PCWSTR = *const u16;
type BOOL = i32;

const LOAD_LIBRARY_SEARCH_DEFAULT_DIRS: u32 = 0x00001000u32;
const LOAD_LIBRARY_SEARCH_DLL_LOAD_DIR: u32 = 0x00000100u32;
const GET_MODULE_HANDLE_EX_FLAG_UNCHANGED_REFCOUNT: u32 = 0x00000002u32;

extern "system" {
	fn LoadLibraryExW(lplibfilename: PCWSTR, hfile: Handle, dwflags: u32) -> HMODULE;
	fn GetProcAddress(hmodule: HMODULE, lpprocname: PCSTR) -> *mut ffi::c_void;
	fn GetModuleHandleExW(dwflags: u32, lpmodulename: PCWSTR, phmodule: *mut HMODULE) -> BOOL;
}

fn to_wide(path: &ffi::OsStr) -> Vec<u16> {
	path.encode_wide().chain(std::iter::once(0u16)).collect()
}

pub(crate) unsafe fn dylib_open(path: &ffi::OsStr) -> io::Result<Handle> {
	let wide_str = to_wide(path);
	// absolute paths may pull dependencies from their own directory.
	let flags = if std::path::Path::new(path).is_absolute() {
		LOAD_LIBRARY_SEARCH_DEFAULT_DIRS | LOAD_LIBRARY_SEARCH_DLL_LOAD_DIR
	} else {
		0
	};
	let handle = LoadLibraryExW(wide_str.as_ptr(), ptr::null_mut(), flags);
	if handle.is_null() {
		Err(io::Error::last_os_error())
	} else {
		Ok(handle)
	}
}

pub(crate) unsafe fn dylib_this() -> io::Result<Handle> {
	let mut handle: HMODULE = ptr::null_mut();
	let result = GetModuleHandleExW(
		GET_MODULE_HANDLE_EX_FLAG_UNCHANGED_REFCOUNT,
		ptr::null(),
		&mut handle,
	);
	if result == 0 {
		Err(io::Error::last_os_error())
	} else {
		Ok(handle)
	}
}

pub(crate) unsafe fn dylib_symbol(lib_handle: Handle, name: &str) -> io::Result<ptr::NonNull<ffi::c_void>> {
	let c_str = ffi::CString::new(name)?;
	let addr = GetProcAddress(lib_handle, c_str.as_ptr());
	ptr::NonNull::new(addr).ok_or_else(io::Error::last_os_error)
}
