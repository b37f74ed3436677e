// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason

use super::Handle;
use std::os::unix::ffi::OsStrExt;
use std::{ffi, io, ptr};

// `dlerror` is only thread-local on some libcs; serialize everywhere else.
#[cfg(not(any(target_os = "linux", target_os = "macos", target_env = "gnu")))]
#[inline]
fn dylib_guard() -> std::sync::MutexGuard<'static, ()> {
	static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
	LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(any(target_os = "linux", target_os = "macos", target_env = "gnu"))]
#[inline(always)]
fn dylib_guard() {}

unsafe fn dylib_error() -> io::Error {
	let message = libc::dlerror();
	if message.is_null() {
		io::Error::new(io::ErrorKind::Other, "unknown dynamic loader error")
	} else {
		let message = ffi::CStr::from_ptr(message).to_string_lossy().into_owned();
		io::Error::new(io::ErrorKind::Other, message)
	}
}

unsafe fn map_result<F>(f: F) -> io::Result<Handle>
where
	F: FnOnce() -> Handle,
{
	let _lock = dylib_guard();
	let _ = libc::dlerror(); // clear existing errors
	let handle = f();
	if handle.is_null() {
		Err(dylib_error())
	} else {
		Ok(handle)
	}
}

pub(crate) unsafe fn dylib_open(path: &ffi::OsStr) -> io::Result<Handle> {
	let c_str = ffi::CString::new(path.as_bytes())?;
	map_result(|| libc::dlopen(c_str.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL))
}

pub(crate) unsafe fn dylib_this() -> io::Result<Handle> {
	map_result(|| libc::dlopen(ptr::null(), libc::RTLD_NOW))
}

pub(crate) unsafe fn dylib_symbol(lib_handle: Handle, name: &str) -> io::Result<ptr::NonNull<ffi::c_void>> {
	let c_str = ffi::CString::new(name)?;
	map_result(|| libc::dlsym(lib_handle, c_str.as_ptr()))
		.map(|addr| ptr::NonNull::new_unchecked(addr))
}
