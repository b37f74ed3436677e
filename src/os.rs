// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason

// Raw platform loader primitives. Everything above this module sees
// `io::Result`s and never touches `dlerror` or `GetLastError` directly.

#[cfg(unix)]
pub(crate) mod unix;
#[cfg(windows)]
pub(crate) mod windows;

#[cfg(unix)]
pub(crate) use unix as imp;
#[cfg(windows)]
pub(crate) use windows as imp;

/// Opaque native library handle.
pub(crate) type Handle = *mut std::ffi::c_void;
