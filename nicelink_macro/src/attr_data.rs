// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason
use proc_macro2::Span;
use syn::punctuated::Punctuated;
use syn::{spanned::Spanned, *};

/// Arguments of `#[nicelink(...)]`.
pub struct AttrData {
	pub library: syn::Path,
	pub prefix: Option<String>,
}

impl TryFrom<Punctuated<Expr, Token!(,)>> for AttrData {
	type Error = syn::Error;
	fn try_from(value: Punctuated<Expr, Token!(,)>) -> Result<Self> {
		let mut library: Option<syn::Path> = None;
		let mut prefix: Option<String> = None;
		let mut errors = vec![];
		const EXPECTED_KW: &str = "Expected `library`, or `prefix`.";

		for expr in value.iter() {
			match expr {
				Expr::Assign(assign) => {
					let (assign_left, assign_right) = (assign.left.as_ref(), assign.right.as_ref());

					let Expr::Path(ExprPath { path, .. }) = assign_left else {
						errors.push(Error::new(assign_left.span(), EXPECTED_KW));
						continue;
					};
					if path.is_ident("library") {
						// #[nicelink(library = <path>)]
						match assign_right {
							Expr::Path(ExprPath { path, .. }) => {
								if library.is_none() {
									library = Some(path.clone());
								} else {
									errors.push(Error::new(assign.span(), "library is already defined"));
								}
							}
							right => errors.push(Error::new(
								right.span(),
								"Expected a path to a `nicelink::LibLock`.",
							)),
						}
					} else if path.is_ident("prefix") {
						// #[nicelink(prefix = <string>)]
						match assign_right {
							Expr::Lit(ExprLit {
								lit: Lit::Str(val), ..
							}) => {
								if prefix.is_none() {
									prefix = Some(val.value());
								} else {
									errors.push(Error::new(assign.span(), "prefix is already defined"));
								}
							}
							right => errors.push(Error::new(right.span(), "Expected string.")),
						}
					} else {
						errors.push(Error::new(assign_left.span(), EXPECTED_KW));
					}
				}

				expr => errors.push(Error::new(expr.span(), EXPECTED_KW)),
			}
		}
		if library.is_none() {
			errors.push(Error::new(
				value.span(),
				"No library detected. Suggest using: `library = <path>`.",
			));
		}

		// combine everything into one error so every problem is reported at once.
		let mut errors = errors.into_iter();
		if let Some(mut main_err) = errors.next() {
			main_err.extend(errors);
			return Err(main_err);
		}
		match library {
			Some(library) => Ok(Self { library, prefix }),
			None => Err(Error::new(Span::call_site(), EXPECTED_KW)),
		}
	}
}

/// How a `#[typed_pointer]` function treats a null return.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum WrapRule {
	NonNull,
	Nullable,
}

/// The per-function attributes `#[nicelink]` understands. Everything else is
/// passed through to the generated function.
pub struct FnAttrs {
	pub link_name: Option<String>,
	pub typed_pointer: Option<(WrapRule, Span)>,
	pub passthrough: Vec<Attribute>,
}

impl FnAttrs {
	pub fn parse(attrs: Vec<Attribute>) -> Result<Self> {
		let mut link_name = None;
		let mut typed_pointer = None;
		let mut passthrough = vec![];
		for attr in attrs {
			if attr.path().is_ident("link_name") {
				// #[link_name = <string>]
				let Meta::NameValue(MetaNameValue {
					value: Expr::Lit(ExprLit {
						lit: Lit::Str(val), ..
					}),
					..
				}) = &attr.meta
				else {
					return Err(Error::new(attr.span(), "Expected `#[link_name = \"...\"]`."));
				};
				link_name = Some(val.value());
			} else if attr.path().is_ident("typed_pointer") {
				// #[typed_pointer] or #[typed_pointer(nullable)]
				let rule = match &attr.meta {
					Meta::Path(_) => WrapRule::NonNull,
					Meta::List(_) => {
						let rule: Ident = attr.parse_args()?;
						if rule != "nullable" {
							return Err(Error::new(rule.span(), "Expected `nullable`."));
						}
						WrapRule::Nullable
					}
					Meta::NameValue(_) => {
						return Err(Error::new(
							attr.span(),
							"Expected `#[typed_pointer]` or `#[typed_pointer(nullable)]`.",
						))
					}
				};
				typed_pointer = Some((rule, attr.span()));
			} else {
				passthrough.push(attr);
			}
		}
		Ok(Self {
			link_name,
			typed_pointer,
			passthrough,
		})
	}
}
