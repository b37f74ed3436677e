// Copyright (c) 2023 Jonathan "Razordor" Alan Thomason
use quote::*;

use proc_macro::TokenStream as TokenStream1;
use proc_macro2::TokenStream as TokenStream2;
use syn::{parse::Parser, punctuated::Punctuated, spanned::Spanned, Expr, Token};

mod attr_data;
use attr_data::*;

#[proc_macro_attribute]
pub fn nicelink(args: TokenStream1, input: TokenStream1) -> TokenStream1 {
    let args = TokenStream2::from(args);
    let input = TokenStream2::from(input);
    let foreign_mod = match syn::parse2::<syn::ItemForeignMod>(input) {
        Ok(foreign_mod) => foreign_mod,
        Err(e) => return e.into_compile_error().into(),
    };

    let punct = match Parser::parse2(Punctuated::<Expr, Token!(,)>::parse_terminated, args) {
        Ok(punct) => punct,
        Err(e) => return e.into_compile_error().into(),
    };
    let attr = match AttrData::try_from(punct) {
        Ok(attr) => attr,
        Err(e) => return e.into_compile_error().into(),
    };
    let mut ret = TokenStream2::new();
    for item in foreign_mod.items {
        use syn::ForeignItem;
        let abi = &foreign_mod.abi;
        match item {
            ForeignItem::Fn(fn_item) => ret.extend(
                parse_fn(abi, fn_item, &attr).unwrap_or_else(syn::Error::into_compile_error),
            ),
            other => ret.extend(quote!(#abi {#other})),
        }
    }
    TokenStream1::from(ret)
}

fn parse_fn(abi: &syn::Abi, fn_item: syn::ForeignItemFn, attr: &AttrData) -> syn::Result<TokenStream2> {
    let FnAttrs {
        link_name,
        typed_pointer,
        passthrough,
    } = FnAttrs::parse(fn_item.attrs)?;
    let sig = &fn_item.sig;
    let fn_name = &sig.ident;
    let vis = &fn_item.vis;
    let library = &attr.library;

    if let Some(variadic) = &sig.variadic {
        return Err(syn::Error::new(variadic.span(), "variadic functions are unsupported"));
    }

    let mut param_list = Vec::new();
    let mut param_ty_list = Vec::new();
    let mut ty_list = Vec::new();
    for (i, arg) in sig.inputs.iter().enumerate() {
        match arg {
            syn::FnArg::Typed(pat_type) => {
                let ty = &pat_type.ty;
                let param_name = match pat_type.pat.as_ref() {
                    syn::Pat::Ident(pat_id) => pat_id.ident.clone(),
                    _ => format_ident!("p{i}"),
                };
                param_ty_list.push(quote!(#param_name : #ty));
                param_list.push(param_name);
                ty_list.push(ty);
            }
            syn::FnArg::Receiver(rec) => {
                return Err(syn::Error::new(rec.span(), "`self` arguments are unsupported"));
            }
        }
    }

    let symbol = link_name.unwrap_or_else(|| {
        format!("{}{}", attr.prefix.as_deref().unwrap_or_default(), fn_name)
    });
    let output = &sig.output;
    let ret_ty = match output {
        syn::ReturnType::Default => quote!(()),
        syn::ReturnType::Type(_, ty) => ty.to_token_stream(),
    };

    // The symbol is linked once, from `library`, the first time it's called.
    let link_and_call = quote! {
        static FUNC: ::nicelink::LazyFn<unsafe #abi fn (#(#ty_list),*) #output>
            = ::nicelink::LazyFn::new(#symbol);
        ::std::result::Result::Ok((FUNC.link(&#library)?)(#(#param_list),*))
    };

    let Some((rule, rule_span)) = typed_pointer else {
        return Ok(quote! {
            #(#passthrough)*
            #[allow(non_snake_case)]
            #[inline]
            #vis unsafe fn #fn_name (#(#param_ty_list),*) -> ::nicelink::Result<#ret_ty> {
                #link_and_call
            }
        });
    };

    let target = match output {
        syn::ReturnType::Type(_, ty) => match ty.as_ref() {
            syn::Type::Ptr(ptr) => &ptr.elem,
            other => {
                return Err(syn::Error::new(
                    other.span(),
                    "`#[typed_pointer]` functions must return `*const T` or `*mut T`",
                ))
            }
        },
        syn::ReturnType::Default => {
            return Err(syn::Error::new(
                rule_span,
                "`#[typed_pointer]` functions must return `*const T` or `*mut T`",
            ))
        }
    };
    let (wrapped_ty, wrap) = match rule {
        WrapRule::NonNull => (
            quote!(::nicelink::TypedPtr<#target>),
            quote!(::nicelink::TypedPtr::wrap(addr, stringify!(#fn_name))),
        ),
        WrapRule::Nullable => (
            quote!(::std::option::Option<::nicelink::TypedPtr<#target>>),
            quote!(::std::result::Result::Ok(::nicelink::TypedPtr::wrap_nullable(addr))),
        ),
    };

    // The raw call lives inside the public function, so nothing else can reach it.
    Ok(quote! {
        #(#passthrough)*
        #[allow(non_snake_case)]
        #vis unsafe fn #fn_name (#(#param_ty_list),*) -> ::nicelink::Result<#wrapped_ty> {
            #[inline]
            unsafe fn __raw (#(#param_ty_list),*) -> ::nicelink::Result<#ret_ty> {
                #link_and_call
            }
            let addr = __raw(#(#param_list),*)? as *const #target;
            #wrap
        }
    })
}
