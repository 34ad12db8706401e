//! Cubrir Instrumentation Attribute
//!
//! `#[cubrir::instrument]` rewrites a fn, impl block, trait, or inline module
//! so that every statement in a runtime fn body first reports its line:
//!
//! ```ignore
//! #[cubrir::instrument]
//! fn classify(n: i32) -> &'static str {
//!     if n < 0 {
//!         return "negative";
//!     }
//!     "non-negative"
//! }
//!
//! // expands to (roughly):
//! fn classify(n: i32) -> &'static str {
//!     ::cubrir::tracer::record_hit(file!(), line!());
//!     if n < 0 {
//!         ::cubrir::tracer::record_hit(file!(), line!());
//!         return "negative";
//!     }
//!     ::cubrir::tracer::record_hit(file!(), line!());
//!     "non-negative"
//! }
//! ```
//!
//! Each probe carries the span of the statement it precedes, so `line!()`
//! reports that statement's first line. Placement mirrors the executable-line
//! rules of `cubrir::unit::UnitIdentifier`; a probe the identifier does not
//! consider executable is dropped when the session is recorded.

use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::ToTokens;
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::visit_mut::{self, VisitMut};
use syn::{
    parse_quote_spanned, Arm, Attribute, Block, Expr, ExprConst, ExprRepeat, GenericArgument,
    ImplItemFn, Item, ItemConst, ItemFn, ItemImpl, ItemMod, ItemStatic, ItemTrait, Meta,
    Signature, Stmt, Token, TraitItemFn, Type, Variant,
};

/// Insert line probes into a fn, impl block, trait, or inline module.
///
/// Skipped: `const fn`, `const`/`static` initializers, inline `const { }`
/// blocks, array lengths, and items marked `#[test]` or `#[cfg(test)]`.
/// The attribute takes no arguments.
#[proc_macro_attribute]
pub fn instrument(attr: TokenStream, item: TokenStream) -> TokenStream {
    match expand(attr.into(), item.into()) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(attr: TokenStream2, item: TokenStream2) -> syn::Result<TokenStream2> {
    if !attr.is_empty() {
        return Err(syn::Error::new_spanned(attr, "`instrument` takes no arguments"));
    }

    let mut item: Item = syn::parse2(item)?;
    let mut inserter = ProbeInserter::default();
    match &mut item {
        Item::Fn(node) => inserter.visit_item_fn_mut(node),
        Item::Impl(node) => inserter.visit_item_impl_mut(node),
        Item::Trait(node) => inserter.visit_item_trait_mut(node),
        Item::Mod(node) if node.content.is_some() => inserter.visit_item_mod_mut(node),
        Item::Mod(node) => {
            return Err(syn::Error::new_spanned(
                node,
                "`instrument` needs an inline module body; annotate the items in the module file instead",
            ))
        }
        other => {
            return Err(syn::Error::new_spanned(
                other,
                "`instrument` applies to fns, impl blocks, traits, and inline modules",
            ))
        }
    }
    Ok(item.into_token_stream())
}

// ============================================================================
// Probe insertion
// ============================================================================

fn probe(span: Span) -> Stmt {
    parse_quote_spanned! {span=>
        ::cubrir::tracer::record_hit(::core::file!(), ::core::line!());
    }
}

/// Whether an item only exists in test builds
fn is_test_only(attrs: &[Attribute]) -> bool {
    attrs.iter().any(|attr| {
        let path = attr.path();
        if path.is_ident("cfg") {
            return attr
                .parse_args::<Meta>()
                .is_ok_and(|predicate| cfg_requires_test(&predicate));
        }
        path.segments.last().is_some_and(|s| s.ident == "test")
    })
}

/// `test`, `all(.., test, ..)`, or `any(..)` whose every branch needs `test`
fn cfg_requires_test(predicate: &Meta) -> bool {
    match predicate {
        Meta::Path(path) => path.is_ident("test"),
        Meta::List(list) => {
            let Ok(nested) = list.parse_args_with(Punctuated::<Meta, Token![,]>::parse_terminated)
            else {
                return false;
            };
            if list.path.is_ident("all") {
                nested.iter().any(cfg_requires_test)
            } else if list.path.is_ident("any") {
                !nested.is_empty() && nested.iter().all(cfg_requires_test)
            } else {
                false
            }
        }
        Meta::NameValue(_) => false,
    }
}

#[derive(Default)]
struct ProbeInserter {
    fn_depth: usize,
    const_depth: usize,
}

impl ProbeInserter {
    fn counting(&self) -> bool {
        self.fn_depth > 0 && self.const_depth == 0
    }

    fn instrument_fn(&mut self, attrs: &[Attribute], sig: &Signature, body: &mut Block) {
        if is_test_only(attrs) || sig.constness.is_some() {
            return;
        }
        self.fn_depth += 1;
        self.visit_block_mut(body);
        self.fn_depth -= 1;
    }
}

impl VisitMut for ProbeInserter {
    fn visit_item_fn_mut(&mut self, node: &mut ItemFn) {
        self.instrument_fn(&node.attrs, &node.sig, &mut node.block);
    }

    fn visit_impl_item_fn_mut(&mut self, node: &mut ImplItemFn) {
        self.instrument_fn(&node.attrs, &node.sig, &mut node.block);
    }

    fn visit_trait_item_fn_mut(&mut self, node: &mut TraitItemFn) {
        if let Some(body) = &mut node.default {
            self.instrument_fn(&node.attrs, &node.sig, body);
        }
    }

    fn visit_item_impl_mut(&mut self, node: &mut ItemImpl) {
        if !is_test_only(&node.attrs) {
            visit_mut::visit_item_impl_mut(self, node);
        }
    }

    fn visit_item_trait_mut(&mut self, node: &mut ItemTrait) {
        if !is_test_only(&node.attrs) {
            visit_mut::visit_item_trait_mut(self, node);
        }
    }

    fn visit_item_mod_mut(&mut self, node: &mut ItemMod) {
        if !is_test_only(&node.attrs) {
            visit_mut::visit_item_mod_mut(self, node);
        }
    }

    fn visit_block_mut(&mut self, node: &mut Block) {
        if !self.counting() {
            return;
        }
        let stmts = std::mem::take(&mut node.stmts);
        node.stmts.reserve(stmts.len() * 2);
        for mut stmt in stmts {
            if let Stmt::Item(item) = &mut stmt {
                self.visit_item_mut(item);
                node.stmts.push(stmt);
                continue;
            }
            let span = stmt.span();
            visit_mut::visit_stmt_mut(self, &mut stmt);
            node.stmts.push(probe(span));
            node.stmts.push(stmt);
        }
    }

    fn visit_arm_mut(&mut self, node: &mut Arm) {
        visit_mut::visit_arm_mut(self, node);
        if !self.counting() || matches!(&*node.body, Expr::Block(_)) {
            return;
        }
        let span = node.body.span();
        let probe = probe(span);
        let body = std::mem::replace(&mut *node.body, Expr::Verbatim(TokenStream2::new()));
        *node.body = parse_quote_spanned! {span=> { #probe #body } };
    }

    // Const-evaluated and declarative contexts get no probes

    fn visit_item_const_mut(&mut self, _node: &mut ItemConst) {}

    fn visit_item_static_mut(&mut self, _node: &mut ItemStatic) {}

    fn visit_expr_const_mut(&mut self, _node: &mut ExprConst) {}

    fn visit_expr_repeat_mut(&mut self, node: &mut ExprRepeat) {
        self.visit_expr_mut(&mut node.expr);
    }

    fn visit_type_mut(&mut self, _node: &mut Type) {}

    fn visit_generic_argument_mut(&mut self, _node: &mut GenericArgument) {}

    fn visit_variant_mut(&mut self, _node: &mut Variant) {}
}
