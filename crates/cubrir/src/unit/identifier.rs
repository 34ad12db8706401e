//! Executable-line identification
//!
//! Uses `syn` to walk a source file and decide which lines can record a hit.
//! The rules here must agree with the probe placement in `cubrir-derive`:
//!
//! | Construct | Lines |
//! |-----------|-------|
//! | statement inside a non-`const` fn body (any nesting depth) | first line executable |
//! | non-block `match` arm body inside such a fn | first line executable |
//! | `const`/`static` initializers, `const fn`, `const { }`, types | none |
//! | `#[test]` fns and `#[cfg(test)]` items | none |
//! | items, signatures, comments, blank lines | none |
//!
//! A line carrying the exclusion marker is excluded. When that line starts a
//! statement, arm, fn, impl, trait, or module, the whole construct is excluded.
//!
//! "Test-only" means `#[test]`-like attributes or a `cfg` predicate that can
//! only hold under `test` (`cfg(test)`, `cfg(all(test, ...))`).

use super::{LineSet, Unit, UnitId};
use crate::result::{CubrirError, CubrirResult};
use proc_macro2::Span;
use regex::Regex;
use std::path::Path;
use std::sync::Arc;
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::visit::{self, Visit};
use syn::{
    Arm, Attribute, Block, Expr, ExprConst, ExprRepeat, GenericArgument, ImplItemFn, ItemConst,
    ItemFn, ItemImpl, ItemMod, ItemStatic, ItemTrait, ItemUse, Meta, Signature, Stmt, Token,
    TraitItemFn, Type, UseTree, Variant,
};

/// Default exclusion marker pattern (`// cubrir:ignore`)
pub const DEFAULT_EXCLUDE_MARKER: &str = r"cubrir:\s*ignore";

/// Result of analysing one source text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineAnalysis {
    /// Lines that can record a hit
    pub executable: LineSet,
    /// Lines removed by the exclusion directive
    pub excluded: LineSet,
    /// Whether any item carries `#[cubrir::instrument]`
    pub instrumented: bool,
}

/// Exclusion marker matcher
#[derive(Debug, Clone)]
enum ExcludeMarker {
    /// `cubrir:` then optional whitespace then `ignore`
    Builtin,
    Pattern(Regex),
}

impl ExcludeMarker {
    fn is_match(&self, text: &str) -> bool {
        match self {
            Self::Builtin => text
                .match_indices("cubrir:")
                .any(|(at, tag)| text[at + tag.len()..].trim_start().starts_with("ignore")),
            Self::Pattern(pattern) => pattern.is_match(text),
        }
    }
}

/// Maps source files to units with executable-line sets
#[derive(Debug, Clone)]
pub struct UnitIdentifier {
    exclude_marker: ExcludeMarker,
}

impl UnitIdentifier {
    /// Create an identifier with a custom exclusion marker pattern
    pub fn new(exclude_marker: &str) -> CubrirResult<Self> {
        if exclude_marker == DEFAULT_EXCLUDE_MARKER {
            return Ok(Self::default());
        }
        let pattern = Regex::new(exclude_marker).map_err(|e| {
            CubrirError::config(format!("invalid exclude_marker `{exclude_marker}`: {e}"))
        })?;
        Ok(Self {
            exclude_marker: ExcludeMarker::Pattern(pattern),
        })
    }

    /// Read and analyse the file at `path`, identified relative to `root`
    pub fn identify_file(&self, root: &Path, path: &Path) -> CubrirResult<Unit> {
        let id = UnitId::from_path(root, path);
        let source = std::fs::read_to_string(path)
            .map_err(|e| CubrirError::unreadable(id.as_str(), e.to_string()))?;
        self.identify_source(id, path, &source)
    }

    /// Analyse already-loaded source text
    pub fn identify_source(&self, id: UnitId, path: &Path, source: &str) -> CubrirResult<Unit> {
        let analysis = self.analyse(source).map_err(|e| {
            let line = e.span().start().line;
            CubrirError::unreadable(id.as_str(), format!("line {line}: {e}"))
        })?;
        Ok(Unit::new(id, path.to_path_buf(), analysis, Arc::from(source)))
    }

    /// Compute executable and excluded lines for `source`
    pub fn analyse(&self, source: &str) -> Result<LineAnalysis, syn::Error> {
        let file = syn::parse_file(source)?;
        let markers: LineSet = source
            .lines()
            .enumerate()
            .filter(|(_, text)| self.exclude_marker.is_match(text))
            .map(|(idx, _)| idx as u32 + 1)
            .collect();

        let mut visitor = LineVisitor::new(&markers);
        visitor.visit_file(&file);

        let mut excluded = visitor.excluded;
        excluded.extend(markers.iter().copied());
        let executable = visitor
            .executable
            .difference(&excluded)
            .copied()
            .collect();

        Ok(LineAnalysis {
            executable,
            excluded,
            instrumented: InstrumentFinder::scan(&file),
        })
    }
}

impl Default for UnitIdentifier {
    fn default() -> Self {
        Self {
            exclude_marker: ExcludeMarker::Builtin,
        }
    }
}

/// Whether an item only exists in test builds
pub(crate) fn is_test_only(attrs: &[Attribute]) -> bool {
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

/// Whether a `cfg` predicate can only hold when `test` is set
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

/// Looks for `#[cubrir::instrument]` anywhere in a file
///
/// Also accepts the attribute behind `cfg_attr`, and a bare `#[instrument]`
/// when the file imports from `cubrir`.
#[derive(Default)]
struct InstrumentFinder {
    qualified: bool,
    bare: bool,
    imports_cubrir: bool,
}

impl InstrumentFinder {
    fn scan(file: &syn::File) -> bool {
        let mut finder = Self::default();
        finder.visit_file(file);
        finder.qualified || (finder.bare && finder.imports_cubrir)
    }

    fn check_path_text(&mut self, text: &str) {
        let text = text.trim_start_matches("::");
        if text == "cubrir::instrument" {
            self.qualified = true;
        } else if text == "instrument" {
            self.bare = true;
        }
    }
}

impl<'ast> Visit<'ast> for InstrumentFinder {
    fn visit_attribute(&mut self, attr: &'ast Attribute) {
        let path = attr.path();
        if path.is_ident("cfg_attr") {
            if let Meta::List(list) = &attr.meta {
                let tokens: String = list.tokens.to_string().split_whitespace().collect();
                for part in tokens.split(',').skip(1) {
                    self.check_path_text(part);
                }
            }
            return;
        }
        let text = path
            .segments
            .iter()
            .map(|s| s.ident.to_string())
            .collect::<Vec<_>>()
            .join("::");
        self.check_path_text(&text);
    }

    fn visit_item_use(&mut self, node: &'ast ItemUse) {
        if let UseTree::Path(path) = &node.tree {
            if path.ident == "cubrir" {
                self.imports_cubrir = true;
            }
        }
        visit::visit_item_use(self, node);
    }
}

fn first_line(span: Span) -> u32 {
    span.start().line as u32
}

fn last_line(span: Span) -> u32 {
    span.end().line as u32
}

/// AST visitor collecting executable and excluded lines
struct LineVisitor<'m> {
    markers: &'m LineSet,
    executable: LineSet,
    excluded: LineSet,
    /// Depth of runtime fn bodies being walked
    fn_depth: usize,
    /// Depth of const-evaluated contexts being walked
    const_depth: usize,
}

impl<'m> LineVisitor<'m> {
    fn new(markers: &'m LineSet) -> Self {
        Self {
            markers,
            executable: LineSet::new(),
            excluded: LineSet::new(),
            fn_depth: 0,
            const_depth: 0,
        }
    }

    fn counting(&self) -> bool {
        self.fn_depth > 0 && self.const_depth == 0
    }

    fn marked_between(&self, from: u32, to: u32) -> bool {
        from <= to && self.markers.range(from..=to).next().is_some()
    }

    fn starts_marked(&self, span: Span) -> bool {
        self.markers.contains(&first_line(span))
    }

    fn exclude_span(&mut self, span: Span) {
        self.excluded.extend(first_line(span)..=last_line(span));
    }

    fn in_const<F: FnOnce(&mut Self)>(&mut self, f: F) {
        self.const_depth += 1;
        f(self);
        self.const_depth -= 1;
    }

    /// Shared handling for free fns, methods, and trait default methods
    fn visit_fn_like(&mut self, span: Span, attrs: &[Attribute], sig: &Signature, body: &Block) {
        if is_test_only(attrs) {
            return;
        }
        let header_end = first_line(body.brace_token.span.open());
        if self.marked_between(first_line(span), header_end) {
            self.exclude_span(span);
            return;
        }
        if sig.constness.is_some() {
            return;
        }
        self.fn_depth += 1;
        self.visit_block(body);
        self.fn_depth -= 1;
    }

    /// Excludes a braced item when its header carries the marker
    fn header_excluded(&mut self, span: Span, open_brace: Span) -> bool {
        if self.marked_between(first_line(span), first_line(open_brace)) {
            self.exclude_span(span);
            return true;
        }
        false
    }
}

impl<'ast> Visit<'ast> for LineVisitor<'_> {
    fn visit_item_fn(&mut self, node: &'ast ItemFn) {
        self.visit_fn_like(node.span(), &node.attrs, &node.sig, &node.block);
    }

    fn visit_impl_item_fn(&mut self, node: &'ast ImplItemFn) {
        self.visit_fn_like(node.span(), &node.attrs, &node.sig, &node.block);
    }

    fn visit_trait_item_fn(&mut self, node: &'ast TraitItemFn) {
        if let Some(body) = &node.default {
            self.visit_fn_like(node.span(), &node.attrs, &node.sig, body);
        } else if self.starts_marked(node.span()) {
            self.exclude_span(node.span());
        }
    }

    fn visit_item_impl(&mut self, node: &'ast ItemImpl) {
        if is_test_only(&node.attrs) || self.header_excluded(node.span(), node.brace_token.span.open()) {
            return;
        }
        visit::visit_item_impl(self, node);
    }

    fn visit_item_trait(&mut self, node: &'ast ItemTrait) {
        if is_test_only(&node.attrs) || self.header_excluded(node.span(), node.brace_token.span.open()) {
            return;
        }
        visit::visit_item_trait(self, node);
    }

    fn visit_item_mod(&mut self, node: &'ast ItemMod) {
        if is_test_only(&node.attrs) {
            return;
        }
        if let Some((brace, _)) = &node.content {
            if self.header_excluded(node.span(), brace.span.open()) {
                return;
            }
        } else if self.starts_marked(node.span()) {
            self.exclude_span(node.span());
            return;
        }
        visit::visit_item_mod(self, node);
    }

    fn visit_block(&mut self, node: &'ast Block) {
        if !self.counting() {
            // Blocks outside fn bodies are const-evaluated or declarative
            return;
        }
        for stmt in &node.stmts {
            if let Stmt::Item(item) = stmt {
                self.visit_item(item);
                continue;
            }
            let span = stmt.span();
            if self.starts_marked(span) {
                self.exclude_span(span);
                continue;
            }
            let _ = self.executable.insert(first_line(span));
            visit::visit_stmt(self, stmt);
        }
    }

    fn visit_arm(&mut self, node: &'ast Arm) {
        if self.counting() {
            if self.starts_marked(node.span()) {
                self.exclude_span(node.span());
                return;
            }
            if !matches!(&*node.body, Expr::Block(_)) {
                let _ = self.executable.insert(first_line(node.body.span()));
            }
        }
        visit::visit_arm(self, node);
    }

    fn visit_item_const(&mut self, node: &'ast ItemConst) {
        self.in_const(|v| visit::visit_item_const(v, node));
    }

    fn visit_item_static(&mut self, node: &'ast ItemStatic) {
        self.in_const(|v| visit::visit_item_static(v, node));
    }

    fn visit_expr_const(&mut self, node: &'ast ExprConst) {
        self.in_const(|v| visit::visit_expr_const(v, node));
    }

    fn visit_expr_repeat(&mut self, node: &'ast ExprRepeat) {
        self.visit_expr(&node.expr);
        self.in_const(|v| v.visit_expr(&node.len));
    }

    fn visit_type(&mut self, node: &'ast Type) {
        self.in_const(|v| visit::visit_type(v, node));
    }

    fn visit_generic_argument(&mut self, node: &'ast GenericArgument) {
        self.in_const(|v| visit::visit_generic_argument(v, node));
    }

    fn visit_variant(&mut self, node: &'ast Variant) {
        self.in_const(|v| visit::visit_variant(v, node));
    }
}
