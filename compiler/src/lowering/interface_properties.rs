//! Interface property declarations become accessor pairs
//!
//! ```text
//! interface I { x?: number; readonly y: int; }
//! =>
//! interface I {
//!     get x(): number | undefined;
//!     set x(value: number | undefined): void;
//!     get y(): int;
//! }
//! ```
//!
//! Getters and setters the interface already declares under the same name
//! become overloads of the synthesized getter. Every class that implements
//! an interface with optional properties, directly or through interface
//! inheritance, gets `| undefined` added to the matching fields. The pipeline
//! does that widening with [`widen_implementing_fields`] before the first
//! type check, so uses of a widened field are checked as user code; the
//! phase repeats it for modules that skipped that step.

use fxhash::FxHashSet;
use indexmap::IndexMap;
use log::debug;

use crate::ast::{AstArena, MethodKind, ModifierFlags, NodeKind};
use crate::binder::{Binder, VariableKind};
use crate::error::LoweringResult;
use crate::id_types::NodeId;
use crate::lowering::{LoweringContext, LoweringPhase, Module};
use crate::snippet::SnippetBuilder;

/// What pass two needs to know about one interface
#[derive(Debug, Clone, Default)]
struct InterfaceEntry {
    optional_properties: Vec<String>,
    /// Declarations of the interfaces it extends
    parents: Vec<NodeId>,
}

/// Per-run record of the interfaces of one module, keyed by declaration
#[derive(Debug, Default)]
struct InterfaceRegistry {
    entries: IndexMap<NodeId, InterfaceEntry>,
}

impl InterfaceRegistry {
    /// Record every interface among `nodes` as written, before any lowering
    fn collect(binder: &Binder, arena: &AstArena, nodes: &[NodeId]) -> Self {
        let mut registry = Self::default();
        for &decl in nodes {
            let NodeKind::InterfaceDeclaration { extends, body, .. } = arena.kind(decl) else {
                continue;
            };
            let optional_properties = arena
                .children(*body)
                .into_iter()
                .filter_map(|member| match arena.kind(member) {
                    NodeKind::ClassProperty { modifiers, name, .. } if modifiers.contains(ModifierFlags::OPTIONAL) => {
                        arena.identifier_name(*name).map(str::to_string)
                    }
                    _ => None,
                })
                .collect();
            let parents = declarations_of(binder, arena, extends, VariableKind::Interface);
            registry.entries.insert(decl, InterfaceEntry { optional_properties, parents });
        }
        registry
    }

    /// Optional property names of `roots` and everything they extend
    fn optional_properties(&self, roots: &[NodeId]) -> FxHashSet<String> {
        let mut names = FxHashSet::default();
        let mut seen = FxHashSet::default();
        let mut stack = roots.to_vec();
        while let Some(decl) = stack.pop() {
            if !seen.insert(decl) {
                continue;
            }
            if let Some(entry) = self.entries.get(&decl) {
                names.extend(entry.optional_properties.iter().cloned());
                stack.extend(entry.parents.iter().copied());
            }
        }
        names
    }
}

#[derive(Debug, Default)]
pub struct InterfacePropertyDeclarationsPhase;

impl InterfacePropertyDeclarationsPhase {
    pub fn new() -> Self {
        Self
    }
}

impl LoweringPhase for InterfacePropertyDeclarationsPhase {
    fn name(&self) -> &'static str {
        "InterfacePropertyDeclarationsPhase"
    }

    fn perform_for_module(&mut self, ctx: &mut LoweringContext, module: &mut Module) -> LoweringResult<bool> {
        let _span = tracing::debug_span!("transform", transformation = self.name()).entered();
        let arena = &mut module.arena;
        let nodes = arena.subtree(module.root);
        let registry = InterfaceRegistry::collect(ctx.binder(), arena, &nodes);

        let mut changed = false;
        for &decl in &nodes {
            if matches!(arena.kind(decl), NodeKind::InterfaceDeclaration { .. }) {
                changed |= lower_interface(ctx, arena, decl)?;
            }
        }
        for &decl in &nodes {
            if !matches!(arena.kind(decl), NodeKind::ClassDeclaration { .. }) {
                continue;
            }
            let widened = widen_class_fields(ctx.binder(), arena, decl, &registry)?;
            if widened > 0 {
                ctx.record_rewrites(widened);
                ctx.refresh_declaration(arena, decl)?;
                changed = true;
            }
        }

        if changed {
            // member types seen from other declarations are stale
            ctx.retype_module(module)?;
        }
        Ok(changed)
    }

    fn postcondition_for_module(&self, _ctx: &LoweringContext, module: &Module) -> bool {
        let arena = &module.arena;
        arena.subtree(module.root).into_iter().all(|node| match arena.kind(node) {
            NodeKind::InterfaceBody { members } => members
                .iter()
                .all(|member| !matches!(arena.kind(*member), NodeKind::ClassProperty { .. })),
            _ => true,
        })
    }
}

/// Widen the fields of every class in a bound module that implements an
/// optional interface property. Returns how many fields changed.
pub fn widen_implementing_fields(binder: &Binder, arena: &mut AstArena, root: NodeId) -> LoweringResult<usize> {
    let nodes = arena.subtree(root);
    let registry = InterfaceRegistry::collect(binder, arena, &nodes);
    let mut widened = 0;
    for decl in nodes {
        if matches!(arena.kind(decl), NodeKind::ClassDeclaration { .. }) {
            widened += widen_class_fields(binder, arena, decl, &registry)?;
        }
    }
    Ok(widened)
}

/// Declarations named by identifier references of the given kind
fn declarations_of(binder: &Binder, arena: &AstArena, references: &[NodeId], kind: VariableKind) -> Vec<NodeId> {
    references
        .iter()
        .filter_map(|reference| arena.get(*reference).variable)
        .map(|variable| binder.variable(variable))
        .filter(|variable| variable.kind == kind)
        .map(|variable| variable.declaration)
        .collect()
}

/// Replace the properties of one interface with accessors. Returns whether
/// the body changed.
fn lower_interface(ctx: &mut LoweringContext, arena: &mut AstArena, decl: NodeId) -> LoweringResult<bool> {
    let NodeKind::InterfaceDeclaration { body, .. } = arena.kind(decl).clone() else {
        return Ok(false);
    };
    let members = match arena.kind(body) {
        NodeKind::InterfaceBody { members } => members.clone(),
        _ => Vec::new(),
    };

    let mut changed = false;
    for member in members {
        let NodeKind::ClassProperty { name, .. } = arena.kind(member) else {
            continue;
        };
        let property = arena.identifier_name(*name).unwrap_or_default().to_string();
        let getter = synthesize_accessors(arena, member)?;
        arena.replace_child(body, member, getter);
        adopt_user_accessors(arena, body, getter, &property);
        debug!("interface property '{}' lowered to accessors", property);
        ctx.record_rewrites(1);
        changed = true;
    }

    if changed {
        ctx.refresh_declaration(arena, decl)?;
    }
    Ok(changed)
}

/// Getter for `property`, with the setter as its first overload unless the
/// property is read-only
fn synthesize_accessors(arena: &mut AstArena, property: NodeId) -> LoweringResult<NodeId> {
    let NodeKind::ClassProperty { modifiers, name, ty, .. } = arena.kind(property).clone() else {
        return Ok(property);
    };
    let accessor_modifiers = ModifierFlags::PUBLIC.union(ModifierFlags::ABSTRACT);
    let mut builder = SnippetBuilder::new(arena);

    let ty = if modifiers.contains(ModifierFlags::OPTIONAL) && !type_includes_undefined(builder.arena(), ty) {
        builder.create_formatted_type_annotation("@@T1 | undefined", &[ty.into()])?
    } else {
        ty
    };

    let setter = if modifiers.contains(ModifierFlags::READONLY) {
        None
    } else {
        let name = builder.arena().clone_subtree(name, None);
        let ty = builder.arena().clone_subtree(ty, None);
        Some(builder.create_formatted_class_element(
            "set @@I1(value: @@T2): void;",
            accessor_modifiers,
            &[name.into(), ty.into()],
        )?)
    };
    let getter =
        builder.create_formatted_class_element("get @@I1(): @@T2;", accessor_modifiers, &[name.into(), ty.into()])?;

    let span = arena.span(property);
    arena.set_span_recursively(getter, span);
    if let Some(setter) = setter {
        arena.set_span_recursively(setter, span);
        arena.push_child(getter, setter);
    }
    Ok(getter)
}

/// Move user-written accessors named `property` out of the body and under
/// the synthesized getter
fn adopt_user_accessors(arena: &mut AstArena, body: NodeId, getter: NodeId, property: &str) {
    let members = match arena.kind(body) {
        NodeKind::InterfaceBody { members } => members.clone(),
        _ => return,
    };
    for member in members {
        if member == getter {
            continue;
        }
        let is_accessor = match arena.kind(member) {
            NodeKind::MethodDefinition { kind, name, .. } => {
                matches!(kind, MethodKind::Get | MethodKind::Set) && arena.identifier_name(*name) == Some(property)
            }
            _ => false,
        };
        if is_accessor {
            arena.remove_child(body, member);
            arena.push_child(getter, member);
            debug!("user accessor '{}' merged as an overload", property);
        }
    }
}

/// Add `| undefined` to class fields implementing optional interface
/// properties. Returns how many fields changed.
fn widen_class_fields(
    binder: &Binder,
    arena: &mut AstArena,
    class: NodeId,
    registry: &InterfaceRegistry,
) -> LoweringResult<usize> {
    let NodeKind::ClassDeclaration { implements, body, .. } = arena.kind(class).clone() else {
        return Ok(0);
    };
    let interfaces = declarations_of(binder, arena, &implements, VariableKind::Interface);
    let optional = registry.optional_properties(&interfaces);
    if optional.is_empty() {
        return Ok(0);
    }

    let mut widened = 0;
    for member in body {
        let NodeKind::ClassProperty { name, ty, .. } = arena.kind(member) else {
            continue;
        };
        let (name, ty) = (*name, *ty);
        let field = arena.identifier_name(name).unwrap_or_default().to_string();
        if !optional.contains(&field) || type_includes_undefined(arena, ty) {
            continue;
        }
        let span = arena.span(ty);
        let union = SnippetBuilder::new(arena).create_formatted_type_annotation("@@T1 | undefined", &[ty.into()])?;
        arena.set_span_recursively(union, span);
        arena.replace_child(member, ty, union);
        debug!("field '{}' of an implementing class widened with undefined", field);
        widened += 1;
    }
    Ok(widened)
}

fn type_includes_undefined(arena: &AstArena, ty: NodeId) -> bool {
    match arena.kind(ty) {
        NodeKind::TypeReference { name } => name == "undefined",
        NodeKind::UnionType { types } => types.iter().any(|arm| type_includes_undefined(arena, *arm)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::from_syntax::SyntaxConverter;
    use crate::ast::printer::print_compact;
    use crate::binder::Binder;
    use crate::checker::Checker;
    use crate::pipeline::PipelineConfig;

    fn lower(src: &str) -> (LoweringContext, Module, bool) {
        let parsed = parser::parse_module(src).unwrap();
        let mut arena = AstArena::new();
        let root = SyntaxConverter::convert_module(&mut arena, &parsed).unwrap();
        let mut binder = Binder::new();
        binder.bind_program(&mut arena, root).unwrap();
        let mut checker = Checker::new();
        checker.check_program(&mut arena, &binder, root).unwrap();
        assert!(checker.errors().is_empty(), "{:?}", checker.errors());
        let mut ctx = LoweringContext::new(binder, checker, PipelineConfig::default());
        let mut module = Module::new(arena, root);
        let mut phase = InterfacePropertyDeclarationsPhase::new();
        let changed = phase.perform_for_module(&mut ctx, &mut module).unwrap();
        assert!(phase.postcondition_for_module(&ctx, &module));
        (ctx, module, changed)
    }

    fn printed(module: &Module) -> String {
        print_compact(&module.arena, module.root)
    }

    #[test]
    fn test_optional_property() {
        let (ctx, module, changed) = lower("interface I { x?: number; }");
        assert!(changed);
        assert_eq!(ctx.rewrites(), 1);
        assert_eq!(
            printed(&module),
            "interface I { get x(): number | undefined; set x(value: number | undefined): void; }"
        );
    }

    #[test]
    fn test_readonly_property_has_no_setter() {
        let (_, module, _) = lower("interface I { readonly y: int; z: string | undefined; }");
        assert_eq!(
            printed(&module),
            "interface I { get y(): int; get z(): string | undefined; set z(value: string | undefined): void; }"
        );
    }

    #[test]
    fn test_user_accessors_become_overloads() {
        let (ctx, module, _) = lower("interface I { x: int; get x(): int; }");
        let arena = &module.arena;
        let body = arena
            .subtree(module.root)
            .into_iter()
            .find(|&n| matches!(arena.kind(n), NodeKind::InterfaceBody { .. }))
            .unwrap();
        let members = arena.children(body);
        assert_eq!(members.len(), 1);
        let NodeKind::MethodDefinition { kind, overloads, .. } = arena.kind(members[0]) else {
            panic!("expected an accessor");
        };
        assert_eq!(*kind, MethodKind::Get);
        assert_eq!(overloads.len(), 2);
        for overload in overloads {
            assert_eq!(arena.parent(*overload), Some(members[0]));
        }
        assert!(ctx.checker().errors().is_empty());
    }

    #[test]
    fn test_implementing_class_fields_are_normalized() {
        let src = "interface A { x?: number; } interface B extends A { y: int; } \
                   class C implements B { x: number = 1; y: int = 2; z: number = 3; }";
        let (_, module, _) = lower(src);
        let out = printed(&module);
        assert!(out.contains("x: number | undefined = 1;"), "{}", out);
        assert!(out.contains("y: int = 2;"), "{}", out);
        assert!(out.contains("z: number = 3;"), "{}", out);
    }

    #[test]
    fn test_fields_widen_before_the_first_check() {
        let src = "interface A { x?: number; } interface B extends A { y: int; } \
                   class C implements B { x: number = 1; y: int = 2; } \
                   class D implements A { x: number | undefined = undefined; }";
        let parsed = parser::parse_module(src).unwrap();
        let mut arena = AstArena::new();
        let root = SyntaxConverter::convert_module(&mut arena, &parsed).unwrap();
        let mut binder = Binder::new();
        binder.bind_program(&mut arena, root).unwrap();

        assert_eq!(widen_implementing_fields(&binder, &mut arena, root).unwrap(), 1);
        let out = print_compact(&arena, root);
        assert!(out.contains("class C implements B { x: number | undefined = 1; y: int = 2; }"), "{}", out);
        assert!(out.contains("interface A { x?: number; }"), "{}", out);
        assert_eq!(widen_implementing_fields(&binder, &mut arena, root).unwrap(), 0);

        let mut checker = Checker::new();
        checker.check_program(&mut arena, &binder, root).unwrap();
        assert!(checker.errors().is_empty(), "{:?}", checker.errors());
    }

    #[test]
    fn test_untouched_module() {
        let (_, module, changed) = lower("class C { x?: int; }");
        assert!(!changed);
        assert_eq!(printed(&module), "class C { x?: int; }");
    }

    #[test]
    fn test_registry_walks_parents_once() {
        let mut registry = InterfaceRegistry::default();
        let (a, b) = (NodeId::from_raw(1), NodeId::from_raw(2));
        registry.entries.insert(
            a,
            InterfaceEntry {
                optional_properties: vec!["x".into()],
                parents: vec![b],
            },
        );
        registry.entries.insert(
            b,
            InterfaceEntry {
                optional_properties: vec!["y".into()],
                parents: vec![a],
            },
        );
        let names = registry.optional_properties(&[a]);
        assert!(names.contains("x") && names.contains("y"));
        assert_eq!(names.len(), 2);
    }
}
