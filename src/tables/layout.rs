//! Definition ordering.
//!
//! Before any row is built, every type, method and field defined by the assembly gets its
//! final ID. The order is:
//!
//! - **Types**: visited in full-name order; each visit first emits the declaring type and the
//!   locally defined, directly implemented interfaces, then the type itself. A runtime loading
//!   the image therefore always sees an enclosing type and its local interfaces before the type
//!   that depends on them.
//! - **Methods**: per type in type order, virtual methods first, then the remaining instance
//!   methods, then static methods. Declaration order is kept inside each group.
//! - **Fields**: per type in type order, instance fields first, then static fields.
//!
//! Computing the plan up front lets method bodies refer to methods of types that come later in
//! the image without a second pass.

use std::collections::HashMap;

use crate::{
    model::{Assembly, FieldRef, MethodRef, TypeDefinition, TypeName},
    tables::MAX_ID,
    utils::math::{check_id, to_u8},
    Result,
};

/// Placement of one type and its members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypePlan {
    /// Index of the type in [`Assembly::types`]
    pub index: usize,
    /// ID of the first method
    pub first_method: u16,
    /// Number of virtual methods
    pub virtual_methods: u8,
    /// Number of non-virtual instance methods
    pub instance_methods: u8,
    /// Number of static methods
    pub static_methods: u8,
    /// ID of the first field
    pub first_field: u16,
    /// Number of instance fields
    pub instance_fields: u8,
    /// Number of static fields
    pub static_fields: u8,
}

impl TypePlan {
    /// ID of the first static field; static fields follow the instance fields.
    #[must_use]
    pub fn first_static_field(&self) -> u16 {
        self.first_field + u16::from(self.instance_fields)
    }
}

/// Final IDs of every definition.
#[derive(Debug, Default)]
pub struct LayoutPlan {
    /// Types in ID order
    pub types: Vec<TypePlan>,
    /// Methods in ID order, as `(type index, method index)` into the model
    pub methods: Vec<(usize, usize)>,
    /// Fields in ID order, as `(type index, field index)` into the model
    pub fields: Vec<(usize, usize)>,
    /// Type IDs by name
    pub type_ids: HashMap<TypeName, u16>,
    /// Method IDs by structural reference
    pub method_ids: HashMap<MethodRef, u16>,
    /// Field IDs by structural reference
    pub field_ids: HashMap<FieldRef, u16>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    Pending,
    Active,
    Done,
}

struct TypeOrder<'a> {
    types: &'a [TypeDefinition],
    by_name: HashMap<&'a TypeName, usize>,
    state: Vec<Visit>,
    order: Vec<usize>,
}

impl<'a> TypeOrder<'a> {
    fn visit(&mut self, index: usize) -> Result<()> {
        match self.state[index] {
            Visit::Done => return Ok(()),
            Visit::Active => {
                return Err(inconsistent_error!(
                    "type dependency cycle through {}",
                    self.types[index].name
                ))
            }
            Visit::Pending => {}
        }

        self.state[index] = Visit::Active;
        let ty = &self.types[index];

        if let Some(declaring) = ty.name.declaring.as_deref() {
            if let Some(&outer) = self.by_name.get(declaring) {
                self.visit(outer)?;
            }
        }
        for interface in &ty.interfaces {
            if let Some(&dependency) = self.by_name.get(interface) {
                self.visit(dependency)?;
            }
        }

        self.state[index] = Visit::Done;
        self.order.push(index);
        Ok(())
    }
}

impl LayoutPlan {
    /// Assigns IDs to every definition of `assembly`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InconsistentModel`] for duplicate types or members and for
    /// dependency cycles, and [`crate::Error::CapacityOverflow`] if IDs or per-type counts do not
    /// fit their fields.
    pub fn new(assembly: &Assembly) -> Result<Self> {
        let types = &assembly.types;

        let mut by_name = HashMap::with_capacity(types.len());
        for (index, ty) in types.iter().enumerate() {
            if by_name.insert(&ty.name, index).is_some() {
                return Err(inconsistent_error!("type {} is defined twice", ty.name));
            }
        }

        let mut by_full_name: Vec<(String, usize)> = types
            .iter()
            .enumerate()
            .map(|(index, ty)| (ty.name.full_name(), index))
            .collect();
        by_full_name.sort();

        let mut order = TypeOrder {
            types,
            by_name,
            state: vec![Visit::Pending; types.len()],
            order: Vec::with_capacity(types.len()),
        };
        for (_, index) in &by_full_name {
            order.visit(*index)?;
        }

        let mut plan = LayoutPlan::default();
        for index in order.order {
            plan.place(types, index)?;
        }
        Ok(plan)
    }

    fn place(&mut self, types: &[TypeDefinition], index: usize) -> Result<()> {
        let ty = &types[index];
        let type_id = check_id(self.types.len(), MAX_ID, "type definition")?;
        self.type_ids.insert(ty.name.clone(), type_id);

        let first_method = check_id(self.methods.len(), MAX_ID, "method definition")?;
        let virtuals: Vec<usize> = (0..ty.methods.len())
            .filter(|&m| ty.methods[m].is_virtual())
            .collect();
        let instance: Vec<usize> = (0..ty.methods.len())
            .filter(|&m| !ty.methods[m].is_virtual() && !ty.methods[m].is_static())
            .collect();
        let statics: Vec<usize> = (0..ty.methods.len())
            .filter(|&m| !ty.methods[m].is_virtual() && ty.methods[m].is_static())
            .collect();

        for &m in virtuals.iter().chain(&instance).chain(&statics) {
            let id = check_id(self.methods.len(), MAX_ID, "method definition")?;
            let method = ty.methods[m].to_ref(&ty.name);
            if self.method_ids.insert(method, id).is_some() {
                return Err(inconsistent_error!(
                    "method {}::{} is defined twice",
                    ty.name,
                    ty.methods[m].name
                ));
            }
            self.methods.push((index, m));
        }

        let first_field = check_id(self.fields.len(), MAX_ID, "field definition")?;
        let instance_fields: Vec<usize> = (0..ty.fields.len())
            .filter(|&f| !ty.fields[f].is_static())
            .collect();
        let static_fields: Vec<usize> = (0..ty.fields.len())
            .filter(|&f| ty.fields[f].is_static())
            .collect();

        for &f in instance_fields.iter().chain(&static_fields) {
            let id = check_id(self.fields.len(), MAX_ID, "field definition")?;
            let field = ty.fields[f].to_ref(&ty.name);
            if self.field_ids.insert(field, id).is_some() {
                return Err(inconsistent_error!(
                    "field {}::{} is defined twice",
                    ty.name,
                    ty.fields[f].name
                ));
            }
            self.fields.push((index, f));
        }

        self.types.push(TypePlan {
            index,
            first_method,
            virtual_methods: to_u8(virtuals.len(), "virtual method count")?,
            instance_methods: to_u8(instance.len(), "instance method count")?,
            static_methods: to_u8(statics.len(), "static method count")?,
            first_field,
            instance_fields: to_u8(instance_fields.len(), "instance field count")?,
            static_fields: to_u8(static_fields.len(), "static field count")?,
        });
        Ok(())
    }

    /// ID of a locally defined type.
    #[must_use]
    pub fn type_id(&self, name: &TypeName) -> Option<u16> {
        self.type_ids.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::{
            FieldAttributes, FieldDefinition, MethodAttributes, MethodDefinition, MethodSig,
            TypeSig,
        },
        Error,
    };

    fn name(n: &str) -> TypeName {
        TypeName::new("App", "App", n)
    }

    fn method(n: &str, flags: MethodAttributes) -> MethodDefinition {
        let sig = if flags.contains(MethodAttributes::STATIC) {
            MethodSig::static_(TypeSig::Void, vec![])
        } else {
            MethodSig::instance(TypeSig::Void, vec![])
        };
        MethodDefinition::new(n, flags, sig)
    }

    fn ordered_names(assembly: &Assembly, plan: &LayoutPlan) -> Vec<String> {
        plan.types
            .iter()
            .map(|t| assembly.types[t.index].name.full_name())
            .collect()
    }

    #[test]
    fn test_types_ordered_by_full_name() {
        let mut assembly = Assembly::new("App");
        for n in ["Zeta", "Alpha", "Mid"] {
            assembly.types.push(TypeDefinition::new(name(n)));
        }
        let plan = LayoutPlan::new(&assembly).unwrap();
        assert_eq!(
            ordered_names(&assembly, &plan),
            ["App.Alpha", "App.Mid", "App.Zeta"]
        );
        assert_eq!(plan.type_id(&name("Zeta")), Some(2));
    }

    #[test]
    fn test_dependencies_come_first() {
        let mut assembly = Assembly::new("App");
        let mut a = TypeDefinition::new(name("A"));
        a.interfaces.push(name("IZ"));
        assembly.types.push(a);
        assembly.types.push(TypeDefinition::new(name("IZ")));

        let outer = name("Outer");
        assembly
            .types
            .push(TypeDefinition::new(TypeName::nested(&outer, "Inner")));
        assembly.types.push(TypeDefinition::new(outer));

        let plan = LayoutPlan::new(&assembly).unwrap();
        assert_eq!(
            ordered_names(&assembly, &plan),
            ["App.IZ", "App.A", "App.Outer", "App.Outer/Inner"]
        );
    }

    #[test]
    fn test_cycle_detected() {
        let mut assembly = Assembly::new("App");
        let mut a = TypeDefinition::new(name("IA"));
        a.interfaces.push(name("IB"));
        let mut b = TypeDefinition::new(name("IB"));
        b.interfaces.push(name("IA"));
        assembly.types.extend([a, b]);

        assert!(matches!(
            LayoutPlan::new(&assembly),
            Err(Error::InconsistentModel(_))
        ));
    }

    #[test]
    fn test_duplicate_type_rejected() {
        let mut assembly = Assembly::new("App");
        assembly.types.push(TypeDefinition::new(name("A")));
        assembly.types.push(TypeDefinition::new(name("A")));
        assert!(LayoutPlan::new(&assembly).is_err());
    }

    #[test]
    fn test_member_buckets_are_stable() {
        let mut assembly = Assembly::new("App");
        let mut ty = TypeDefinition::new(name("T"));
        ty.methods.push(method("s1", MethodAttributes::STATIC));
        ty.methods.push(method("i1", MethodAttributes::PUBLIC));
        ty.methods.push(method("v1", MethodAttributes::VIRTUAL));
        ty.methods.push(method("s2", MethodAttributes::STATIC));
        ty.methods.push(method("v2", MethodAttributes::VIRTUAL));
        ty.fields
            .push(FieldDefinition::new("sf", FieldAttributes::STATIC, TypeSig::I4));
        ty.fields
            .push(FieldDefinition::new("if", FieldAttributes::PUBLIC, TypeSig::I4));
        assembly.types.push(ty);

        let plan = LayoutPlan::new(&assembly).unwrap();
        let methods: Vec<&str> = plan
            .methods
            .iter()
            .map(|&(t, m)| assembly.types[t].methods[m].name.as_str())
            .collect();
        assert_eq!(methods, ["v1", "v2", "i1", "s1", "s2"]);

        let fields: Vec<&str> = plan
            .fields
            .iter()
            .map(|&(t, f)| assembly.types[t].fields[f].name.as_str())
            .collect();
        assert_eq!(fields, ["if", "sf"]);

        let t = plan.types[0];
        assert_eq!(
            (t.virtual_methods, t.instance_methods, t.static_methods),
            (2, 1, 2)
        );
        assert_eq!(t.first_static_field(), 1);
    }

    #[test]
    fn test_member_ids_span_types() {
        let mut assembly = Assembly::new("App");
        let mut a = TypeDefinition::new(name("A"));
        a.methods.push(method("m", MethodAttributes::STATIC));
        let mut b = TypeDefinition::new(name("B"));
        b.methods.push(method("m", MethodAttributes::STATIC));
        assembly.types.extend([b, a]);

        let plan = LayoutPlan::new(&assembly).unwrap();
        let b_ref = assembly.types[0].methods[0].to_ref(&name("B"));
        assert_eq!(plan.method_ids[&b_ref], 1);
        assert_eq!(plan.types[1].first_method, 1);
    }
}
