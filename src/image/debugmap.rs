//! Mapping from source tokens to image IDs, for symbol-level debugging.
//!
//! The map is a report over finished tables: for every type, field and method it pairs the
//! original metadata token with the ID the image uses, and for every method body it lists the
//! source offset and image offset of each instruction. [`DebugMap::to_xml`] renders it as
//!
//! ```xml
//! <DebugMap>
//!   <Assembly Name="App" Token="0x20000001" Version="1.0.0.0">
//!     <Type Name="App.Program" Token="0x02000002" Id="0x0000">
//!       <Field Name="count" Token="0x04000001" Id="0x0000"/>
//!       <Method Name="Main" Token="0x06000001" Id="0x0000">
//!         <IL Source="0x0000" Image="0x0000"/>
//!       </Method>
//!     </Type>
//!   </Assembly>
//! </DebugMap>
//! ```

use quick_xml::{
    events::{BytesDecl, BytesEnd, BytesStart, Event},
    Writer,
};

use crate::{
    model::{Token, Version},
    tables::TablesContext,
    Error, Result,
};

/// A field or a method without body information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberEntry {
    /// Member name
    pub name: String,
    /// Source token
    pub token: Token,
    /// Image ID
    pub id: u16,
}

/// A method and its instruction offset map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodEntry {
    /// Name, token and ID
    pub member: MemberEntry,
    /// `(source offset, image offset)` per instruction
    pub il: Vec<(u32, u32)>,
}

/// A type with its members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeEntry {
    /// Full type name
    pub name: String,
    /// Source token
    pub token: Token,
    /// Image ID
    pub id: u16,
    /// Fields in ID order
    pub fields: Vec<MemberEntry>,
    /// Methods in ID order
    pub methods: Vec<MethodEntry>,
}

/// Token to ID correlation of one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugMap {
    /// Assembly name
    pub assembly: String,
    /// Source assembly token
    pub token: Token,
    /// Assembly version
    pub version: Version,
    /// Types in ID order
    pub types: Vec<TypeEntry>,
}

impl DebugMap {
    /// Collects the map from finished tables.
    #[must_use]
    pub fn from_tables(tables: &TablesContext<'_>) -> Self {
        let assembly = tables.symbols.assembly;
        let plan = &tables.symbols.plan;
        let mut types = Vec::with_capacity(plan.types.len());

        for (type_id, type_plan) in plan.types.iter().enumerate() {
            let ty = &assembly.types[type_plan.index];

            let first_field = usize::from(type_plan.first_field);
            let field_count =
                usize::from(type_plan.instance_fields) + usize::from(type_plan.static_fields);
            let fields = (first_field..first_field + field_count)
                .filter_map(|id| {
                    let &(t, f) = plan.fields.get(id)?;
                    let field = &assembly.types[t].fields[f];
                    Some(MemberEntry {
                        name: field.name.clone(),
                        token: field.token,
                        id: u16::try_from(id).ok()?,
                    })
                })
                .collect();

            let first_method = usize::from(type_plan.first_method);
            let method_count = usize::from(type_plan.virtual_methods)
                + usize::from(type_plan.instance_methods)
                + usize::from(type_plan.static_methods);
            let methods = (first_method..first_method + method_count)
                .filter_map(|id| {
                    let &(t, m) = plan.methods.get(id)?;
                    let method = &assembly.types[t].methods[m];
                    Some(MethodEntry {
                        member: MemberEntry {
                            name: method.name.clone(),
                            token: method.token,
                            id: u16::try_from(id).ok()?,
                        },
                        il: tables.byte_code.il_map(id).to_vec(),
                    })
                })
                .collect();

            types.push(TypeEntry {
                name: ty.name.full_name(),
                token: ty.token,
                id: u16::try_from(type_id).unwrap_or(u16::MAX),
                fields,
                methods,
            });
        }

        DebugMap {
            assembly: assembly.name.clone(),
            token: assembly.token,
            version: assembly.version,
            types,
        }
    }

    /// Renders the map as indented XML.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DebugMap`] if the XML writer fails.
    pub fn to_xml(&self) -> Result<String> {
        let mut xml = XmlWriter::new();
        xml.declaration()?;
        xml.start("DebugMap", &[])?;
        xml.start(
            "Assembly",
            &[
                ("Name", self.assembly.clone()),
                ("Token", self.token.to_string()),
                ("Version", self.version.to_string()),
            ],
        )?;

        for ty in &self.types {
            xml.start("Type", &identity(&ty.name, ty.token, ty.id))?;
            for field in &ty.fields {
                xml.empty("Field", &identity(&field.name, field.token, field.id))?;
            }
            for method in &ty.methods {
                let member = &method.member;
                let attributes = identity(&member.name, member.token, member.id);
                if method.il.is_empty() {
                    xml.empty("Method", &attributes)?;
                    continue;
                }
                xml.start("Method", &attributes)?;
                for &(source, image) in &method.il {
                    xml.empty(
                        "IL",
                        &[
                            ("Source", format!("0x{source:04X}")),
                            ("Image", format!("0x{image:04X}")),
                        ],
                    )?;
                }
                xml.end("Method")?;
            }
            xml.end("Type")?;
        }

        xml.end("Assembly")?;
        xml.end("DebugMap")?;
        xml.finish()
    }
}

fn identity(name: &str, token: Token, id: u16) -> [(&'static str, String); 3] {
    [
        ("Name", name.to_string()),
        ("Token", token.to_string()),
        ("Id", format!("0x{id:04X}")),
    ]
}

struct XmlWriter {
    inner: Writer<Vec<u8>>,
}

impl XmlWriter {
    fn new() -> Self {
        XmlWriter {
            inner: Writer::new_with_indent(Vec::new(), b' ', 2),
        }
    }

    fn emit(&mut self, event: Event<'_>) -> Result<()> {
        self.inner
            .write_event(event)
            .map_err(|e| Error::DebugMap(e.to_string()))
    }

    fn declaration(&mut self) -> Result<()> {
        self.emit(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
    }

    fn element<'a>(name: &'a str, attributes: &[(&str, String)]) -> BytesStart<'a> {
        let mut element = BytesStart::new(name);
        for (key, value) in attributes {
            element.push_attribute((*key, value.as_str()));
        }
        element
    }

    fn start(&mut self, name: &str, attributes: &[(&str, String)]) -> Result<()> {
        self.emit(Event::Start(Self::element(name, attributes)))
    }

    fn empty(&mut self, name: &str, attributes: &[(&str, String)]) -> Result<()> {
        self.emit(Event::Empty(Self::element(name, attributes)))
    }

    fn end(&mut self, name: &str) -> Result<()> {
        self.emit(Event::End(BytesEnd::new(name)))
    }

    fn finish(self) -> Result<String> {
        String::from_utf8(self.inner.into_inner())
            .map_err(|e| Error::DebugMap(e.to_string()))
    }
}
