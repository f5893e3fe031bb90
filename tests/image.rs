//! Integration tests for complete image builds.
//!
//! Every test builds an image from a hand-made assembly model and inspects the result through
//! the public API only: the decoded header, the raw bytes and the debug map.

use cilpack::{prelude::*, Result};

fn string_payload(text: &str) -> Vec<u8> {
    let mut data = vec![text.len() as u8];
    data.extend_from_slice(text.as_bytes());
    data
}

fn object() -> TypeName {
    TypeName::new("mscorlib", "System", "Object")
}

/// One type with a static integer field, a virtual method with an empty body and one string
/// resource `"hi"`.
fn minimal_assembly() -> Assembly {
    let mut assembly = Assembly::new("Minimal");
    let mut widget = TypeDefinition::new(TypeName::new("Minimal", "Minimal", "Widget"));
    widget
        .fields
        .push(FieldDefinition::new("value", FieldAttributes::STATIC, TypeSig::I4));
    widget.methods.push(
        MethodDefinition::new(
            "Update",
            MethodAttributes::VIRTUAL,
            MethodSig::instance(TypeSig::Void, vec![]),
        )
        .with_body(MethodBody::from_instructions(vec![], vec![])),
    );
    assembly.types.push(widget);
    assembly.resource_files.push(ResourceFile::new(
        "Minimal.Strings.resources",
        vec![Resource::new("Text", "System.String", string_payload("hi"))],
    ));
    assembly
}

/// A counter incremented inside `try`, with an empty `finally`.
fn counter_assembly() -> Assembly {
    let mut assembly = Assembly::new("Counter");
    assembly.version = Version::new(1, 2, 3, 4);
    assembly
        .references
        .push(AssemblyName::new("mscorlib", Version::new(1, 0, 0, 0)));

    let name = TypeName::new("Counter", "Counter", "Program");
    let count = FieldDefinition::new("count", FieldAttributes::STATIC, TypeSig::I4);
    let count_ref = count.to_ref(&name);

    let mut body = MethodBody::from_instructions(
        vec![],
        vec![
            (OpCode::LDSFLD, Operand::Field(count_ref.clone())),
            (OpCode::LDC_I4_1, Operand::None),
            (OpCode::ADD, Operand::None),
            (OpCode::STSFLD, Operand::Field(count_ref)),
            (OpCode::LEAVE_S, Operand::Branch(15)),
            (OpCode::ENDFINALLY, Operand::None),
            (OpCode::RET, Operand::None),
        ],
    );
    body.exception_handlers.push(ExceptionHandler {
        kind: HandlerKind::Finally,
        try_start: 0,
        try_end: 14,
        handler_start: 14,
        handler_end: 15,
    });

    let mut program = TypeDefinition::new(name);
    program.base = Some(object());
    program.fields.push(count);
    program.methods.push(
        MethodDefinition::new(
            "Main",
            MethodAttributes::PUBLIC | MethodAttributes::STATIC,
            MethodSig::static_(TypeSig::Void, vec![]),
        )
        .with_body(body),
    );
    assembly.types.push(program);
    assembly
}

fn build(assembly: &Assembly) -> Result<Image> {
    ImageBuilder::new(assembly, BuildOptions::default()).build()
}

#[test]
fn test_minimal_assembly() -> Result<()> {
    let assembly = minimal_assembly();
    let image = build(&assembly)?;

    assert!(image.header.offsets.iter().all(|&offset| offset != 0));
    assert_eq!(image.header.table_size(TableKind::FieldDef), 8);
    assert_eq!(image.header.table_size(TableKind::MethodDef), 16);
    assert_eq!(image.header.table_size(TableKind::Resources), 2 * 8);
    assert_ne!(image.header.payload_crc, 0);

    let again = build(&assembly)?;
    assert_eq!(again.header.payload_crc, image.header.payload_crc);
    assert_eq!(again.bytes, image.bytes);
    Ok(())
}

#[test]
fn test_header_matches_bytes() -> Result<()> {
    let image = build(&counter_assembly())?;

    assert_eq!(&image.bytes[..8], b"NFMRK2\0\0");
    assert_eq!(image.header.image_len() as usize, image.bytes.len());
    assert_eq!(image.header.version, Version::new(1, 2, 3, 4));
    assert_eq!(ImageHeader::parse(&image.bytes)?, image.header);

    let mut previous = 0;
    for kind in EMISSION_ORDER {
        let offset = image.header.offset(kind);
        assert!(offset >= previous, "{kind:?} starts before its predecessor");
        assert_eq!(offset % 4, 0, "{kind:?} is not aligned");
        previous = offset;
    }
    Ok(())
}

#[test]
fn test_big_endian_image() -> Result<()> {
    let assembly = counter_assembly();
    let little = build(&assembly)?;
    let big = ImageBuilder::new(&assembly, BuildOptions::default().byte_order(ByteOrder::Big))
        .build()?;

    assert_eq!(big.header.byte_order(), ByteOrder::Big);
    assert_eq!(big.bytes.len(), little.bytes.len());
    assert_eq!(big.header.offsets, little.header.offsets);
    // major version field
    assert_eq!(&big.bytes[24..26], &[0, 1]);
    assert_eq!(&little.bytes[24..26], &[1, 0]);
    Ok(())
}

#[test]
fn test_debug_map() -> Result<()> {
    let assembly = counter_assembly();
    let image = build(&assembly)?;

    let types = &image.debug_map.types;
    assert_eq!(types.len(), 1);
    assert_eq!(types[0].name, "Counter.Program");
    assert_eq!(types[0].fields[0].name, "count");
    assert_eq!(types[0].methods[0].il.len(), 7);

    let xml = image.debug_map_xml()?;
    assert!(xml.contains("Version=\"1.2.3.4\""));
    assert_eq!(xml.matches("<IL ").count(), 7);
    Ok(())
}

#[test]
fn test_write_to_file() -> Result<()> {
    let image = build(&minimal_assembly())?;
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("Minimal.pe");

    image.write_to(&path)?;
    assert_eq!(std::fs::read(&path)?, image.bytes);
    Ok(())
}

#[test]
fn test_missing_reference_fails() {
    let mut assembly = counter_assembly();
    assembly.references.clear();

    let error = build(&assembly).unwrap_err();
    assert!(matches!(error, Error::InTable { .. }));
    assert!(matches!(error.root_cause(), Error::InconsistentModel(_)));
}

#[test]
fn test_build_image_shortcut() -> Result<()> {
    let assembly = minimal_assembly();
    assert_eq!(build_image(&assembly)?, build(&assembly)?.bytes);
    Ok(())
}
