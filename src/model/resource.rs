//! Embedded resources of the input model.

/// One resource of a resource file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Resource name; its hash becomes the resource ID
    pub name: String,
    /// Declared type, either a CLR type name (`System.String`) or a MIME type (`image/bmp`)
    pub type_hint: String,
    /// Serialized payload as stored in the source assembly
    pub data: Vec<u8>,
}

impl Resource {
    /// Creates a resource.
    pub fn new(name: impl Into<String>, type_hint: impl Into<String>, data: Vec<u8>) -> Self {
        Resource {
            name: name.into(),
            type_hint: type_hint.into(),
            data,
        }
    }
}

/// A named group of resources (one `.resources` file of the source assembly).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceFile {
    /// File name
    pub name: String,
    /// Resources in declaration order
    pub resources: Vec<Resource>,
}

impl ResourceFile {
    /// Creates a resource file.
    pub fn new(name: impl Into<String>, resources: Vec<Resource>) -> Self {
        ResourceFile {
            name: name.into(),
            resources,
        }
    }
}
