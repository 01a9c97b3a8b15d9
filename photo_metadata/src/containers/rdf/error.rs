/// An XMP packet didn't follow the RDF subset we accept.
#[derive(Clone, Debug, PartialEq, PartialOrd, Hash)]
pub enum RdfError {
    /// `xmltree` couldn't parse the XML.
    ///
    /// This holds the parser's message, since its error type can't be cloned
    /// or compared.
    Xml(String),

    /// No `rdf:RDF` element sat at the root of the packet (or directly inside
    /// `x:xmpmeta`).
    NoRdfElement,

    /// An element appeared where it isn't allowed.
    UnexpectedElement { element: String, parent: String },

    /// An attribute appeared where it isn't allowed.
    UnexpectedAttribute { attribute: String, element: String },

    /// An element or attribute had no namespace.
    NoNamespace { name: String },

    /// Two top-level descriptions gave different `rdf:about` values.
    MismatchedAbout,

    /// A property or field was given twice.
    DuplicateProperty { name: String },

    /// `rdf:type` isn't supported.
    RdfType { element: String },

    /// `rdf:parseType` had a value other than `Resource`.
    BadParseType { element: String, value: String },

    /// An element mixed text with child elements, or had content that
    /// conflicts with its attributes.
    ConflictingContent { element: String },

    /// An element held more than one value.
    MultipleChildren { element: String },

    /// A namespace had no prefix to render it with.
    NoPrefix { namespace: String },

    /// Two namespaces wanted the same prefix.
    PrefixClash { prefix: String },
}

impl core::fmt::Display for RdfError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RdfError::Xml(e) => write!(f, "Encountered error while parsing XML. err: {e}"),
            RdfError::NoRdfElement => {
                f.write_str("The XML is missing the `rdf:RDF` element, which is required.")
            }
            RdfError::UnexpectedElement { element, parent } => {
                write!(f, "Unexpected element `{element}` inside `{parent}`.")
            }
            RdfError::UnexpectedAttribute { attribute, element } => {
                write!(f, "Unexpected attribute `{attribute}` on `{element}`.")
            }
            RdfError::NoNamespace { name } => write!(f, "`{name}` has no namespace."),
            RdfError::MismatchedAbout => {
                f.write_str("Descriptions disagree on the value of `rdf:about`.")
            }
            RdfError::DuplicateProperty { name } => {
                write!(f, "Found more than one value for `{name}`.")
            }
            RdfError::RdfType { element } => {
                write!(f, "`{element}` uses `rdf:type`, which isn't supported.")
            }
            RdfError::BadParseType { element, value } => write!(
                f,
                "`{element}` has `rdf:parseType=\"{value}\"`, but only `Resource` is supported."
            ),
            RdfError::ConflictingContent { element } => {
                write!(f, "`{element}` has conflicting contents.")
            }
            RdfError::MultipleChildren { element } => {
                write!(f, "`{element}` has more than one child element.")
            }
            RdfError::NoPrefix { namespace } => {
                write!(f, "No prefix is registered for namespace `{namespace}`.")
            }
            RdfError::PrefixClash { prefix } => {
                write!(f, "Prefix `{prefix}` is used by more than one namespace.")
            }
        }
    }
}

impl core::error::Error for RdfError {}

impl From<xmltree::ParseError> for RdfError {
    fn from(value: xmltree::ParseError) -> Self {
        RdfError::Xml(value.to_string())
    }
}
